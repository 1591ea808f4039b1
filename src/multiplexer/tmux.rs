use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, trace};

use super::{Multiplexer, PaneInfo, ScrollDir, wrap_command};
use crate::cmd::Cmd;

/// Live tmux backend.
#[derive(Debug, Default, Clone)]
pub struct TmuxBackend;

impl TmuxBackend {
    pub fn new() -> Self {
        Self
    }

    /// Exact-match session target (`=name` stops tmux prefix matching).
    fn session_target(name: &str) -> String {
        format!("={}", name)
    }
}

impl Multiplexer for TmuxBackend {
    fn is_available(&self) -> bool {
        which::which("tmux").is_ok()
    }

    fn new_session(&self, name: &str, cwd: &Path, command: Option<&str>) -> Result<()> {
        let cwd_str = cwd
            .to_str()
            .ok_or_else(|| anyhow!("Working directory path contains non-UTF8 characters"))?;

        let wrapped = command.map(wrap_command);
        let mut cmd = Cmd::new("tmux").args(&["new-session", "-d", "-s", name, "-c", cwd_str]);
        if let Some(ref wrapped) = wrapped {
            cmd = cmd.arg(wrapped);
        }
        cmd.run()
            .with_context(|| format!("Failed to create tmux session '{}'", name))?;
        debug!(session = name, "tmux:session created");
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<()> {
        let target = Self::session_target(name);
        Cmd::new("tmux")
            .args(&["kill-session", "-t", &target])
            .run()
            .with_context(|| format!("Failed to kill tmux session '{}'", name))?;
        Ok(())
    }

    fn kill_session_safe(&self, name: &str) {
        let target = Self::session_target(name);
        let _ = Cmd::new("tmux")
            .args(&["kill-session", "-t", &target])
            .run_as_check();
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        // Errors (typically: no server running) mean no sessions.
        let output = Cmd::new("tmux")
            .args(&["list-sessions", "-F", "#{session_name}"])
            .run_and_capture_stdout()
            .unwrap_or_default();
        Ok(output.lines().map(String::from).collect())
    }

    fn session_exists(&self, name: &str) -> Result<bool> {
        let target = Self::session_target(name);
        Cmd::new("tmux")
            .args(&["has-session", "-t", &target])
            .run_as_check()
    }

    fn capture_pane(&self, target: &str, lines: u16) -> Result<String> {
        let start = format!("-{}", lines);
        let output = Cmd::new("tmux")
            .args(&["capture-pane", "-p", "-t", target, "-S", &start])
            .run()
            .with_context(|| format!("Failed to capture pane '{}'", target))?;
        let stripped = strip_ansi_escapes::strip(&output.stdout);
        Ok(String::from_utf8_lossy(&stripped).into_owned())
    }

    fn capture_pane_ansi(&self, target: &str, lines: u16) -> Result<String> {
        let start = format!("-{}", lines);
        let output = Cmd::new("tmux")
            .args(&["capture-pane", "-p", "-e", "-t", target, "-S", &start])
            .run()
            .with_context(|| format!("Failed to capture pane '{}'", target))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn capture_pane_safe(&self, target: &str, lines: u16) -> Option<String> {
        self.capture_pane(target, lines).ok()
    }

    fn query_pane_info(&self, target: &str) -> Result<PaneInfo> {
        let output = Cmd::new("tmux")
            .args(&[
                "display-message",
                "-p",
                "-t",
                target,
                "#{cursor_x} #{cursor_y} #{cursor_flag} #{pane_width} #{pane_height}",
            ])
            .run_and_capture_stdout()
            .with_context(|| format!("Failed to query pane '{}'", target))?;

        let mut parts = output.split_whitespace();
        let mut next = || -> Result<u16> {
            parts
                .next()
                .ok_or_else(|| anyhow!("Unexpected pane info output: {}", output))?
                .parse()
                .map_err(|_| anyhow!("Unexpected pane info output: {}", output))
        };
        let cursor_x = next()?;
        let cursor_y = next()?;
        let cursor_visible = next()? == 1;
        let width = next()?;
        let height = next()?;
        Ok(PaneInfo {
            cursor_x,
            cursor_y,
            cursor_visible,
            width,
            height,
        })
    }

    fn resize_pane_safe(&self, target: &str, width: u16, height: u16) {
        let w = width.to_string();
        let h = height.to_string();
        let _ = Cmd::new("tmux")
            .args(&["resize-window", "-t", target, "-x", &w, "-y", &h])
            .run_as_check();
    }

    fn new_window(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<()> {
        let cwd_str = cwd
            .to_str()
            .ok_or_else(|| anyhow!("Working directory path contains non-UTF8 characters"))?;
        let target = format!("={}:", session);

        let wrapped = command.map(wrap_command);
        let mut cmd = Cmd::new("tmux").args(&[
            "new-window", "-d", "-t", &target, "-n", name, "-c", cwd_str,
        ]);
        if let Some(ref wrapped) = wrapped {
            cmd = cmd.arg(wrapped);
        }
        cmd.run()
            .with_context(|| format!("Failed to create window '{}' in session '{}'", name, session))?;
        debug!(session, window = name, "tmux:window created");
        Ok(())
    }

    fn rename_window(&self, target: &str, name: &str) -> Result<()> {
        Cmd::new("tmux")
            .args(&["rename-window", "-t", target, name])
            .run()
            .with_context(|| format!("Failed to rename window '{}'", target))?;
        Ok(())
    }

    fn kill_window_safe(&self, target: &str) {
        let _ = Cmd::new("tmux")
            .args(&["kill-window", "-t", target])
            .run_as_check();
    }

    fn send_keys(&self, target: &str, keys: &[&str]) -> Result<()> {
        let mut args = vec!["send-keys", "-t", target];
        args.extend_from_slice(keys);
        Cmd::new("tmux")
            .args(&args)
            .run()
            .with_context(|| format!("Failed to send keys to '{}'", target))?;
        Ok(())
    }

    fn send_literal(&self, target: &str, text: &str) -> Result<()> {
        Cmd::new("tmux")
            .args(&["send-keys", "-t", target, "-l", text])
            .run()
            .with_context(|| format!("Failed to send text to '{}'", target))?;
        Ok(())
    }

    fn split_window(&self, target: &str, cwd: &Path, command: Option<&str>) -> Result<()> {
        let cwd_str = cwd
            .to_str()
            .ok_or_else(|| anyhow!("Working directory path contains non-UTF8 characters"))?;

        let wrapped = command.map(wrap_command);
        let mut cmd = Cmd::new("tmux").args(&["split-window", "-d", "-t", target, "-c", cwd_str]);
        if let Some(ref wrapped) = wrapped {
            cmd = cmd.arg(wrapped);
        }
        cmd.run()
            .with_context(|| format!("Failed to split pane '{}'", target))?;
        Ok(())
    }

    fn attach_or_create(&self, name: &str, cwd: &Path) -> Result<()> {
        if !self.session_exists(name)? {
            self.new_session(name, cwd, None)?;
        }

        let target = Self::session_target(name);
        if std::env::var("TMUX").is_ok() {
            // Already inside tmux: switch this client instead of nesting.
            Cmd::new("tmux")
                .args(&["switch-client", "-t", &target])
                .run()
                .with_context(|| format!("Failed to switch to session '{}'", name))?;
        } else {
            Cmd::new("tmux")
                .args(&["attach-session", "-t", &target])
                .run_interactive()
                .with_context(|| format!("Failed to attach to session '{}'", name))?;
        }
        Ok(())
    }

    fn select_window_safe(&self, target: &str) {
        trace!(window = target, "tmux:select window");
        let _ = Cmd::new("tmux")
            .args(&["select-window", "-t", target])
            .run_as_check();
    }

    fn scroll_pane(&self, target: &str, dir: ScrollDir) -> Result<()> {
        Cmd::new("tmux")
            .args(&["copy-mode", "-t", target])
            .run()
            .with_context(|| format!("Failed to enter copy mode in '{}'", target))?;
        let action = match dir {
            ScrollDir::Up => "halfpage-up",
            ScrollDir::Down => "halfpage-down",
        };
        Cmd::new("tmux")
            .args(&["send-keys", "-t", target, "-X", action])
            .run()
            .with_context(|| format!("Failed to scroll pane '{}'", target))?;
        Ok(())
    }
}
