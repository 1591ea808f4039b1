//! Terminal multiplexer abstraction.
//!
//! The engine addresses agents through sessions and windows only; everything
//! tmux-specific stays behind this trait so tests can run against an
//! in-memory double. `*_safe` variants swallow missing-session errors — the
//! rule wherever the caller would otherwise have to try/recover.

#[cfg(test)]
pub mod fake;
pub mod tmux;

use std::path::Path;

use anyhow::Result;

pub use tmux::TmuxBackend;

/// Cursor and geometry of a pane, for the dashboard preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaneInfo {
    pub cursor_x: u16,
    pub cursor_y: u16,
    pub cursor_visible: bool,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDir {
    Up,
    Down,
}

pub trait Multiplexer: Send + Sync {
    /// True when the multiplexer binary is on PATH.
    fn is_available(&self) -> bool;

    /// Create a detached session running `command` in `cwd`. The command is
    /// wrapped so the pane drops to the user's shell once it exits.
    fn new_session(&self, name: &str, cwd: &Path, command: Option<&str>) -> Result<()>;

    fn kill_session(&self, name: &str) -> Result<()>;

    /// Best-effort kill; a missing session is not an error.
    fn kill_session_safe(&self, name: &str);

    fn list_sessions(&self) -> Result<Vec<String>>;

    fn session_exists(&self, name: &str) -> Result<bool>;

    /// Capture the last `lines` lines of a pane, ANSI stripped.
    fn capture_pane(&self, target: &str, lines: u16) -> Result<String>;

    /// Capture with escape sequences preserved (dashboard preview).
    fn capture_pane_ansi(&self, target: &str, lines: u16) -> Result<String>;

    /// Capture, swallowing a missing session/pane.
    fn capture_pane_safe(&self, target: &str, lines: u16) -> Option<String>;

    fn query_pane_info(&self, target: &str) -> Result<PaneInfo>;

    fn resize_pane_safe(&self, target: &str, width: u16, height: u16);

    /// Create a named window in an existing session, running `command`.
    fn new_window(&self, session: &str, name: &str, cwd: &Path, command: Option<&str>)
    -> Result<()>;

    fn rename_window(&self, target: &str, name: &str) -> Result<()>;

    /// Best-effort kill of a single window; the session stays alive.
    fn kill_window_safe(&self, target: &str);

    /// Send named keys (`Enter`, `C-c`, ...) to a target pane.
    fn send_keys(&self, target: &str, keys: &[&str]) -> Result<()>;

    /// Send raw text, uninterpreted.
    fn send_literal(&self, target: &str, text: &str) -> Result<()>;

    fn split_window(&self, target: &str, cwd: &Path, command: Option<&str>) -> Result<()>;

    /// Attach the calling terminal to a session, creating it first if needed.
    /// Inside the multiplexer this switches the client instead.
    fn attach_or_create(&self, name: &str, cwd: &Path) -> Result<()>;

    fn select_window_safe(&self, target: &str);

    fn scroll_pane(&self, target: &str, dir: ScrollDir) -> Result<()>;
}

/// Wrap an agent command so the pane survives agent exit: run the command,
/// then exec the user's shell. A human attaching afterwards lands at a
/// prompt in the worktree instead of a dead pane.
pub fn wrap_command(command: &str) -> String {
    format!("{}; exec ${{SHELL:-/bin/sh}}", command)
}
