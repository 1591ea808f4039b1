//! In-memory multiplexer double: records sessions, windows, and key traffic
//! so engine and monitor tests can assert on agent plumbing without tmux.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use super::{Multiplexer, PaneInfo, ScrollDir};

#[derive(Debug, Clone)]
pub struct FakeSession {
    pub cwd: PathBuf,
    pub command: Option<String>,
    pub windows: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    sessions: BTreeMap<String, FakeSession>,
    /// (target, text) pairs from send_literal / send_keys
    sent: Vec<(String, String)>,
    /// Pane content served by capture_pane
    pane_content: BTreeMap<String, String>,
    killed_windows: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeMux {
    state: Mutex<State>,
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, name: &str) -> Option<FakeSession> {
        self.state.lock().unwrap().sessions.get(name).cloned()
    }

    pub fn session_names(&self) -> Vec<String> {
        self.state.lock().unwrap().sessions.keys().cloned().collect()
    }

    pub fn sent_to(&self, target: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(t, _)| t == target)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn killed_windows(&self) -> Vec<String> {
        self.state.lock().unwrap().killed_windows.clone()
    }

    pub fn set_pane_content(&self, target: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .pane_content
            .insert(target.to_string(), content.to_string());
    }

    /// Simulate the agent process (and its session) dying.
    pub fn drop_session(&self, name: &str) {
        self.state.lock().unwrap().sessions.remove(name);
    }
}

impl Multiplexer for FakeMux {
    fn is_available(&self) -> bool {
        true
    }

    fn new_session(&self, name: &str, cwd: &Path, command: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.insert(
            name.to_string(),
            FakeSession {
                cwd: cwd.to_path_buf(),
                command: command.map(String::from),
                windows: vec!["0".to_string()],
            },
        );
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .sessions
            .remove(name)
            .ok_or_else(|| anyhow!("no such session: {}", name))?;
        Ok(())
    }

    fn kill_session_safe(&self, name: &str) {
        self.state.lock().unwrap().sessions.remove(name);
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.session_names())
    }

    fn session_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().sessions.contains_key(name))
    }

    fn capture_pane(&self, target: &str, _lines: u16) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .pane_content
            .get(target)
            .cloned()
            .ok_or_else(|| anyhow!("no such pane: {}", target))
    }

    fn capture_pane_ansi(&self, target: &str, lines: u16) -> Result<String> {
        self.capture_pane(target, lines)
    }

    fn capture_pane_safe(&self, target: &str, lines: u16) -> Option<String> {
        self.capture_pane(target, lines).ok()
    }

    fn query_pane_info(&self, _target: &str) -> Result<PaneInfo> {
        Ok(PaneInfo {
            cursor_x: 0,
            cursor_y: 0,
            cursor_visible: true,
            width: 80,
            height: 24,
        })
    }

    fn resize_pane_safe(&self, _target: &str, _width: u16, _height: u16) {}

    fn new_window(
        &self,
        session: &str,
        name: &str,
        _cwd: &Path,
        _command: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let sess = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| anyhow!("no such session: {}", session))?;
        sess.windows.push(name.to_string());
        Ok(())
    }

    fn rename_window(&self, target: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let sess = state
            .sessions
            .get_mut(target)
            .ok_or_else(|| anyhow!("no such session: {}", target))?;
        if let Some(first) = sess.windows.first_mut() {
            *first = name.to_string();
        }
        Ok(())
    }

    fn kill_window_safe(&self, target: &str) {
        let mut state = self.state.lock().unwrap();
        state.killed_windows.push(target.to_string());
        if let Some((session, window)) = target.split_once(':')
            && let Some(sess) = state.sessions.get_mut(session)
        {
            sess.windows.retain(|w| w.as_str() != window);
        }
    }

    fn send_keys(&self, target: &str, keys: &[&str]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let session = target.split(':').next().unwrap_or(target);
        if !state.sessions.contains_key(session) {
            return Err(anyhow!("no such session: {}", session));
        }
        state
            .sent
            .push((target.to_string(), format!("<{}>", keys.join("+"))));
        Ok(())
    }

    fn send_literal(&self, target: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let session = target.split(':').next().unwrap_or(target);
        if !state.sessions.contains_key(session) {
            return Err(anyhow!("no such session: {}", session));
        }
        state.sent.push((target.to_string(), text.to_string()));
        Ok(())
    }

    fn split_window(&self, _target: &str, _cwd: &Path, _command: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn attach_or_create(&self, name: &str, cwd: &Path) -> Result<()> {
        if !self.session_exists(name)? {
            self.new_session(name, cwd, None)?;
        }
        Ok(())
    }

    fn select_window_safe(&self, _target: &str) {}

    fn scroll_pane(&self, _target: &str, _dir: ScrollDir) -> Result<()> {
        Ok(())
    }
}
