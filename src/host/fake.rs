//! Scripted hosting double for PR-flow tests.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use super::{Host, PrParams, PrStatus};

#[derive(Debug, Default)]
struct State {
    available: bool,
    created: Vec<(String, String)>,
    status: Option<PrStatus>,
    next_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<State>,
}

impl FakeHost {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().available = true;
        fake
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: PrStatus) {
        self.state.lock().unwrap().status = Some(status);
    }

    pub fn set_next_url(&self, url: &str) {
        self.state.lock().unwrap().next_url = Some(url.to_string());
    }

    /// (head, title) pairs of PRs created through this double.
    pub fn created(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created.clone()
    }
}

impl Host for FakeHost {
    fn is_available(&self, _cwd: &Path) -> bool {
        self.state.lock().unwrap().available
    }

    fn create_pr(&self, _cwd: &Path, params: &PrParams<'_>) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if !state.available {
            return Err(anyhow!("hosting CLI not available"));
        }
        state
            .created
            .push((params.head.to_string(), params.title.to_string()));
        Ok(state
            .next_url
            .clone()
            .unwrap_or_else(|| format!("https://example.com/pr/{}", state.created.len())))
    }

    fn pr_status(&self, _cwd: &Path, _branch: &str) -> Result<PrStatus> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .status
            .clone()
            .unwrap_or_default())
    }
}
