//! Code-hosting CLI adapter.
//!
//! PR creation and status live behind this trait; the workflow never depends
//! on it succeeding — PR linking is best-effort and degrades gracefully when
//! the CLI is missing.

#[cfg(test)]
pub mod fake;
pub mod gh;

use std::path::Path;

use anyhow::Result;

pub use gh::GhCli;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksState {
    #[default]
    None,
    Pending,
    Pass,
    Fail,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone)]
pub struct PrParams<'a> {
    pub head: &'a str,
    pub base: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// Snapshot of a branch's pull request, if any.
#[derive(Debug, Clone, Default)]
pub struct PrStatus {
    pub exists: bool,
    pub url: Option<String>,
    pub state: Option<PrState>,
    pub merge_commit: Option<String>,
    pub checks: ChecksState,
    pub review_decision: Option<String>,
}

pub trait Host: Send + Sync {
    /// True when the hosting CLI can serve this repository: the binary is on
    /// PATH and the origin remote points at a host it understands.
    fn is_available(&self, cwd: &Path) -> bool;

    /// Open a PR and return its URL.
    fn create_pr(&self, cwd: &Path, params: &PrParams<'_>) -> Result<String>;

    fn pr_status(&self, cwd: &Path, branch: &str) -> Result<PrStatus>;
}
