//! Git adapter: everything the engine needs from git, behind a trait so the
//! workflow, pool, and monitor can be tested against an in-memory double.
//!
//! Every method takes its working directory explicitly; the live
//! implementation shells out and surfaces failures as typed
//! `SubprocessFailed` errors carrying git's stderr.

pub mod cli;
#[cfg(test)]
pub mod fake;

use std::path::Path;

use anyhow::Result;

pub use cli::GitCli;

/// How `merge` integrates a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Fast-forward only (`--ff-only`)
    Ff,
    /// Always create a merge commit (`--no-ff`)
    Merge,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Ff => "ff",
            MergeStrategy::Merge => "merge",
        }
    }
}

/// Committed diff statistics against a base ref.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub files: usize,
    pub added: usize,
    pub removed: usize,
}

pub trait Git: Send + Sync {
    /// True if `path` is the top level of a git repository.
    fn is_git_root(&self, path: &Path) -> Result<bool>;

    /// Default branch from `origin/HEAD`, falling back to main/master.
    fn default_branch(&self, cwd: &Path) -> Result<String>;

    fn fetch(&self, cwd: &Path) -> Result<()>;

    fn checkout(&self, cwd: &Path, branch: &str) -> Result<()>;

    fn reset_hard(&self, cwd: &Path, reference: &str) -> Result<()>;

    /// Remove untracked files and directories (`clean -fd`).
    fn clean(&self, cwd: &Path) -> Result<()>;

    fn create_branch(&self, cwd: &Path, name: &str, start_point: Option<&str>) -> Result<()>;

    fn branch_exists(&self, cwd: &Path, name: &str) -> Result<bool>;

    fn delete_branch(&self, cwd: &Path, name: &str) -> Result<()>;

    fn delete_remote_branch(&self, cwd: &Path, name: &str) -> Result<()>;

    fn merge(&self, cwd: &Path, branch: &str, strategy: MergeStrategy) -> Result<()>;

    fn current_branch(&self, cwd: &Path) -> Result<String>;

    /// Add a worktree detached at `origin/<branch>`. Detaching avoids git's
    /// "branch is already checked out" refusal when pool slots are recycled.
    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<()>;

    fn remove_worktree(&self, repo: &Path, path: &Path) -> Result<()>;

    fn commit_hash(&self, cwd: &Path, short: bool) -> Result<String>;

    fn diff_stats(&self, cwd: &Path, base: &str) -> Result<DiffStats>;

    fn commit_count(&self, cwd: &Path, base: &str) -> Result<usize>;

    fn push_branch(&self, cwd: &Path, branch: &str) -> Result<()>;

    /// Configured URL of the `origin` remote.
    fn remote_url(&self, cwd: &Path) -> Result<String>;
}
