use std::path::PathBuf;

use crate::task::TaskStatus;

/// Structured error vocabulary for the orchestration core.
///
/// Commands and hooks propagate these through `anyhow`; callers that need to
/// branch on a kind (e.g. the spawner swallowing `PoolExhausted`) downcast.
#[derive(Debug, thiserror::Error)]
pub enum OrangeError {
    #[error("no transition from '{from}' to '{to}'")]
    NoTransition { from: TaskStatus, to: TaskStatus },

    #[error("{gate} gate rejected: {reason}")]
    GateRejected { gate: &'static str, reason: String },

    #[error("workspace pool exhausted: {used}/{size} slots in use")]
    PoolExhausted { used: usize, size: usize },

    #[error("branch '{0}' is already checked out in another worktree")]
    BranchInUse(String),

    #[error("{tool} exited with status {exit}: {stderr}")]
    SubprocessFailed {
        tool: String,
        exit: i32,
        stderr: String,
    },

    #[error("not a git repository: {}", .0.display())]
    NotAGitRepo(PathBuf),

    #[error("project '{0}' is already registered")]
    DuplicateProject(String),

    #[error("task '{0}' not found")]
    TaskNotFound(String),

    #[error("{0}")]
    InvalidArgument(String),
}

/// True when a git failure means the branch is checked out in some other
/// worktree. Git phrases this differently across versions.
pub fn is_branch_in_use(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<OrangeError>() {
        Some(OrangeError::SubprocessFailed { stderr, .. }) => {
            stderr.contains("already checked out") || stderr.contains("already used by worktree")
        }
        _ => false,
    }
}
