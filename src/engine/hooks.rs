//! The closed hook vocabulary and its production executor.
//!
//! Each hook receives the task and the engine (for dependencies and
//! re-entry); mutations to the task are flushed back to the document by the
//! engine after every hook.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, warn};

use super::{Engine, HookRunner};
use crate::cmd;
use crate::error::{OrangeError, is_branch_in_use};
use crate::harness::{self, REVIEW_PROMPT_FILE, WORKER_PROMPT_FILE};
use crate::history::EventKind;
use crate::prompt::{self, AgentVariant};
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    AcquireWorkspace,
    SpawnAgent(AgentVariant),
    SpawnReviewer,
    KillReviewer,
    NotifyWorker,
    ReleaseWorkspace,
    KillSession,
    IncrementReviewRound,
    SpawnNext,
    DeleteRemoteBranch,
}

impl Hook {
    /// Hooks whose failure means the agent plumbing is gone (recorded as
    /// `agent.crashed` in history).
    pub fn is_agent_spawn(&self) -> bool {
        matches!(self, Hook::SpawnAgent(_) | Hook::SpawnReviewer)
    }
}

/// Production hook executor.
pub struct Hooks;

impl HookRunner for Hooks {
    fn run(&self, hook: Hook, task: &mut Task, engine: &Engine) -> Result<()> {
        match hook {
            Hook::AcquireWorkspace => acquire_workspace(task, engine),
            Hook::SpawnAgent(variant) => spawn_agent(variant, task, engine),
            Hook::SpawnReviewer => spawn_reviewer(task, engine),
            Hook::KillReviewer => kill_reviewer(task, engine),
            Hook::NotifyWorker => notify_worker(task, engine),
            Hook::ReleaseWorkspace => release_workspace(task, engine),
            Hook::KillSession => kill_session(task, engine),
            Hook::IncrementReviewRound => {
                task.review_round += 1;
                Ok(())
            }
            Hook::SpawnNext => {
                engine.spawn_next_pending(&task.project);
                Ok(())
            }
            Hook::DeleteRemoteBranch => delete_remote_branch(task, engine),
        }
    }
}

/// Lease a pool slot, point its worktree at the task branch, and wire the
/// task file into it. A branch checked out elsewhere releases the
/// provisionally taken slot and fails `BranchInUse`.
fn acquire_workspace(task: &mut Task, engine: &Engine) -> Result<()> {
    if task.workspace.is_some() {
        return Ok(());
    }

    let deps = engine.deps();
    let project = deps.store.get_project(&task.project)?;
    let slot = deps.pool.acquire(&project, &task.id)?;
    let worktree = deps.data.workspace_dir(&slot);
    let origin_default = format!("origin/{}", project.default_branch);

    deps.git.fetch(&worktree)?;
    deps.git.reset_hard(&worktree, &origin_default)?;

    if deps.git.branch_exists(&worktree, &task.branch)? {
        if let Err(e) = deps.git.checkout(&worktree, &task.branch) {
            if is_branch_in_use(&e) {
                deps.pool.release(&project, &slot, true)?;
                return Err(OrangeError::BranchInUse(task.branch.clone()).into());
            }
            return Err(e);
        }
    } else {
        deps.git
            .create_branch(&worktree, &task.branch, Some(&origin_default))?;
        deps.git.checkout(&worktree, &task.branch)?;
    }

    write_marker(&worktree, &task.id)?;
    link_task_file(task, engine, &worktree)?;

    let profile = harness::resolve(&task.harness);
    if let Some(setup) = profile.setup_command() {
        cmd::shell_command(setup, &worktree)?;
    }

    task.workspace = Some(slot);
    Ok(())
}

/// Start (or restart) the long-lived worker session. An empty prompt —
/// clarification mode — launches the bare harness binary.
fn spawn_agent(variant: AgentVariant, task: &mut Task, engine: &Engine) -> Result<()> {
    let deps = engine.deps();
    let slot = task.workspace.clone().ok_or_else(|| {
        OrangeError::InvalidArgument(format!("task '{}' has no workspace", task.id))
    })?;
    let worktree = deps.data.workspace_dir(&slot);

    let prompt = prompt::render(variant, task)?;
    let profile = harness::resolve(&task.harness);
    let prompt_file = if prompt.trim().is_empty() {
        None
    } else {
        fs::write(worktree.join(WORKER_PROMPT_FILE), &prompt)?;
        Some(WORKER_PROMPT_FILE)
    };
    let command = if variant.is_respawn() {
        profile.respawn_command(prompt_file)
    } else {
        profile.spawn_command(prompt_file)
    };

    let session = task.session_name();
    deps.mux.kill_session_safe(&session);
    deps.mux.new_session(&session, &worktree, Some(&command))?;
    deps.mux.rename_window(&session, variant.window_name())?;

    task.tmux_session = Some(session.clone());
    deps.store.append_event(
        task,
        EventKind::AgentSpawned {
            variant: variant.as_str().to_string(),
            session,
        },
    )?;
    Ok(())
}

/// Run the reviewer in a background window of the worker's session, then
/// put the worker window back in front.
fn spawn_reviewer(task: &mut Task, engine: &Engine) -> Result<()> {
    let deps = engine.deps();
    let slot = task.workspace.clone().ok_or_else(|| {
        OrangeError::InvalidArgument(format!("task '{}' has no workspace", task.id))
    })?;
    let session = task.tmux_session.clone().ok_or_else(|| {
        OrangeError::InvalidArgument(format!("task '{}' has no session", task.id))
    })?;
    let worktree = deps.data.workspace_dir(&slot);

    let prompt = prompt::render(AgentVariant::Reviewer, task)?;
    fs::write(worktree.join(REVIEW_PROMPT_FILE), &prompt)?;
    let profile = harness::resolve(&task.review_harness);
    let command = profile.spawn_command(Some(REVIEW_PROMPT_FILE));

    // Window is named for the round being opened (the round counter is
    // incremented by the next hook in the row).
    let window = format!("review-{}", task.review_round + 1);
    deps.mux.new_window(&session, &window, &worktree, Some(&command))?;
    deps.mux.select_window_safe(&format!("{}:worker", session));

    deps.store.append_event(
        task,
        EventKind::AgentSpawned {
            variant: AgentVariant::Reviewer.as_str().to_string(),
            session,
        },
    )?;
    Ok(())
}

fn kill_reviewer(task: &mut Task, engine: &Engine) -> Result<()> {
    if let Some(session) = &task.tmux_session {
        let target = format!("{}:review-{}", session, task.review_round);
        engine.deps().mux.kill_window_safe(&target);
    }
    Ok(())
}

/// Best-effort nudge into the worker's window: the review is done and the
/// task moved. The worker may have died; the monitor will notice.
fn notify_worker(task: &mut Task, engine: &Engine) -> Result<()> {
    let Some(session) = &task.tmux_session else {
        return Ok(());
    };
    let deps = engine.deps();
    let target = format!("{}:worker", session);
    let notice = format!(
        "Review complete. Task status is now '{}'. See the Review section in TASK.md.",
        task.status
    );
    let sent = deps
        .mux
        .send_literal(&target, &notice)
        .and_then(|_| deps.mux.send_keys(&target, &["Enter"]));
    if let Err(e) = sent {
        warn!(task = %task.id, window = %target, error = %e, "could not notify worker");
    }
    Ok(())
}

/// Clear the binding from the document first, then hand the slot back to the
/// pool and offer it to the next pending task.
fn release_workspace(task: &mut Task, engine: &Engine) -> Result<()> {
    let Some(slot) = task.workspace.take() else {
        return Ok(());
    };
    let deps = engine.deps();
    deps.store.save_task(task)?;
    let project = deps.store.get_project(&task.project)?;
    deps.pool.release(&project, &slot, true)?;
    engine.spawn_next_pending(&task.project);
    Ok(())
}

fn kill_session(task: &mut Task, engine: &Engine) -> Result<()> {
    if let Some(session) = task.tmux_session.take() {
        engine.deps().mux.kill_session_safe(&session);
        debug!(task = %task.id, session, "session killed");
    }
    Ok(())
}

fn delete_remote_branch(task: &mut Task, engine: &Engine) -> Result<()> {
    let deps = engine.deps();
    let project = deps.store.get_project(&task.project)?;
    if let Err(e) = deps.git.delete_remote_branch(&project.path, &task.branch) {
        warn!(task = %task.id, branch = %task.branch, error = %e, "could not delete remote branch");
    }
    Ok(())
}

/// `.orange-task` marker at the worktree root. The harness stop hook reads
/// this file (without a JSON parser) to relay the agent's outcome to the CLI.
fn write_marker(worktree: &Path, task_id: &str) -> Result<()> {
    let marker = serde_json::json!({ "id": task_id, "outcome": "" });
    fs::write(worktree.join(".orange-task"), marker.to_string() + "\n")?;
    Ok(())
}

/// Symlink the task document into the worktree so the agent edits the real
/// TASK.md. Relative link, so moving the data directory doesn't break it.
fn link_task_file(task: &Task, engine: &Engine, worktree: &Path) -> Result<()> {
    let deps = engine.deps();
    let source = deps.data.task_file(&task.project, &task.id);
    let dest = worktree.join("TASK.md");

    if dest.symlink_metadata().is_ok() {
        fs::remove_file(&dest)?;
    }

    let relative = pathdiff::diff_paths(&source, worktree).unwrap_or_else(|| source.clone());

    #[cfg(unix)]
    std::os::unix::fs::symlink(&relative, &dest)?;

    #[cfg(windows)]
    std::os::windows::fs::symlink_file(&relative, &dest)?;

    Ok(())
}
