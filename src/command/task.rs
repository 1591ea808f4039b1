use anyhow::{Context, Result, anyhow};
use console::style;
use tabled::{Table, Tabled, settings::Style};
use tracing::{info, warn};

use super::{Ctx, confirm};
use crate::engine::Hook;
use crate::error::OrangeError;
use crate::gates::{Gate, Verdict};
use crate::git::MergeStrategy;
use crate::history::EventKind;
use crate::host::{ChecksState, PrParams, PrState};
use crate::monitor::MAX_REVIEW_ROUNDS;
use crate::prompt::AgentVariant;
use crate::task::{Task, TaskStatus};

pub fn create(
    ctx: &Ctx,
    branch: Option<&str>,
    summary: Option<&str>,
    harness: &str,
) -> Result<()> {
    let project = ctx.resolve_project()?;
    let summary = summary.unwrap_or_default();

    let mut task = Task::new(&project.name, "", summary, harness)?;
    let branch = match branch {
        Some(branch) => branch.to_string(),
        // No branch given: derive a unique one from the task id.
        None => format!("task/{}", &task.id[..8].to_lowercase()),
    };
    if branch.contains(char::is_whitespace) || branch.contains(':') {
        return Err(
            OrangeError::InvalidArgument(format!("invalid branch name '{}'", branch)).into(),
        );
    }
    if ctx.deps.store.branch_taken(&project.name, &branch)? {
        return Err(OrangeError::InvalidArgument(format!(
            "a task for branch '{}' already exists in project '{}'",
            branch, project.name
        ))
        .into());
    }
    task.branch = branch;

    ctx.deps.store.save_task(&task)?;
    ctx.deps.store.append_event(
        &task,
        EventKind::TaskCreated {
            id: task.id.clone(),
            project: task.project.clone(),
            branch: task.branch.clone(),
        },
    )?;

    info!(task = %task.id, branch = %task.branch, status = %task.status, "task created");
    println!(
        "{} task {} created on branch '{}' ({})",
        style("✔").green(),
        task.id,
        task.branch,
        task.status
    );
    if task.status == TaskStatus::Clarification {
        println!(
            "  summary is empty; fill it with 'orange task update {} --summary ...'",
            task.id
        );
    } else {
        println!("  start it with 'orange task spawn {}'", task.id);
    }
    Ok(())
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "BRANCH")]
    branch: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "ROUND")]
    round: u32,
    #[tabled(rename = "SESSION")]
    session: String,
    #[tabled(rename = "SUMMARY")]
    summary: String,
}

pub fn list(ctx: &Ctx, status: Option<&str>, all: bool) -> Result<()> {
    let status = match status {
        Some(s) => Some(TaskStatus::parse(s).ok_or_else(|| {
            OrangeError::InvalidArgument(format!("unknown status '{}'", s))
        })?),
        None => None,
    };

    let project = if all {
        None
    } else {
        Some(ctx.resolve_project()?.name)
    };
    let tasks = ctx.deps.store.list_tasks(project.as_deref())?;

    let rows: Vec<TaskRow> = tasks
        .iter()
        .filter(|t| match status {
            Some(s) => t.status == s,
            None => all || !t.status.is_terminal(),
        })
        .map(|t| {
            let session = match &t.tmux_session {
                Some(name) => {
                    if ctx.deps.mux.session_exists(name).unwrap_or(false) {
                        name.clone()
                    } else {
                        format!("{} (dead)", name)
                    }
                }
                None => "-".to_string(),
            };
            TaskRow {
                id: t.id.clone(),
                branch: t.branch.clone(),
                status: t.status.to_string(),
                round: t.review_round,
                session,
                summary: truncate(&t.summary, 48),
            }
        })
        .collect();

    if rows.is_empty() {
        println!("No matching tasks.");
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::blank());
    println!("{}", table);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Start a task's agent. Pending tasks go through the normal
/// pending -> planning transition; clarification tasks get a workspace and a
/// bare harness session without leaving clarification until a summary exists.
pub fn spawn(ctx: &Ctx, id: &str) -> Result<()> {
    let task = ctx.deps.store.find_task(id)?;
    match task.status {
        TaskStatus::Pending => {
            let project = ctx.deps.store.get_project(&task.project)?;
            if !ctx.deps.pool.has_capacity(&project)? {
                let stats = ctx.deps.pool.stats(&project)?;
                return Err(OrangeError::PoolExhausted {
                    used: stats.bound,
                    size: stats.pool_size,
                }
                .into());
            }
            let task = ctx.engine.execute_transition(&task.id, TaskStatus::Planning)?;
            println!(
                "{} agent spawned in session '{}'",
                style("✔").green(),
                task.tmux_session.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        TaskStatus::Clarification => {
            let mut task = task;
            ctx.engine.run_hook(Hook::AcquireWorkspace, &mut task)?;
            ctx.engine
                .run_hook(Hook::SpawnAgent(AgentVariant::Worker), &mut task)?;
            if !task.summary.is_empty() {
                ctx.engine.execute_transition(&task.id, TaskStatus::Planning)?;
            }
            println!(
                "{} agent spawned in session '{}'",
                style("✔").green(),
                task.tmux_session.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        other => Err(OrangeError::InvalidArgument(format!(
            "task is {}; only pending or clarification tasks can be spawned",
            other
        ))
        .into()),
    }
}

pub fn attach(ctx: &Ctx, id: &str) -> Result<()> {
    let task = ctx.deps.store.find_task(id)?;
    let Some(slot) = &task.workspace else {
        return Err(OrangeError::InvalidArgument(format!(
            "task has no workspace; run 'orange task spawn {}' first",
            task.id
        ))
        .into());
    };
    let worktree = ctx.deps.data.workspace_dir(slot);
    ctx.deps
        .mux
        .attach_or_create(&task.session_name(), &worktree)
}

/// Kill and restart the task's agent session, picking the prompt variant
/// that matches where the task currently is.
pub fn respawn(ctx: &Ctx, id: &str) -> Result<()> {
    let mut task = ctx.deps.store.find_task(id)?;
    if task.workspace.is_none() {
        return Err(OrangeError::InvalidArgument(format!(
            "task has no workspace; run 'orange task spawn {}' instead",
            task.id
        ))
        .into());
    }

    let variant = match task.status {
        TaskStatus::Planning | TaskStatus::Clarification => AgentVariant::Worker,
        TaskStatus::Working => AgentVariant::WorkerRespawn,
        TaskStatus::AgentReview | TaskStatus::Reviewing => AgentVariant::WorkerWait,
        TaskStatus::Stuck => AgentVariant::StuckFix,
        other => {
            return Err(OrangeError::InvalidArgument(format!(
                "cannot respawn a {} task",
                other
            ))
            .into());
        }
    };

    ctx.engine.run_hook(Hook::SpawnAgent(variant), &mut task)?;
    info!(task = %task.id, variant = variant.as_str(), "agent respawned");
    println!(
        "{} {} respawned in session '{}'",
        style("✔").green(),
        variant.as_str(),
        task.tmux_session.as_deref().unwrap_or("-")
    );
    Ok(())
}

pub fn update(ctx: &Ctx, id: &str, branch: Option<&str>, summary: Option<&str>) -> Result<()> {
    let mut task = ctx.deps.store.find_task(id)?;

    if let Some(branch) = branch {
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::Clarification)
            || task.workspace.is_some()
        {
            return Err(OrangeError::InvalidArgument(
                "branch can only change before the task has a workspace".into(),
            )
            .into());
        }
        if ctx.deps.store.branch_taken(&task.project, branch)? {
            return Err(OrangeError::InvalidArgument(format!(
                "a task for branch '{}' already exists",
                branch
            ))
            .into());
        }
        task.branch = branch.to_string();
    }

    let mut leave_clarification = false;
    if let Some(summary) = summary {
        task.summary = summary.trim().to_string();
        leave_clarification =
            task.status == TaskStatus::Clarification && !task.summary.is_empty();
    }

    task.touch();
    ctx.deps.store.save_task(&task)?;

    if leave_clarification && task.workspace.is_some() {
        // The agent session already exists; the task resumes planning.
        ctx.engine.execute_transition(&task.id, TaskStatus::Planning)?;
        println!(
            "{} task updated; now planning (respawn the agent to hand it the summary)",
            style("✔").green()
        );
    } else {
        println!("{} task updated", style("✔").green());
    }
    Ok(())
}

/// Gate-driven advance: read the artifacts the agent left in the body and
/// run the matching transition. This is what the stop hook calls.
pub fn complete(ctx: &Ctx, id: &str) -> Result<()> {
    let task = ctx.deps.store.find_task(id)?;
    let to = match task.status {
        TaskStatus::Planning => TaskStatus::Working,
        TaskStatus::Working => TaskStatus::AgentReview,
        TaskStatus::AgentReview => {
            if Gate::Review(Verdict::Pass).passes(&task.body) {
                TaskStatus::Reviewing
            } else if Gate::Review(Verdict::Fail).passes(&task.body) {
                if task.review_round < MAX_REVIEW_ROUNDS {
                    TaskStatus::Working
                } else {
                    TaskStatus::Stuck
                }
            } else {
                return Err(OrangeError::GateRejected {
                    gate: "Review",
                    reason: "body has no Review section with a PASS or FAIL verdict".into(),
                }
                .into());
            }
        }
        other => {
            return Err(OrangeError::InvalidArgument(format!(
                "nothing to complete from status '{}'",
                other
            ))
            .into());
        }
    };

    let task = ctx.engine.execute_transition(&task.id, to)?;
    println!("{} task is now {}", style("✔").green(), task.status);
    Ok(())
}

pub fn stuck(ctx: &Ctx, id: &str) -> Result<()> {
    ctx.engine.execute_transition(id, TaskStatus::Stuck)?;
    println!("{} task marked stuck", style("✔").green());
    Ok(())
}

pub fn merge(ctx: &Ctx, id: &str, strategy: MergeStrategy, local: bool) -> Result<()> {
    let task = ctx.deps.store.find_task(id)?;
    if task.status != TaskStatus::Reviewing {
        return Err(OrangeError::InvalidArgument(format!(
            "task is {}; only reviewing tasks can be merged",
            task.status
        ))
        .into());
    }
    let project = ctx.deps.store.get_project(&task.project)?;
    let repo = &project.path;

    // PR linking is best-effort; the merge does not depend on it.
    let pr = if ctx.deps.host.is_available(repo) {
        match ctx.deps.host.pr_status(repo, &task.branch) {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(task = %task.id, error = %e, "could not query PR status");
                None
            }
        }
    } else {
        None
    };
    if let Some(pr) = &pr
        && pr.exists
    {
        if pr.checks == ChecksState::Fail {
            println!(
                "{} PR checks are failing; merging anyway",
                style("!").yellow()
            );
        }
        if pr.review_decision.as_deref() == Some("CHANGES_REQUESTED") {
            println!(
                "{} PR review requested changes; merging anyway",
                style("!").yellow()
            );
        }
        if matches!(pr.state, Some(PrState::Merged)) {
            println!(
                "note: PR was already merged remotely{}",
                pr.merge_commit
                    .as_deref()
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default()
            );
        }
    }

    ctx.deps.git.fetch(repo)?;
    ctx.deps.git.checkout(repo, &project.default_branch)?;
    let current = ctx.deps.git.current_branch(repo)?;
    if current != project.default_branch {
        return Err(OrangeError::InvalidArgument(format!(
            "repository is on '{}' instead of '{}'; resolve its state first",
            current, project.default_branch
        ))
        .into());
    }
    ctx.deps
        .git
        .merge(repo, &task.branch, strategy)
        .with_context(|| format!("Merge of '{}' failed", task.branch))?;

    if !local {
        ctx.deps
            .git
            .push_branch(repo, &project.default_branch)
            .context("Merged locally, but pushing the default branch failed")?;
    }

    ctx.deps.store.append_event(
        &task,
        EventKind::TaskMerged {
            strategy: strategy.as_str().to_string(),
        },
    )?;
    if let Some(pr) = pr
        && pr.exists
    {
        ctx.deps
            .store
            .append_event(&task, EventKind::PrMerged { url: pr.url })?;
    }

    let task = ctx.engine.execute_transition(&task.id, TaskStatus::Done)?;
    info!(task = %task.id, branch = %task.branch, "task merged");
    println!(
        "{} '{}' merged into '{}' and task closed",
        style("✔").green(),
        task.branch,
        project.default_branch
    );
    Ok(())
}

pub fn cancel(ctx: &Ctx, id: &str, yes: bool) -> Result<()> {
    let task = ctx.deps.store.find_task(id)?;
    if task.status.is_terminal() {
        return Err(OrangeError::InvalidArgument(format!(
            "task is already {}",
            task.status
        ))
        .into());
    }

    if !yes
        && !confirm(&format!(
            "Cancel task {} ('{}', {})?",
            task.id, task.branch, task.status
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    let task = ctx.engine.execute_transition(&task.id, TaskStatus::Cancelled)?;
    ctx.deps
        .store
        .append_event(&task, EventKind::TaskCancelled {})?;
    println!("{} task cancelled", style("✔").green());
    Ok(())
}

pub fn delete(ctx: &Ctx, id: &str, yes: bool) -> Result<()> {
    let task = ctx.deps.store.find_task(id)?;

    if !yes
        && !confirm(&format!(
            "Delete task {} ('{}') and its history?",
            task.id, task.branch
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    if !task.status.is_terminal() {
        let task = ctx.engine.execute_transition(&task.id, TaskStatus::Cancelled)?;
        ctx.deps
            .store
            .append_event(&task, EventKind::TaskCancelled {})?;
    }

    let task = ctx.deps.store.find_task(id)?;
    ctx.deps.store.delete_task(&task)?;

    // Best-effort local branch cleanup; the branch may never have existed.
    if let Ok(project) = ctx.deps.store.get_project(&task.project)
        && ctx
            .deps
            .git
            .branch_exists(&project.path, &task.branch)
            .unwrap_or(false)
        && let Err(e) = ctx.deps.git.delete_branch(&project.path, &task.branch)
    {
        warn!(task = %task.id, branch = %task.branch, error = %e, "could not delete local branch");
    }

    println!("{} task deleted", style("✔").green());
    Ok(())
}

pub fn create_pr(ctx: &Ctx, id: &str) -> Result<()> {
    let mut task = ctx.deps.store.find_task(id)?;
    let project = ctx.deps.store.get_project(&task.project)?;

    if !ctx.deps.host.is_available(&project.path) {
        return Err(anyhow!(
            "code-hosting CLI is not available for this repository; push and open the PR manually"
        ));
    }

    // Reuse an existing PR instead of opening a duplicate.
    if let Ok(status) = ctx.deps.host.pr_status(&project.path, &task.branch)
        && status.exists
        && let Some(url) = status.url
    {
        task.pr_url = Some(url.clone());
        task.touch();
        ctx.deps.store.save_task(&task)?;
        println!("{} PR already exists: {}", style("✔").green(), url);
        return Ok(());
    }

    // Push from the worktree when the task still holds one (the branch is
    // checked out there); otherwise from the project repo.
    let push_from = match &task.workspace {
        Some(slot) => ctx.deps.data.workspace_dir(slot),
        None => project.path.clone(),
    };
    ctx.deps
        .git
        .push_branch(&push_from, &task.branch)
        .context("Failed to push the task branch")?;

    let title = if task.summary.is_empty() {
        task.branch.clone()
    } else {
        task.summary.clone()
    };
    let url = ctx.deps.host.create_pr(
        &project.path,
        &PrParams {
            head: &task.branch,
            base: &project.default_branch,
            title: &title,
            body: &task.body,
        },
    )?;

    task.pr_url = Some(url.clone());
    task.touch();
    ctx.deps.store.save_task(&task)?;
    ctx.deps
        .store
        .append_event(&task, EventKind::PrCreated { url: url.clone() })?;

    println!("{} {}", style("✔").green(), url);
    Ok(())
}

pub fn request_changes(ctx: &Ctx, id: &str) -> Result<()> {
    let task = ctx.engine.execute_transition(id, TaskStatus::Working)?;
    println!(
        "{} task sent back to the worker (round {})",
        style("✔").green(),
        task.review_round
    );
    Ok(())
}
