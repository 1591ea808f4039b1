//! Exit monitor: detects dead agent sessions and applies per-status
//! auto-advance or crash-escalation rules.
//!
//! The artifact body is treated as the agent's recorded intent — it wrote its
//! conclusion to disk before dying, and the engine reads it. The monitor is
//! the only component allowed to synthesise transitions from a dead session,
//! and it never invents artifacts: if the expected section is missing, the
//! death counts as a crash.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::gates::{Gate, Verdict};
use crate::history::EventKind;
use crate::task::{Task, TaskStatus};

/// Crashes tolerated before a task is parked as stuck.
pub const CRASH_THRESHOLD: u32 = 2;

/// Review rounds allowed before a FAIL verdict parks the task.
pub const MAX_REVIEW_ROUNDS: u32 = 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub advanced: usize,
    pub crashed: usize,
    pub escalated: usize,
}

/// One pass over all non-terminal tasks.
pub fn scan(engine: &Engine) -> Result<ScanReport> {
    let deps = engine.deps();
    let mut report = ScanReport::default();

    for task in deps.store.list_tasks(None)? {
        if task.status.is_terminal() || !task.status.expects_session() {
            continue;
        }
        let Some(session) = &task.tmux_session else {
            continue;
        };
        report.scanned += 1;

        let alive = deps.mux.session_exists(session).unwrap_or(false);
        if alive {
            continue;
        }

        debug!(task = %task.id, session, status = %task.status, "dead session detected");
        apply_auto_advance_rules(engine, &task, &mut report)?;
    }

    Ok(report)
}

/// Decide what a dead session means for a task in its current status.
fn apply_auto_advance_rules(engine: &Engine, task: &Task, report: &mut ScanReport) -> Result<()> {
    match task.status {
        TaskStatus::Planning => {
            if Gate::Plan.passes(&task.body) {
                advance(engine, task, TaskStatus::Working, report)
            } else {
                crashed(engine, task, report)
            }
        }
        TaskStatus::Working => {
            if Gate::Handoff.passes(&task.body) {
                advance(engine, task, TaskStatus::AgentReview, report)
            } else {
                crashed(engine, task, report)
            }
        }
        TaskStatus::AgentReview => {
            if Gate::Review(Verdict::Pass).passes(&task.body) {
                advance(engine, task, TaskStatus::Reviewing, report)
            } else if Gate::Review(Verdict::Fail).passes(&task.body) {
                let to = if task.review_round < MAX_REVIEW_ROUNDS {
                    TaskStatus::Working
                } else {
                    TaskStatus::Stuck
                };
                advance(engine, task, to, report)
            } else {
                crashed(engine, task, report)
            }
        }
        // Operator-owned states: never auto-advance.
        TaskStatus::Clarification | TaskStatus::Reviewing | TaskStatus::Stuck => {
            crashed(engine, task, report)
        }
        TaskStatus::Pending | TaskStatus::Done | TaskStatus::Cancelled => Ok(()),
    }
}

/// The agent left the expected artifact behind: run the normal transition
/// and record that the monitor drove it.
fn advance(
    engine: &Engine,
    task: &Task,
    to: TaskStatus,
    report: &mut ScanReport,
) -> Result<()> {
    let from = task.status;
    match engine.execute_transition(&task.id, to) {
        Ok(advanced) => {
            engine.deps().store.append_event(
                &advanced,
                EventKind::AutoAdvanced {
                    from,
                    to,
                    reason: "session-exited".to_string(),
                },
            )?;
            info!(task = %task.id, from = %from, to = %to, "auto-advanced after session exit");
            report.advanced += 1;
            Ok(())
        }
        Err(e) => {
            warn!(task = %task.id, from = %from, to = %to, error = %e, "auto-advance failed");
            crashed(engine, task, report)
        }
    }
}

/// No usable artifact: count a crash; past the threshold, park as stuck.
fn crashed(engine: &Engine, task: &Task, report: &mut ScanReport) -> Result<()> {
    let deps = engine.deps();
    let mut task = deps.store.load_task(&task.project, &task.id)?;
    task.crash_count += 1;
    task.touch();
    deps.store.save_task(&task)?;
    deps.store.append_event(
        &task,
        EventKind::AgentCrashed {
            crash_count: task.crash_count,
        },
    )?;
    warn!(task = %task.id, crash_count = task.crash_count, "agent crashed");
    report.crashed += 1;

    if task.crash_count >= CRASH_THRESHOLD && task.status != TaskStatus::Stuck {
        let from = task.status;
        task.status = TaskStatus::Stuck;
        task.touch();
        deps.store.save_task(&task)?;
        deps.store.append_event(
            &task,
            EventKind::AutoAdvanced {
                from,
                to: TaskStatus::Stuck,
                reason: "crash-threshold".to_string(),
            },
        )?;
        info!(task = %task.id, from = %from, "escalated to stuck after repeated crashes");
        report.escalated += 1;
        notify_desktop(&task);
    }

    Ok(())
}

/// Best-effort desktop notification on escalation; the dashboard is the
/// authoritative surface.
#[cfg(not(test))]
fn notify_desktop(task: &Task) {
    let result = notify_rust::Notification::new()
        .summary("orange: task stuck")
        .body(&format!(
            "{} ({}) crashed repeatedly and was parked as stuck",
            task.branch, task.project
        ))
        .show();
    if let Err(e) = result {
        debug!(error = %e, "desktop notification failed");
    }
}

#[cfg(test)]
fn notify_desktop(_task: &Task) {}
