//! The workflow engine: a static transition table plus one entry point.
//!
//! Every status change a task can make is a row here; nothing outside the
//! table is allowed. A transition is: locate row, evaluate condition,
//! evaluate gate, commit the status write, then run hooks. Hook failures
//! after the commit are logged but never roll the transition back — status
//! is ground truth, resources are repaired via cancel or respawn.

pub mod hooks;
#[cfg(test)]
mod scenarios;
pub mod spawner;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::error::OrangeError;
use crate::gates::{Gate, Verdict};
use crate::git::Git;
use crate::history::EventKind;
use crate::host::Host;
use crate::multiplexer::Multiplexer;
use crate::paths::DataDir;
use crate::pool::WorkspacePool;
use crate::prompt::AgentVariant;
use crate::store::StateStore;
use crate::task::{Task, TaskStatus};

pub use hooks::{Hook, Hooks};

/// Shared dependencies threaded through the engine, hooks, monitor, and
/// commands.
#[derive(Clone)]
pub struct Deps {
    pub data: DataDir,
    pub store: StateStore,
    pub git: Arc<dyn Git>,
    pub mux: Arc<dyn Multiplexer>,
    pub host: Arc<dyn Host>,
    pub pool: Arc<WorkspacePool>,
}

/// Extra predicate a row may impose beyond its gate.
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    ReviewRoundBelow(u32),
    ReviewRoundAtLeast(u32),
}

impl Condition {
    fn holds(&self, task: &Task) -> bool {
        match self {
            Condition::ReviewRoundBelow(n) => task.review_round < *n,
            Condition::ReviewRoundAtLeast(n) => task.review_round >= *n,
        }
    }
}

/// One row of the transition table.
pub struct Transition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub gate: Option<Gate>,
    pub condition: Option<Condition>,
    pub hooks: &'static [Hook],
}

/// The authoritative transition table.
pub static TRANSITIONS: &[Transition] = &[
    Transition {
        from: TaskStatus::Pending,
        to: TaskStatus::Planning,
        gate: None,
        condition: None,
        hooks: &[Hook::AcquireWorkspace, Hook::SpawnAgent(AgentVariant::Worker)],
    },
    Transition {
        from: TaskStatus::Pending,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Planning,
        to: TaskStatus::Working,
        gate: Some(Gate::Plan),
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Planning,
        to: TaskStatus::Clarification,
        gate: None,
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Planning,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[Hook::KillSession, Hook::ReleaseWorkspace],
    },
    Transition {
        from: TaskStatus::Clarification,
        to: TaskStatus::Planning,
        gate: None,
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Clarification,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[Hook::KillSession, Hook::ReleaseWorkspace],
    },
    Transition {
        from: TaskStatus::Working,
        to: TaskStatus::AgentReview,
        gate: Some(Gate::Handoff),
        condition: None,
        hooks: &[Hook::SpawnReviewer, Hook::IncrementReviewRound],
    },
    Transition {
        from: TaskStatus::Working,
        to: TaskStatus::Clarification,
        gate: None,
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Working,
        to: TaskStatus::Stuck,
        gate: None,
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Working,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[Hook::KillSession, Hook::ReleaseWorkspace],
    },
    Transition {
        from: TaskStatus::AgentReview,
        to: TaskStatus::Reviewing,
        gate: Some(Gate::Review(Verdict::Pass)),
        condition: None,
        hooks: &[Hook::KillReviewer],
    },
    Transition {
        from: TaskStatus::AgentReview,
        to: TaskStatus::Working,
        gate: Some(Gate::Review(Verdict::Fail)),
        condition: Some(Condition::ReviewRoundBelow(2)),
        hooks: &[Hook::KillReviewer, Hook::NotifyWorker],
    },
    Transition {
        from: TaskStatus::AgentReview,
        to: TaskStatus::Stuck,
        gate: Some(Gate::Review(Verdict::Fail)),
        condition: Some(Condition::ReviewRoundAtLeast(2)),
        hooks: &[Hook::KillReviewer],
    },
    Transition {
        from: TaskStatus::AgentReview,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[Hook::KillReviewer, Hook::KillSession, Hook::ReleaseWorkspace],
    },
    Transition {
        from: TaskStatus::Reviewing,
        to: TaskStatus::Working,
        gate: None,
        condition: None,
        hooks: &[Hook::NotifyWorker],
    },
    Transition {
        from: TaskStatus::Reviewing,
        to: TaskStatus::Done,
        gate: None,
        condition: None,
        hooks: &[
            Hook::KillSession,
            Hook::ReleaseWorkspace,
            Hook::DeleteRemoteBranch,
            Hook::SpawnNext,
        ],
    },
    Transition {
        from: TaskStatus::Reviewing,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[Hook::KillSession, Hook::ReleaseWorkspace],
    },
    Transition {
        from: TaskStatus::Stuck,
        to: TaskStatus::Reviewing,
        gate: None,
        condition: None,
        hooks: &[],
    },
    Transition {
        from: TaskStatus::Stuck,
        to: TaskStatus::Cancelled,
        gate: None,
        condition: None,
        hooks: &[Hook::KillSession, Hook::ReleaseWorkspace],
    },
];

/// Look up a row by (from, to).
pub fn find_transition(from: TaskStatus, to: TaskStatus) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| t.from == from && t.to == to)
}

/// Hook execution seam. The engine calls hooks; some hooks (spawn_next,
/// release_workspace) re-enter the engine, so the engine hands itself to the
/// runner instead of the runner holding a back-reference. Tests inject
/// recording runners.
pub trait HookRunner: Send + Sync {
    fn run(&self, hook: Hook, task: &mut Task, engine: &Engine) -> Result<()>;
}

pub struct Engine {
    deps: Deps,
    hooks: Box<dyn HookRunner>,
}

impl Engine {
    pub fn new(deps: Deps, hooks: Box<dyn HookRunner>) -> Self {
        Self { deps, hooks }
    }

    /// Engine wired to the production hook executor.
    pub fn production(deps: Deps) -> Self {
        Self::new(deps, Box::new(Hooks))
    }

    pub fn deps(&self) -> &Deps {
        &self.deps
    }

    /// Drive a task to `to`, enforcing the table, condition, and gate.
    ///
    /// Once the status write has committed, hook failures are logged (and
    /// recorded as `agent.crashed` when they mean a lost agent) but never
    /// undo the transition.
    pub fn execute_transition(&self, task_id: &str, to: TaskStatus) -> Result<Task> {
        let mut task = self.deps.store.find_task(task_id)?;
        let from = task.status;

        let row = find_transition(from, to)
            .ok_or(OrangeError::NoTransition { from, to })?;

        if let Some(condition) = row.condition
            && !condition.holds(&task)
        {
            return Err(OrangeError::NoTransition { from, to }.into());
        }

        if let Some(gate) = row.gate {
            gate.check(&task.body)?;
        }

        task.status = to;
        task.touch();
        self.deps.store.save_task(&task)?;
        info!(task = %task.id, from = %from, to = %to, "transition committed");

        for hook in row.hooks {
            if let Err(e) = self.hooks.run(*hook, &mut task, self) {
                error!(task = %task.id, hook = ?hook, error = %e, "hook failed after committed transition");
                if hook.is_agent_spawn() {
                    let _ = self.deps.store.append_event(
                        &task,
                        EventKind::AgentCrashed {
                            crash_count: task.crash_count,
                        },
                    );
                }
            }
            // Flush hook mutations (workspace, session, review round).
            self.deps.store.save_task(&task)?;
        }

        task.crash_count = 0;
        task.touch();
        self.deps.store.save_task(&task)?;
        self.deps
            .store
            .append_event(&task, EventKind::StatusChanged { from, to })?;

        Ok(task)
    }

    /// Run a single hook outside a transition (spawn/respawn commands).
    pub fn run_hook(&self, hook: Hook, task: &mut Task) -> Result<()> {
        let result = self.hooks.run(hook, task, self);
        self.deps.store.save_task(task)?;
        result
    }

    /// Start the oldest pending task of a project, swallowing errors
    /// (`PoolExhausted` is the normal case when every slot is leased).
    pub fn spawn_next_pending(&self, project: &str) {
        spawner::spawn_next_pending(self, project);
    }
}

/// True when a (from, to) edge is a table row. History consumers use this to
/// check that every recorded `status.changed` was a legal transition.
#[cfg(test)]
pub fn edge_in_table(from: TaskStatus, to: TaskStatus) -> bool {
    find_transition(from, to).is_some()
}
