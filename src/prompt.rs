//! Prompt construction for agent variants.
//!
//! Each variant renders a minijinja template with the task's context. The
//! worker prompt spans the whole lifecycle — the agent is told how to move
//! the task itself via `orange task complete`, and the stop hook covers the
//! cases where it exits without doing so.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::task::Task;

/// The kinds of agent launches the engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentVariant {
    /// Fresh worker for a new task
    Worker,
    /// Worker resumed after a crash or manual respawn
    WorkerRespawn,
    /// Worker resumed while a review is still running
    WorkerWait,
    /// Short-lived reviewer in a background window
    Reviewer,
    /// Worker resumed on a stuck task with repair instructions
    StuckFix,
}

impl AgentVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentVariant::Worker => "worker",
            AgentVariant::WorkerRespawn => "worker_respawn",
            AgentVariant::WorkerWait => "worker_wait",
            AgentVariant::Reviewer => "reviewer",
            AgentVariant::StuckFix => "stuck_fix",
        }
    }

    /// Window name for this variant; workers all share the primary window.
    pub fn window_name(&self) -> &'static str {
        match self {
            AgentVariant::Reviewer => "reviewer",
            _ => "worker",
        }
    }

    pub fn is_respawn(&self) -> bool {
        matches!(
            self,
            AgentVariant::WorkerRespawn | AgentVariant::WorkerWait | AgentVariant::StuckFix
        )
    }
}

const WORKER_TEMPLATE: &str = r#"You are the worker agent for task {{ id }} on branch `{{ branch }}`.

Task: {{ summary }}

Your task file is TASK.md in this directory. Work in phases:

1. Read the code and write a `## Plan` section into TASK.md containing an
   `APPROACH:` line that states how you will implement the task. Then run
   `orange task complete {{ id }}` to submit the plan.
2. Implement the task on this branch, committing as you go.
3. When the implementation is complete, write a `## Handoff` section into
   TASK.md containing a `DONE:` line summarising what was done, then run
   `orange task complete {{ id }}` again to request review.

If you are blocked and cannot continue, write what you know into TASK.md,
set the outcome field in .orange-task to "stuck", and run
`orange task stuck {{ id }}`.
"#;

const WORKER_RESPAWN_TEMPLATE: &str = r#"You are resuming work on task {{ id }} (branch `{{ branch }}`).

Task: {{ summary }}

Re-read TASK.md for your earlier plan and notes, inspect the current state of
the branch, and continue from where the previous session stopped. The phase
rules are unchanged: `## Plan` with an APPROACH: line before implementing,
`## Handoff` with a DONE: line when finished, and
`orange task complete {{ id }}` to advance.
"#;

const WORKER_WAIT_TEMPLATE: &str = r#"You are resuming task {{ id }} (branch `{{ branch }}`) while a review is in
progress. Do not change code yet. Wait for the review notice; when the
review requests changes they will appear in the `## Review` section of
TASK.md.
"#;

const REVIEWER_TEMPLATE: &str = r#"You are the reviewer for task {{ id }} on branch `{{ branch }}` (round {{ round }}).

Task: {{ summary }}

Review the committed changes on this branch against the task description and
the `## Plan` and `## Handoff` sections of TASK.md. Then append a `## Review`
section to TASK.md with your findings, ending with exactly one of:

    Verdict: PASS
    Verdict: FAIL

When done, run `orange task complete {{ id }}`.
"#;

const STUCK_FIX_TEMPLATE: &str = r#"Task {{ id }} (branch `{{ branch }}`) is marked stuck.

Task: {{ summary }}

Read TASK.md — including any `## Review` feedback — and the branch history to
understand what went wrong. Fix the problem, update the `## Handoff` section,
and run `orange task complete {{ id }}` when the task is ready for review
again.
"#;

/// Render the prompt for a variant. Empty summary means clarification mode:
/// the worker prompt is empty and the harness is launched bare.
pub fn render(variant: AgentVariant, task: &Task) -> Result<String> {
    if task.summary.is_empty() && variant != AgentVariant::Reviewer {
        return Ok(String::new());
    }

    let template = match variant {
        AgentVariant::Worker => WORKER_TEMPLATE,
        AgentVariant::WorkerRespawn => WORKER_RESPAWN_TEMPLATE,
        AgentVariant::WorkerWait => WORKER_WAIT_TEMPLATE,
        AgentVariant::Reviewer => REVIEWER_TEMPLATE,
        AgentVariant::StuckFix => STUCK_FIX_TEMPLATE,
    };

    let mut env = Environment::new();
    env.add_template(variant.as_str(), template)
        .context("Failed to register prompt template")?;
    let rendered = env
        .get_template(variant.as_str())
        .context("Prompt template missing")?
        .render(context! {
            id => task.id,
            branch => task.branch,
            summary => task.summary,
            round => task.review_round + 1,
        })
        .context("Failed to render prompt")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(summary: &str) -> Task {
        Task::new("orange", "feature-x", summary, "claude").unwrap()
    }

    #[test]
    fn worker_prompt_names_task_and_callbacks() {
        let t = task("Add X");
        let p = render(AgentVariant::Worker, &t).unwrap();
        assert!(p.contains("feature-x"));
        assert!(p.contains("Add X"));
        assert!(p.contains(&format!("orange task complete {}", t.id)));
        assert!(p.contains("## Plan"));
        assert!(p.contains("## Handoff"));
    }

    #[test]
    fn empty_summary_renders_empty_worker_prompt() {
        let t = task("");
        assert!(render(AgentVariant::Worker, &t).unwrap().is_empty());
        assert!(render(AgentVariant::WorkerRespawn, &t).unwrap().is_empty());
    }

    #[test]
    fn reviewer_prompt_carries_round_and_verdict_forms() {
        let mut t = task("Add X");
        t.review_round = 1;
        let p = render(AgentVariant::Reviewer, &t).unwrap();
        assert!(p.contains("round 2"));
        assert!(p.contains("Verdict: PASS"));
        assert!(p.contains("Verdict: FAIL"));
    }

    #[test]
    fn variants_map_to_windows() {
        assert_eq!(AgentVariant::Worker.window_name(), "worker");
        assert_eq!(AgentVariant::StuckFix.window_name(), "worker");
        assert_eq!(AgentVariant::Reviewer.window_name(), "reviewer");
    }
}
