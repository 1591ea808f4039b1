//! End-to-end lifecycle tests driven through the engine with the in-memory
//! adapter doubles.

use super::*;
use crate::history::EventKind;
use crate::prompt::AgentVariant;
use crate::testutil::Fixture;

const PLAN: &str = "## Plan\nAPPROACH: use Y\n";
const HANDOFF: &str = "## Handoff\nDONE: Y implemented\n";
const REVIEW_PASS: &str = "## Review\nVerdict: PASS\n";
const REVIEW_FAIL: &str = "## Review\nVerdict: FAIL\n";

#[test]
fn happy_path_from_pending_to_done() {
    let f = Fixture::new(2);
    let t1 = f.create_task("feature-x", "Add X");

    // pending -> planning: slot bound, worker session exists.
    f.engine
        .execute_transition(&t1.id, TaskStatus::Planning)
        .unwrap();
    let task = f.task(&t1.id);
    assert_eq!(task.status, TaskStatus::Planning);
    assert_eq!(task.workspace.as_deref(), Some("orange--1"));
    assert_eq!(task.tmux_session.as_deref(), Some("orange/feature-x"));
    let session = f.mux.session(&task.session_name()).unwrap();
    assert_eq!(session.windows, vec!["worker"]);
    assert!(session.command.unwrap().contains("claude"));

    // Worktree got the marker and the task symlink.
    let worktree = f.workspace_path("orange--1");
    assert!(worktree.join(".orange-task").exists());
    assert!(worktree.join("TASK.md").symlink_metadata().is_ok());

    // Plan gate refuses until the artifact exists.
    let err = f
        .engine
        .execute_transition(&t1.id, TaskStatus::Working)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OrangeError>(),
        Some(OrangeError::GateRejected { gate: "Plan", .. })
    ));

    f.set_body(&t1.id, PLAN);
    f.engine
        .execute_transition(&t1.id, TaskStatus::Working)
        .unwrap();
    // Worker session survives the state change.
    assert!(f.mux.session("orange/feature-x").is_some());

    // working -> agent-review spawns the reviewer in a background window.
    f.append_body(&t1.id, HANDOFF);
    f.engine
        .execute_transition(&t1.id, TaskStatus::AgentReview)
        .unwrap();
    let task = f.task(&t1.id);
    assert_eq!(task.review_round, 1);
    let session = f.mux.session("orange/feature-x").unwrap();
    assert_eq!(session.windows, vec!["worker", "review-1"]);

    // agent-review -> reviewing kills the review window, not the session.
    f.append_body(&t1.id, REVIEW_PASS);
    f.engine
        .execute_transition(&t1.id, TaskStatus::Reviewing)
        .unwrap();
    assert!(
        f.mux
            .killed_windows()
            .contains(&"orange/feature-x:review-1".to_string())
    );
    assert!(f.mux.session("orange/feature-x").is_some());

    // reviewing -> done: session gone, slot released, remote branch deleted.
    f.engine
        .execute_transition(&t1.id, TaskStatus::Done)
        .unwrap();
    let task = f.task(&t1.id);
    assert_eq!(task.status, TaskStatus::Done);
    assert!(task.workspace.is_none());
    assert!(task.tmux_session.is_none());
    assert_eq!(task.crash_count, 0);
    assert!(f.mux.session("orange/feature-x").is_none());
    assert!(
        f.git
            .calls()
            .contains(&"delete_remote_branch feature-x".to_string())
    );

    // History: append-only, monotone timestamps, edges all in the table.
    let events = f.history(&t1.id);
    for pair in events.windows(2) {
        assert!(pair[1].timestamp >= pair[0].timestamp);
    }
    for event in &events {
        if let EventKind::StatusChanged { from, to } = &event.kind {
            assert!(edge_in_table(*from, *to), "untracked edge {from} -> {to}");
        }
    }
    let changes: Vec<(TaskStatus, TaskStatus)> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::StatusChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            (TaskStatus::Pending, TaskStatus::Planning),
            (TaskStatus::Planning, TaskStatus::Working),
            (TaskStatus::Working, TaskStatus::AgentReview),
            (TaskStatus::AgentReview, TaskStatus::Reviewing),
            (TaskStatus::Reviewing, TaskStatus::Done),
        ]
    );
}

#[test]
fn review_bounce_ends_stuck_after_second_fail() {
    let f = Fixture::new(2);
    let t1 = f.create_task("feature-x", "Add X");
    f.engine
        .execute_transition(&t1.id, TaskStatus::Planning)
        .unwrap();
    f.set_body(&t1.id, &format!("{PLAN}{HANDOFF}"));
    f.engine
        .execute_transition(&t1.id, TaskStatus::Working)
        .unwrap();
    f.engine
        .execute_transition(&t1.id, TaskStatus::AgentReview)
        .unwrap();

    // First FAIL: round 1 < 2 routes back to working and notifies the worker.
    f.append_body(&t1.id, REVIEW_FAIL);
    f.engine
        .execute_transition(&t1.id, TaskStatus::Working)
        .unwrap();
    assert!(
        f.mux
            .killed_windows()
            .contains(&"orange/feature-x:review-1".to_string())
    );
    let notices = f.mux.sent_to("orange/feature-x:worker");
    assert!(notices.iter().any(|n| n.contains("Review complete")));
    assert!(notices.iter().any(|n| n.contains("<Enter>")));

    // Second round: fresh handoff, reviewer window review-2.
    f.set_body(&t1.id, &format!("{PLAN}{HANDOFF}"));
    f.engine
        .execute_transition(&t1.id, TaskStatus::AgentReview)
        .unwrap();
    let task = f.task(&t1.id);
    assert_eq!(task.review_round, 2);
    let session = f.mux.session("orange/feature-x").unwrap();
    assert!(session.windows.contains(&"review-2".to_string()));

    // Second FAIL: the round clamp refuses working and routes to stuck.
    f.append_body(&t1.id, REVIEW_FAIL);
    let err = f
        .engine
        .execute_transition(&t1.id, TaskStatus::Working)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OrangeError>(),
        Some(OrangeError::NoTransition { .. })
    ));
    f.engine
        .execute_transition(&t1.id, TaskStatus::Stuck)
        .unwrap();
    assert_eq!(f.task(&t1.id).status, TaskStatus::Stuck);
}

#[test]
fn cancel_is_absorbing_from_any_nonterminal_state() {
    for (branch, advance_to) in [
        ("b-pending", None),
        ("b-planning", Some(TaskStatus::Planning)),
    ] {
        let f = Fixture::new(2);
        let t = f.create_task(branch, "Add X");
        if let Some(to) = advance_to {
            f.engine.execute_transition(&t.id, to).unwrap();
        }

        f.engine
            .execute_transition(&t.id, TaskStatus::Cancelled)
            .unwrap();
        let task = f.task(&t.id);
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.workspace.is_none());
        assert!(task.tmux_session.is_none());
        assert!(f.mux.session(&task.session_name()).is_none());
    }
}

#[test]
fn pool_pressure_spawns_next_pending_on_cancel() {
    let f = Fixture::new(1);
    let mut t1 = f.create_task("first", "Add first");
    let mut t2 = f.create_task("second", "Add second");
    // Make the FIFO order deterministic.
    t1.created_at = 100;
    t2.created_at = 200;
    f.store.save_task(&t1).unwrap();
    f.store.save_task(&t2).unwrap();

    f.engine
        .execute_transition(&t1.id, TaskStatus::Planning)
        .unwrap();
    assert_eq!(f.task(&t1.id).workspace.as_deref(), Some("orange--1"));

    // Pool of one: the spawner leaves t2 pending.
    f.engine.spawn_next_pending("orange");
    assert_eq!(f.task(&t2.id).status, TaskStatus::Pending);

    // Cancelling t1 releases the slot, and the release hook starts t2.
    f.engine
        .execute_transition(&t1.id, TaskStatus::Cancelled)
        .unwrap();
    let t2 = f.task(&t2.id);
    assert_eq!(t2.status, TaskStatus::Planning);
    assert_eq!(t2.workspace.as_deref(), Some("orange--1"));
    assert!(f.mux.session("orange/second").is_some());
}

#[test]
fn clarification_task_gets_bare_harness_and_no_hooks_on_fill() {
    let f = Fixture::new(2);
    let t = f.create_task("vague", "");
    assert_eq!(t.status, TaskStatus::Clarification);

    // Spawn path for clarification: workspace + bare harness, no transition.
    let mut task = f.task(&t.id);
    f.engine.run_hook(Hook::AcquireWorkspace, &mut task).unwrap();
    f.engine
        .run_hook(Hook::SpawnAgent(AgentVariant::Worker), &mut task)
        .unwrap();
    let session = f.mux.session("orange/vague").unwrap();
    // Empty prompt launches the bare binary.
    assert_eq!(session.command.as_deref(), Some("claude"));
    assert_eq!(f.task(&t.id).status, TaskStatus::Clarification);

    // Operator fills the summary; clarification -> planning runs no hooks.
    let mut task = f.task(&t.id);
    task.summary = "Now specified".to_string();
    f.store.save_task(&task).unwrap();
    let sessions_before = f.mux.session_names();
    f.engine
        .execute_transition(&t.id, TaskStatus::Planning)
        .unwrap();
    assert_eq!(f.mux.session_names(), sessions_before);
    assert_eq!(f.task(&t.id).status, TaskStatus::Planning);
}

#[test]
fn branch_in_use_releases_the_provisional_slot() {
    let f = Fixture::new(2);
    let t = f.create_task("feature-x", "Add X");
    f.git.add_branch(&f.project.path, "feature-x");
    f.git.mark_branch_in_use("feature-x");

    // The status write commits, then the acquire hook fails BranchInUse.
    f.engine
        .execute_transition(&t.id, TaskStatus::Planning)
        .unwrap();
    let task = f.task(&t.id);
    assert_eq!(task.status, TaskStatus::Planning);
    assert!(task.workspace.is_none(), "slot must not stay bound");

    // The slot is back in the pool for the next task.
    let t2 = f.create_task("other", "Add other");
    f.engine
        .execute_transition(&t2.id, TaskStatus::Planning)
        .unwrap();
    assert_eq!(f.task(&t2.id).workspace.as_deref(), Some("orange--1"));
}

#[test]
fn no_transition_outside_the_table() {
    let f = Fixture::new(2);
    let t = f.create_task("feature-x", "Add X");
    let err = f
        .engine
        .execute_transition(&t.id, TaskStatus::Done)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OrangeError>(),
        Some(OrangeError::NoTransition { .. })
    ));
    // Refused transitions leave the document untouched.
    assert_eq!(f.task(&t.id).status, TaskStatus::Pending);
}

#[test]
fn hook_failure_does_not_roll_back_the_transition() {
    let f = Fixture::new(2);
    let t = f.create_task("feature-x", "Add X");
    f.engine
        .execute_transition(&t.id, TaskStatus::Planning)
        .unwrap();
    f.set_body(&t.id, &format!("{PLAN}{HANDOFF}"));
    f.engine
        .execute_transition(&t.id, TaskStatus::Working)
        .unwrap();

    // Kill the session so spawn_reviewer fails mid-hook-list.
    f.mux.drop_session("orange/feature-x");
    f.engine
        .execute_transition(&t.id, TaskStatus::AgentReview)
        .unwrap();

    let task = f.task(&t.id);
    assert_eq!(task.status, TaskStatus::AgentReview);
    // Later hooks still ran.
    assert_eq!(task.review_round, 1);
    // The lost reviewer shows up in history.
    assert!(
        f.history(&t.id)
            .iter()
            .any(|e| matches!(e.kind, EventKind::AgentCrashed { .. }))
    );
}

#[test]
fn workspace_binding_is_exclusive_and_bounded() {
    let f = Fixture::new(2);
    let a = f.create_task("a", "A");
    let b = f.create_task("b", "B");
    let c = f.create_task("c", "C");

    f.engine.execute_transition(&a.id, TaskStatus::Planning).unwrap();
    f.engine.execute_transition(&b.id, TaskStatus::Planning).unwrap();
    // Third acquire fails inside the hook; no slot may ever be double-bound.
    let _ = f.engine.execute_transition(&c.id, TaskStatus::Planning);

    let tasks = f.store.list_tasks(Some("orange")).unwrap();
    let bound: Vec<&str> = tasks.iter().filter_map(|t| t.workspace.as_deref()).collect();
    assert!(bound.len() <= 2);
    let mut unique = bound.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(bound.len(), unique.len(), "two tasks share a slot");
}
