//! FIFO spawner: when a workspace frees up, the oldest pending task of the
//! project gets it.

use tracing::{debug, warn};

use super::Engine;
use crate::task::TaskStatus;

/// Start the oldest pending task (by `created_at`, id as tiebreak) of a
/// project. Errors are swallowed with a log line — `PoolExhausted` is the
/// expected outcome when every slot is still leased.
pub fn spawn_next_pending(engine: &Engine, project: &str) {
    match engine
        .deps()
        .store
        .get_project(project)
        .and_then(|p| engine.deps().pool.has_capacity(&p))
    {
        Ok(true) => {}
        Ok(false) => {
            debug!(project, "spawner: pool exhausted; leaving tasks pending");
            return;
        }
        Err(e) => {
            warn!(project, error = %e, "spawner: could not check pool capacity");
            return;
        }
    }

    let next = match engine.deps().store.list_tasks(Some(project)) {
        Ok(tasks) => tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))),
        Err(e) => {
            warn!(project, error = %e, "spawner: could not list tasks");
            return;
        }
    };

    let Some(task) = next else {
        debug!(project, "spawner: no pending tasks");
        return;
    };

    match engine.execute_transition(&task.id, TaskStatus::Planning) {
        Ok(_) => debug!(project, task = %task.id, "spawner: started next pending task"),
        Err(e) => warn!(project, task = %task.id, error = %e, "spawner: could not start task"),
    }
}
