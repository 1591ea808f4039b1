use anyhow::Result;
use console::style;
use tabled::{Table, Tabled, settings::Style};

use super::Ctx;
use crate::project::Project;

pub fn init(ctx: &Ctx) -> Result<()> {
    let project = ctx.resolve_project()?;
    let created = ctx.deps.pool.init(&project)?;
    let stats = ctx.deps.pool.stats(&project)?;
    println!(
        "{} {} workspace(s) created; {} total, {} available",
        style("✔").green(),
        created,
        stats.total,
        stats.available
    );
    Ok(())
}

#[derive(Tabled)]
struct SlotRow {
    #[tabled(rename = "SLOT")]
    slot: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "TASK")]
    task: String,
}

pub fn list(ctx: &Ctx, all: bool) -> Result<()> {
    let projects: Vec<Project> = if all {
        ctx.deps.store.load_projects()?
    } else {
        vec![ctx.resolve_project()?]
    };

    for project in &projects {
        let stats = ctx.deps.pool.stats(project)?;
        println!(
            "{} ({} bound / {} total, pool size {})",
            style(&project.name).bold(),
            stats.bound,
            stats.total,
            stats.pool_size
        );

        let tasks = ctx.deps.store.list_tasks(Some(&project.name))?;
        let rows: Vec<SlotRow> = ctx
            .deps
            .pool
            .existing_slots(&project.name)?
            .into_iter()
            .map(|slot| {
                let holder = tasks
                    .iter()
                    .find(|t| t.workspace.as_deref() == Some(slot.as_str()));
                match holder {
                    Some(task) => SlotRow {
                        slot,
                        state: "bound".to_string(),
                        task: format!("{} ({})", task.id, task.branch),
                    },
                    None => SlotRow {
                        slot,
                        state: "available".to_string(),
                        task: "-".to_string(),
                    },
                }
            })
            .collect();

        if rows.is_empty() {
            println!("  (no workspaces on disk; created lazily on first spawn)");
        } else {
            let mut table = Table::new(rows);
            table.with(Style::blank());
            println!("{}", table);
        }
        println!();
    }
    Ok(())
}

pub fn gc(ctx: &Ctx) -> Result<()> {
    let projects = ctx.deps.store.load_projects()?;
    let removed = ctx.deps.pool.gc(&projects)?;
    for slot in &removed {
        println!("{} removed workspace {}", style("✔").green(), slot);
    }

    // Sessions named for tasks that no longer hold one are orphans
    // (left behind by crashes mid-hook); kill them too.
    let mut live_sessions = std::collections::HashSet::new();
    for task in ctx.deps.store.list_tasks(None)? {
        if let Some(session) = task.tmux_session {
            live_sessions.insert(session);
        }
    }
    let mut killed = 0;
    for session in ctx.deps.mux.list_sessions()? {
        let owned = projects
            .iter()
            .any(|p| session.starts_with(&format!("{}/", p.name)));
        if owned && !live_sessions.contains(&session) {
            ctx.deps.mux.kill_session_safe(&session);
            println!("{} killed orphan session {}", style("✔").green(), session);
            killed += 1;
        }
    }

    if removed.is_empty() && killed == 0 {
        println!("Nothing to clean up.");
    }
    Ok(())
}
