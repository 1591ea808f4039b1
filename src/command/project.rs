use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use console::style;
use tabled::{Table, Tabled, settings::Style};
use tracing::info;

use super::{Ctx, confirm};
use crate::error::OrangeError;
use crate::project::Project;

pub fn add(
    ctx: &Ctx,
    path: Option<&str>,
    name: Option<&str>,
    pool_size: Option<usize>,
) -> Result<()> {
    let path = PathBuf::from(path.unwrap_or("."));
    let path = path
        .canonicalize()
        .with_context(|| format!("No such directory: {}", path.display()))?;

    if !ctx.deps.git.is_git_root(&path)? {
        return Err(OrangeError::NotAGitRepo(path).into());
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("Could not derive a project name from the path"))?,
    };

    let pool_size = pool_size.unwrap_or(2);
    if pool_size == 0 {
        return Err(OrangeError::InvalidArgument("pool size must be at least 1".into()).into());
    }

    let default_branch = ctx
        .deps
        .git
        .default_branch(&path)
        .context("Could not determine the repository's default branch")?;

    let project = Project {
        name: name.clone(),
        path,
        default_branch,
        pool_size,
    };
    ctx.deps.store.add_project(project)?;
    info!(project = name, "project registered");
    println!("{} project '{}' registered", style("✔").green(), name);
    Ok(())
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "BRANCH")]
    branch: String,
    #[tabled(rename = "POOL")]
    pool: String,
}

pub fn list(ctx: &Ctx) -> Result<()> {
    let projects = ctx.deps.store.load_projects()?;
    if projects.is_empty() {
        println!("No projects registered. Run 'orange project add' in a git repository.");
        return Ok(());
    }

    let rows: Vec<ProjectRow> = projects
        .iter()
        .map(|p| {
            let stats = ctx.deps.pool.stats(p);
            let pool = match stats {
                Ok(s) => format!("{}/{}", s.bound, s.pool_size),
                Err(_) => format!("?/{}", p.pool_size),
            };
            ProjectRow {
                name: p.name.clone(),
                path: p.path.display().to_string(),
                branch: p.default_branch.clone(),
                pool,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::blank());
    println!("{}", table);
    Ok(())
}

pub fn update(ctx: &Ctx, name: Option<&str>, pool_size: Option<usize>) -> Result<()> {
    let mut project = match name {
        Some(name) => ctx.deps.store.get_project(name)?,
        None => ctx.resolve_project()?,
    };

    let Some(pool_size) = pool_size else {
        return Err(OrangeError::InvalidArgument("nothing to update".into()).into());
    };
    if pool_size == 0 {
        return Err(OrangeError::InvalidArgument("pool size must be at least 1".into()).into());
    }

    project.pool_size = pool_size;
    ctx.deps.store.update_project(project.clone())?;
    info!(project = project.name, pool_size, "project updated");
    println!(
        "{} project '{}' now has pool size {}",
        style("✔").green(),
        project.name,
        pool_size
    );
    Ok(())
}

pub fn remove(ctx: &Ctx, name: &str, yes: bool) -> Result<()> {
    let project = ctx.deps.store.get_project(name)?;
    let open_tasks = ctx
        .deps
        .store
        .list_tasks(Some(name))?
        .iter()
        .filter(|t| !t.status.is_terminal())
        .count();

    if open_tasks > 0 {
        return Err(OrangeError::InvalidArgument(format!(
            "project '{}' still has {} open task(s); cancel them first",
            name, open_tasks
        ))
        .into());
    }

    if !yes && !confirm(&format!("Remove project '{}'?", name))? {
        println!("Aborted.");
        return Ok(());
    }

    ctx.deps.store.remove_project(name)?;
    info!(project = name, "project removed");
    println!(
        "{} project '{}' removed; its workspaces remain until 'orange workspace gc'",
        style("✔").green(),
        project.name
    );
    Ok(())
}
