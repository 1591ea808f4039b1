use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::OrangeError;
use crate::git::Git;
use crate::paths::DataDir;
use crate::project::{Project, slot_ordinal};
use crate::store::StateStore;

/// Files the engine drops into a worktree; excluded per-worktree so agents
/// never see them as untracked changes.
const EXCLUDE_ENTRIES: &[&str] = &["TASK.md", ".orange-task", ".orange-prompt*"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub bound: usize,
    pub pool_size: usize,
}

/// Bounded per-project lease of git worktree directories.
///
/// The pool owns the directories under `workspaces/`; the task documents own
/// the bindings (a slot is bound iff some task names it). Acquire and release
/// serialise per project behind a named mutex because lazy slot creation and
/// release reset both touch the worktree filesystem and the binding set.
pub struct WorkspacePool {
    data: DataDir,
    store: StateStore,
    git: Arc<dyn Git>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkspacePool {
    pub fn new(data: DataDir, store: StateStore, git: Arc<dyn Git>) -> Self {
        Self {
            data,
            store,
            git,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("pool lock poisoned");
        locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Lease a slot for a task. Reuses the first unbound slot; lazily creates
    /// a new one while under `pool_size`; otherwise fails `PoolExhausted`.
    pub fn acquire(&self, project: &Project, task_tag: &str) -> Result<String> {
        let lock = self.project_lock(&project.name);
        let _guard = lock.lock().expect("project lock poisoned");

        let bound = self.bound_slots(&project.name)?;
        let existing = self.existing_slots(&project.name)?;

        for slot in &existing {
            if !bound.contains(slot) {
                debug!(slot, task = task_tag, "pool:reusing slot");
                return Ok(slot.clone());
            }
        }

        if existing.len() < project.pool_size {
            let slot = self.create_slot(project, existing.len() + 1)?;
            info!(slot, task = task_tag, "pool:created slot");
            return Ok(slot);
        }

        Err(OrangeError::PoolExhausted {
            used: bound.len(),
            size: project.pool_size,
        }
        .into())
    }

    /// Release a slot and reset its worktree to the project's default branch.
    ///
    /// The binding must already be gone from the task documents unless
    /// `force` — the bind is cleared before any filesystem work happens, so a
    /// crash mid-reset leaves the slot discoverable, just unbound. Reset
    /// failures keep the slot; they are logged, not fatal.
    pub fn release(&self, project: &Project, slot: &str, force: bool) -> Result<()> {
        let lock = self.project_lock(&project.name);
        let _guard = lock.lock().expect("project lock poisoned");

        if !force {
            let bound = self.bound_slots(&project.name)?;
            if bound.contains(slot) {
                return Err(OrangeError::InvalidArgument(format!(
                    "slot '{}' is still bound to a task; clear the task's workspace first",
                    slot
                ))
                .into());
            }
        }

        let path = self.data.workspace_dir(slot);
        if !path.exists() {
            warn!(slot, "pool:release of a slot with no worktree on disk");
            return Ok(());
        }

        if let Err(e) = self.reset_worktree(project, &path) {
            warn!(slot, error = %e, "pool:worktree reset failed; slot kept for manual repair");
        } else {
            debug!(slot, "pool:slot reset");
        }
        Ok(())
    }

    /// Pre-create slots up to `pool_size`. Idempotent.
    pub fn init(&self, project: &Project) -> Result<usize> {
        let lock = self.project_lock(&project.name);
        let _guard = lock.lock().expect("project lock poisoned");

        let existing = self.existing_slots(&project.name)?;
        let mut created = 0;
        for n in existing.len() + 1..=project.pool_size {
            self.create_slot(project, n)?;
            created += 1;
        }
        Ok(created)
    }

    /// True when an acquire would succeed: a free slot exists or one can
    /// still be created. The spawner checks this before starting a
    /// transition so a full pool leaves the task pending.
    pub fn has_capacity(&self, project: &Project) -> Result<bool> {
        let stats = self.stats(project)?;
        Ok(stats.available > 0 || stats.total < stats.pool_size)
    }

    pub fn stats(&self, project: &Project) -> Result<PoolStats> {
        let bound = self.bound_slots(&project.name)?;
        let existing = self.existing_slots(&project.name)?;
        let bound_count = existing.iter().filter(|s| bound.contains(*s)).count();
        Ok(PoolStats {
            total: existing.len(),
            available: existing.len() - bound_count,
            bound: bound_count,
            pool_size: project.pool_size,
        })
    }

    /// Slots a project has on disk, ordered by ordinal.
    pub fn existing_slots(&self, project: &str) -> Result<Vec<String>> {
        let dir = self.data.workspaces_dir();
        let mut slots = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(slots),
        };
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if slot_ordinal(project, &name).is_some() {
                slots.push(name);
            }
        }
        slots.sort_by_key(|s| slot_ordinal(project, s).unwrap_or(usize::MAX));
        Ok(slots)
    }

    /// The authoritative binding set, derived from task documents.
    pub fn bound_slots(&self, project: &str) -> Result<HashSet<String>> {
        Ok(self
            .store
            .list_tasks(Some(project))?
            .into_iter()
            .filter_map(|t| t.workspace)
            .collect())
    }

    /// Remove unbound slots beyond the current pool size, plus slot
    /// directories whose project is no longer registered.
    pub fn gc(&self, projects: &[Project]) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        for project in projects {
            let lock = self.project_lock(&project.name);
            let _guard = lock.lock().expect("project lock poisoned");

            let bound = self.bound_slots(&project.name)?;
            for slot in self.existing_slots(&project.name)? {
                let ordinal = slot_ordinal(&project.name, &slot).unwrap_or(0);
                if ordinal > project.pool_size && !bound.contains(&slot) {
                    let path = self.data.workspace_dir(&slot);
                    self.git.remove_worktree(&project.path, &path)?;
                    removed.push(slot);
                }
            }
        }

        // Orphaned directories: no registered project claims them.
        let dir = self.data.workspaces_dir();
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let owned = projects
                    .iter()
                    .any(|p| slot_ordinal(&p.name, &name).is_some());
                if !owned && entry.path().is_dir() {
                    fs::remove_dir_all(entry.path()).with_context(|| {
                        format!("Failed to remove orphaned workspace '{}'", name)
                    })?;
                    removed.push(name);
                }
            }
        }

        Ok(removed)
    }

    fn create_slot(&self, project: &Project, ordinal: usize) -> Result<String> {
        let slot = project.slot_name(ordinal);
        let path = self.data.workspace_dir(&slot);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.git
            .add_worktree(&project.path, &path, &project.default_branch)
            .with_context(|| format!("Failed to create workspace '{}'", slot))?;
        if let Err(e) = seed_exclude(&path) {
            warn!(slot, error = %e, "pool:could not seed worktree excludes");
        }
        Ok(slot)
    }

    fn reset_worktree(&self, project: &Project, path: &Path) -> Result<()> {
        let origin_default = format!("origin/{}", project.default_branch);
        self.git.fetch(path)?;
        self.git.checkout(path, &project.default_branch)?;
        self.git.reset_hard(path, &origin_default)?;
        self.git.clean(path)?;
        Ok(())
    }
}

/// Write exclude entries into the worktree's own gitdir (not the shared
/// repo's), so TASK.md and the marker never show up as untracked.
fn seed_exclude(worktree: &Path) -> Result<()> {
    let gitdir = resolve_gitdir(worktree)?;
    let info = gitdir.join("info");
    fs::create_dir_all(&info)?;
    let exclude = info.join("exclude");
    let mut content = if exclude.exists() {
        fs::read_to_string(&exclude)?
    } else {
        String::new()
    };
    for entry in EXCLUDE_ENTRIES {
        if !content.lines().any(|line| line == *entry) {
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(entry);
            content.push('\n');
        }
    }
    fs::write(&exclude, content)?;
    Ok(())
}

/// A linked worktree's `.git` is a file with a `gitdir:` pointer.
fn resolve_gitdir(worktree: &Path) -> Result<PathBuf> {
    let dotgit = worktree.join(".git");
    if dotgit.is_dir() {
        return Ok(dotgit);
    }
    let content = fs::read_to_string(&dotgit)
        .with_context(|| format!("Failed to read {}", dotgit.display()))?;
    let pointer = content
        .trim()
        .strip_prefix("gitdir:")
        .ok_or_else(|| anyhow::anyhow!("Unexpected .git file format in {}", worktree.display()))?
        .trim();
    let path = PathBuf::from(pointer);
    Ok(if path.is_absolute() {
        path
    } else {
        worktree.join(path)
    })
}
