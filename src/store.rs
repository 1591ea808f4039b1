use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::error::OrangeError;
use crate::history::{EventKind, HistoryEvent};
use crate::paths::DataDir;
use crate::project::Project;
use crate::task::Task;

/// File-backed state: the project registry, task documents, and per-task
/// history logs. All mutation goes through whole-file rewrites; task writes
/// are atomic (temp file + rename) so readers never observe a torn document.
#[derive(Debug, Clone)]
pub struct StateStore {
    data: DataDir,
}

impl StateStore {
    pub fn new(data: DataDir) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &DataDir {
        &self.data
    }

    // === Projects ===

    pub fn load_projects(&self) -> Result<Vec<Project>> {
        let path = self.data.projects_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse project registry")
    }

    fn save_projects(&self, projects: &[Project]) -> Result<()> {
        let path = self.data.projects_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(projects)?;
        atomic_write(&path, &(content + "\n"))
    }

    pub fn get_project(&self, name: &str) -> Result<Project> {
        self.load_projects()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                OrangeError::InvalidArgument(format!("project '{}' is not registered", name)).into()
            })
    }

    pub fn add_project(&self, project: Project) -> Result<()> {
        let mut projects = self.load_projects()?;
        if projects
            .iter()
            .any(|p| p.name == project.name || p.path == project.path)
        {
            return Err(OrangeError::DuplicateProject(project.name).into());
        }
        projects.push(project);
        self.save_projects(&projects)
    }

    pub fn update_project(&self, project: Project) -> Result<()> {
        let mut projects = self.load_projects()?;
        let slot = projects
            .iter_mut()
            .find(|p| p.name == project.name)
            .ok_or_else(|| {
                OrangeError::InvalidArgument(format!(
                    "project '{}' is not registered",
                    project.name
                ))
            })?;
        *slot = project;
        self.save_projects(&projects)
    }

    pub fn remove_project(&self, name: &str) -> Result<()> {
        let mut projects = self.load_projects()?;
        let before = projects.len();
        projects.retain(|p| p.name != name);
        if projects.len() == before {
            return Err(OrangeError::InvalidArgument(format!(
                "project '{}' is not registered",
                name
            ))
            .into());
        }
        self.save_projects(&projects)
    }

    /// Find the registered project containing `path` (used to resolve the
    /// project from the caller's working directory).
    pub fn project_for_path(&self, path: &Path) -> Result<Option<Project>> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Ok(self
            .load_projects()?
            .into_iter()
            .find(|p| canonical.starts_with(&p.path)))
    }

    // === Tasks ===

    pub fn save_task(&self, task: &Task) -> Result<()> {
        let path = self.data.task_file(&task.project, &task.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&path, &task.to_markdown()?)
    }

    pub fn load_task(&self, project: &str, id: &str) -> Result<Task> {
        let path = self.data.task_file(project, id);
        let content = fs::read_to_string(&path)
            .map_err(|_| OrangeError::TaskNotFound(id.to_string()))?;
        Task::from_markdown(&content)
            .with_context(|| format!("Failed to parse task document {}", path.display()))
    }

    /// Locate a task by id across all projects.
    pub fn find_task(&self, id: &str) -> Result<Task> {
        for project in self.load_projects()? {
            if let Ok(task) = self.load_task(&project.name, id) {
                return Ok(task);
            }
        }
        Err(OrangeError::TaskNotFound(id.to_string()).into())
    }

    /// List tasks, newest first. `project` narrows to one project.
    pub fn list_tasks(&self, project: Option<&str>) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        let projects: Vec<String> = match project {
            Some(name) => vec![name.to_string()],
            None => self.load_projects()?.into_iter().map(|p| p.name).collect(),
        };

        for name in projects {
            let dir = self.data.tasks_dir(&name);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let task_file = entry.path().join("TASK.md");
                if !task_file.is_file() {
                    continue;
                }
                match fs::read_to_string(&task_file)
                    .map_err(anyhow::Error::from)
                    .and_then(|c| Task::from_markdown(&c))
                {
                    Ok(task) => tasks.push(task),
                    Err(e) => {
                        warn!(path = %task_file.display(), error = %e, "skipping unreadable task document");
                    }
                }
            }
        }

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub fn branch_taken(&self, project: &str, branch: &str) -> Result<bool> {
        Ok(self
            .list_tasks(Some(project))?
            .iter()
            .any(|t| t.branch == branch))
    }

    pub fn delete_task(&self, task: &Task) -> Result<()> {
        let dir = self.data.task_dir(&task.project, &task.id);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove task directory {}", dir.display()))?;
        }
        Ok(())
    }

    // === History ===

    pub fn append_event(&self, task: &Task, kind: EventKind) -> Result<()> {
        let event = HistoryEvent::now(kind);
        let path = self.data.history_file(&task.project, &task.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open history log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to history log {}", path.display()))?;
        Ok(())
    }

    pub fn read_history(&self, task: &Task) -> Result<Vec<HistoryEvent>> {
        let path = self.data.history_file(&task.project, &task.id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read history log {}", path.display()))?;
        let mut events = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed history line"),
            }
        }
        Ok(events)
    }
}

/// Whole-file replacement via temp file + rename, so concurrent readers see
/// either the old or the new document, never a partial write.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EventKind;
    use crate::task::TaskStatus;
    use std::path::PathBuf;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(DataDir::at(dir.path().to_path_buf()));
        (dir, store)
    }

    fn project(name: &str, path: PathBuf) -> Project {
        Project {
            name: name.to_string(),
            path,
            default_branch: "main".to_string(),
            pool_size: 2,
        }
    }

    #[test]
    fn duplicate_project_rejected_by_name_and_path() {
        let (_dir, store) = store();
        store
            .add_project(project("orange", PathBuf::from("/repo/orange")))
            .unwrap();

        let err = store
            .add_project(project("orange", PathBuf::from("/elsewhere")))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OrangeError>(),
            Some(OrangeError::DuplicateProject(_))
        ));

        let err = store
            .add_project(project("other", PathBuf::from("/repo/orange")))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OrangeError>(),
            Some(OrangeError::DuplicateProject(_))
        ));
    }

    #[test]
    fn task_save_load_round_trip() {
        let (_dir, store) = store();
        store
            .add_project(project("orange", PathBuf::from("/repo/orange")))
            .unwrap();
        let mut task = Task::new("orange", "feature-x", "Add X", "claude").unwrap();
        task.body = "## Plan\nAPPROACH: do it\n".to_string();
        store.save_task(&task).unwrap();

        let loaded = store.load_task("orange", &task.id).unwrap();
        assert_eq!(loaded.branch, "feature-x");
        assert_eq!(loaded.body, task.body);

        let found = store.find_task(&task.id).unwrap();
        assert_eq!(found.id, task.id);
    }

    #[test]
    fn find_task_reports_not_found() {
        let (_dir, store) = store();
        let err = store.find_task("nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OrangeError>(),
            Some(OrangeError::TaskNotFound(_))
        ));
    }

    #[test]
    fn list_orders_newest_first() {
        let (_dir, store) = store();
        store
            .add_project(project("orange", PathBuf::from("/repo/orange")))
            .unwrap();
        let mut a = Task::new("orange", "a", "A", "claude").unwrap();
        let mut b = Task::new("orange", "b", "B", "claude").unwrap();
        a.created_at = 100;
        b.created_at = 200;
        store.save_task(&a).unwrap();
        store.save_task(&b).unwrap();

        let tasks = store.list_tasks(Some("orange")).unwrap();
        assert_eq!(tasks[0].branch, "b");
        assert_eq!(tasks[1].branch, "a");
    }

    #[test]
    fn history_appends_and_reads_back() {
        let (_dir, store) = store();
        store
            .add_project(project("orange", PathBuf::from("/repo/orange")))
            .unwrap();
        let task = Task::new("orange", "feature-x", "Add X", "claude").unwrap();
        store.save_task(&task).unwrap();

        store
            .append_event(
                &task,
                EventKind::TaskCreated {
                    id: task.id.clone(),
                    project: "orange".into(),
                    branch: "feature-x".into(),
                },
            )
            .unwrap();
        store
            .append_event(
                &task,
                EventKind::StatusChanged {
                    from: TaskStatus::Pending,
                    to: TaskStatus::Planning,
                },
            )
            .unwrap();

        let events = store.read_history(&task).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].timestamp >= events[0].timestamp);
        assert!(matches!(events[0].kind, EventKind::TaskCreated { .. }));
    }

    #[test]
    fn branch_taken_sees_existing_tasks() {
        let (_dir, store) = store();
        store
            .add_project(project("orange", PathBuf::from("/repo/orange")))
            .unwrap();
        let task = Task::new("orange", "feature-x", "Add X", "claude").unwrap();
        store.save_task(&task).unwrap();

        assert!(store.branch_taken("orange", "feature-x").unwrap());
        assert!(!store.branch_taken("orange", "feature-y").unwrap());
    }
}
