use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Resolved layout of the orange data directory.
///
/// Everything the system persists lives under one root:
///
/// ```text
/// <root>/projects.json                     project registry
/// <root>/tasks/<project>/<id>/TASK.md      task document
/// <root>/tasks/<project>/<id>/history.jsonl
/// <root>/workspaces/<project>--<n>/        git worktrees
/// <root>/orange.log                        application log
/// <root>/hooks/                            installed agent hooks
/// ```
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory: `$ORANGE_DATA_DIR`, then
    /// `$XDG_DATA_HOME/orange`, then `~/.local/share/orange`.
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = std::env::var("ORANGE_DATA_DIR")
            && !dir.is_empty()
        {
            return Ok(Self::at(PathBuf::from(dir)));
        }

        if let Ok(data_home) = std::env::var("XDG_DATA_HOME")
            && !data_home.is_empty()
        {
            return Ok(Self::at(PathBuf::from(data_home).join("orange")));
        }

        let home = home::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(Self::at(home.join(".local").join("share").join("orange")))
    }

    /// Use an explicit root (tests point this at a temp directory).
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn projects_file(&self) -> PathBuf {
        self.root.join("projects.json")
    }

    pub fn tasks_dir(&self, project: &str) -> PathBuf {
        self.root.join("tasks").join(project)
    }

    pub fn task_dir(&self, project: &str, id: &str) -> PathBuf {
        self.tasks_dir(project).join(id)
    }

    pub fn task_file(&self, project: &str, id: &str) -> PathBuf {
        self.task_dir(project, id).join("TASK.md")
    }

    pub fn history_file(&self, project: &str, id: &str) -> PathBuf {
        self.task_dir(project, id).join("history.jsonl")
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.root.join("workspaces")
    }

    pub fn workspace_dir(&self, slot: &str) -> PathBuf {
        self.workspaces_dir().join(slot)
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("orange.log")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.root.join("hooks")
    }
}
