//! Shared fixture for engine, monitor, and workflow tests: a temp data
//! directory wired to the in-memory adapter doubles.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{Deps, Engine};
use crate::git::Git;
use crate::git::fake::FakeGit;
use crate::history::HistoryEvent;
use crate::host::fake::FakeHost;
use crate::multiplexer::fake::FakeMux;
use crate::paths::DataDir;
use crate::pool::WorkspacePool;
use crate::project::Project;
use crate::store::StateStore;
use crate::task::Task;

pub struct Fixture {
    pub _tmp: tempfile::TempDir,
    pub data: DataDir,
    pub store: StateStore,
    pub git: Arc<FakeGit>,
    pub mux: Arc<FakeMux>,
    pub host: Arc<FakeHost>,
    pub engine: Engine,
    pub project: Project,
}

impl Fixture {
    pub fn new(pool_size: usize) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let data = DataDir::at(tmp.path().join("data"));
        let store = StateStore::new(data.clone());

        let repo = tmp.path().join("repo");
        fs::create_dir_all(&repo).unwrap();
        let project = Project {
            name: "orange".to_string(),
            path: repo,
            default_branch: "main".to_string(),
            pool_size,
        };
        store.add_project(project.clone()).unwrap();

        let git = Arc::new(FakeGit::new());
        let mux = Arc::new(FakeMux::new());
        let host = Arc::new(FakeHost::new());
        let pool = Arc::new(WorkspacePool::new(
            data.clone(),
            store.clone(),
            git.clone() as Arc<dyn Git>,
        ));
        let deps = Deps {
            data: data.clone(),
            store: store.clone(),
            git: git.clone(),
            mux: mux.clone(),
            host: host.clone(),
            pool,
        };
        let engine = Engine::production(deps);

        Self {
            _tmp: tmp,
            data,
            store,
            git,
            mux,
            host,
            engine,
            project,
        }
    }

    pub fn create_task(&self, branch: &str, summary: &str) -> Task {
        let task = Task::new("orange", branch, summary, "claude").unwrap();
        self.store.save_task(&task).unwrap();
        task
    }

    pub fn task(&self, id: &str) -> Task {
        self.store.find_task(id).unwrap()
    }

    pub fn set_body(&self, id: &str, body: &str) {
        let mut task = self.task(id);
        task.body = body.to_string();
        self.store.save_task(&task).unwrap();
    }

    pub fn append_body(&self, id: &str, section: &str) {
        let mut task = self.task(id);
        task.body.push_str(section);
        self.store.save_task(&task).unwrap();
    }

    pub fn history(&self, id: &str) -> Vec<HistoryEvent> {
        self.store.read_history(&self.task(id)).unwrap()
    }

    pub fn workspace_path(&self, slot: &str) -> PathBuf {
        self.data.workspace_dir(slot)
    }
}
