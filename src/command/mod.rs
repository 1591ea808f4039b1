pub mod dashboard;
pub mod install;
pub mod log;
pub mod project;
pub mod task;
pub mod workspace;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;

use crate::engine::{Deps, Engine};
use crate::error::OrangeError;
use crate::git::{Git, GitCli};
use crate::host::{GhCli, Host};
use crate::multiplexer::{Multiplexer, TmuxBackend};
use crate::paths::DataDir;
use crate::pool::WorkspacePool;
use crate::project::Project;
use crate::store::StateStore;

/// Everything a command needs: shared dependencies and the engine.
pub struct Ctx {
    pub deps: Deps,
    pub engine: Engine,
}

impl Ctx {
    /// Wire up the live adapters.
    pub fn live(data: DataDir) -> Result<Self> {
        let store = StateStore::new(data.clone());
        let git: Arc<dyn Git> = Arc::new(GitCli::new());
        let mux: Arc<dyn Multiplexer> = Arc::new(TmuxBackend::new());
        let host: Arc<dyn Host> = Arc::new(GhCli::new());
        let pool = Arc::new(WorkspacePool::new(
            data.clone(),
            store.clone(),
            git.clone(),
        ));
        let deps = Deps {
            data,
            store,
            git,
            mux,
            host,
            pool,
        };
        let engine = Engine::production(deps.clone());
        Ok(Self { deps, engine })
    }

    /// Resolve the project from the caller's working directory.
    pub fn resolve_project(&self) -> Result<Project> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        self.deps
            .store
            .project_for_path(&cwd)?
            .ok_or_else(|| {
                OrangeError::InvalidArgument(
                    "not inside a registered project; run 'orange project add' first".to_string(),
                )
                .into()
            })
    }
}

/// Ask a yes/no question on the terminal. Suppressed by `--yes`.
pub fn confirm(question: &str) -> Result<bool> {
    loop {
        print!(
            "{} {}{}{} ",
            question,
            style("[").bold().cyan(),
            style("y/N").bold(),
            style("]").bold().cyan(),
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => println!("  {}", style("Please enter y or n").dim()),
        }
    }
}
