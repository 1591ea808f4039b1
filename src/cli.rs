use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};

use crate::command;
use crate::command::Ctx;
use crate::git::MergeStrategy;
use crate::paths::DataDir;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "orange")]
#[command(about = "Orchestrates long-running AI coding agents across git worktrees and tmux")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage coding tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage workspace pools
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
    /// Install the agent stop hook
    Install,
    /// Show the application log
    Log {
        /// Only show entries at this level (error|warn|info|debug)
        #[arg(long)]
        level: Option<String>,
        /// Only show entries from this component
        #[arg(long)]
        component: Option<String>,
        /// Only show entries matching this pattern
        #[arg(long)]
        grep: Option<String>,
        /// Number of trailing lines to show
        #[arg(long, default_value_t = 100)]
        lines: usize,
    },
    /// Open the task dashboard
    Dashboard,
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Register a git repository as a project
    Add {
        /// Repository path (defaults to the current directory)
        path: Option<String>,
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// Maximum concurrent workspaces
        #[arg(long)]
        pool_size: Option<usize>,
    },
    /// List registered projects
    List,
    /// Update a project's settings
    Update {
        /// Project name (defaults to the project of the current directory)
        name: Option<String>,
        #[arg(long)]
        pool_size: Option<usize>,
    },
    /// Remove a project from the registry
    Remove {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a task on a new branch
    Create {
        /// Branch name (generated from the task id if omitted)
        branch: Option<String>,
        /// What the agent should do; empty starts the task in clarification
        summary: Option<String>,
        /// Agent harness to run (default: claude)
        #[arg(long, default_value = "claude")]
        harness: String,
    },
    /// List tasks
    List {
        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,
        /// Include terminal (done/cancelled) tasks and all projects
        #[arg(long)]
        all: bool,
    },
    /// Start a task's agent (pending -> planning)
    Spawn { id: String },
    /// Attach the terminal to a task's session
    Attach { id: String },
    /// Restart a task's agent session
    Respawn { id: String },
    /// Update a task's branch or summary
    Update {
        id: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Advance a task based on the artifacts in its body
    Complete { id: String },
    /// Mark a working task as stuck
    Stuck { id: String },
    /// Merge a reviewed task into the default branch
    Merge {
        id: String,
        /// Merge strategy
        #[arg(long, value_parser = parse_strategy, default_value = "merge")]
        strategy: MergeStrategy,
        /// Merge locally only; do not push the default branch
        #[arg(long)]
        local: bool,
    },
    /// Cancel a task
    Cancel {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Cancel a task and delete its documents
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Open a pull request for a task's branch
    CreatePr { id: String },
    /// Send a reviewed task back to the worker for changes
    RequestChanges { id: String },
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    /// Pre-create every pool slot for the current project
    Init,
    /// Show pool slots and bindings
    List {
        /// All projects, not just the current one
        #[arg(long)]
        all: bool,
    },
    /// Remove excess and orphaned workspaces
    Gc,
}

fn parse_strategy(s: &str) -> Result<MergeStrategy, String> {
    match s {
        "ff" => Ok(MergeStrategy::Ff),
        "merge" => Ok(MergeStrategy::Merge),
        _ => Err(format!("invalid strategy '{}', expected ff|merge", s)),
    }
}

pub fn run(data: DataDir) -> Result<()> {
    let cli = Cli::parse();
    let ctx = Ctx::live(data)?;

    match cli.command {
        Commands::Project { command } => match command {
            ProjectCommands::Add {
                path,
                name,
                pool_size,
            } => command::project::add(&ctx, path.as_deref(), name.as_deref(), pool_size),
            ProjectCommands::List => command::project::list(&ctx),
            ProjectCommands::Update { name, pool_size } => {
                command::project::update(&ctx, name.as_deref(), pool_size)
            }
            ProjectCommands::Remove { name, yes } => command::project::remove(&ctx, &name, yes),
        },
        Commands::Task { command } => match command {
            TaskCommands::Create {
                branch,
                summary,
                harness,
            } => command::task::create(&ctx, branch.as_deref(), summary.as_deref(), &harness),
            TaskCommands::List { status, all } => {
                command::task::list(&ctx, status.as_deref(), all)
            }
            TaskCommands::Spawn { id } => command::task::spawn(&ctx, &id),
            TaskCommands::Attach { id } => command::task::attach(&ctx, &id),
            TaskCommands::Respawn { id } => command::task::respawn(&ctx, &id),
            TaskCommands::Update {
                id,
                branch,
                summary,
            } => command::task::update(&ctx, &id, branch.as_deref(), summary.as_deref()),
            TaskCommands::Complete { id } => command::task::complete(&ctx, &id),
            TaskCommands::Stuck { id } => command::task::stuck(&ctx, &id),
            TaskCommands::Merge {
                id,
                strategy,
                local,
            } => command::task::merge(&ctx, &id, strategy, local),
            TaskCommands::Cancel { id, yes } => command::task::cancel(&ctx, &id, yes),
            TaskCommands::Delete { id, yes } => command::task::delete(&ctx, &id, yes),
            TaskCommands::CreatePr { id } => command::task::create_pr(&ctx, &id),
            TaskCommands::RequestChanges { id } => command::task::request_changes(&ctx, &id),
        },
        Commands::Workspace { command } => match command {
            WorkspaceCommands::Init => command::workspace::init(&ctx),
            WorkspaceCommands::List { all } => command::workspace::list(&ctx, all),
            WorkspaceCommands::Gc => command::workspace::gc(&ctx),
        },
        Commands::Install => command::install::run(&ctx),
        Commands::Log {
            level,
            component,
            grep,
            lines,
        } => command::log::run(
            &ctx,
            level.as_deref(),
            component.as_deref(),
            grep.as_deref(),
            lines,
        ),
        Commands::Dashboard => command::dashboard::run(&ctx),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
