use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::{DiffStats, Git, MergeStrategy};
use crate::cmd::Cmd;

/// Live git adapter; shells out to the `git` binary.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

impl Git for GitCli {
    fn is_git_root(&self, path: &Path) -> Result<bool> {
        if !path.is_dir() {
            return Ok(false);
        }
        let top = Cmd::new("git")
            .workdir(path)
            .args(&["rev-parse", "--show-toplevel"])
            .run_and_capture_stdout();
        match top {
            Ok(top) => {
                let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
                Ok(Path::new(&top) == canonical)
            }
            Err(_) => Ok(false),
        }
    }

    fn default_branch(&self, cwd: &Path) -> Result<String> {
        if let Ok(ref_name) = Cmd::new("git")
            .workdir(cwd)
            .args(&["symbolic-ref", "refs/remotes/origin/HEAD"])
            .run_and_capture_stdout()
            && let Some(branch) = ref_name.strip_prefix("refs/remotes/origin/")
        {
            debug!(branch, "git:default branch from remote HEAD");
            return Ok(branch.to_string());
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(cwd, candidate)? {
                debug!(branch = candidate, "git:default branch (local fallback)");
                return Ok(candidate.to_string());
            }
        }

        Err(anyhow!(
            "Could not determine the default branch (e.g. 'main' or 'master')"
        ))
    }

    fn fetch(&self, cwd: &Path) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["fetch", "--prune", "origin"])
            .run()
            .context("Failed to fetch from origin")?;
        Ok(())
    }

    fn checkout(&self, cwd: &Path, branch: &str) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["checkout", branch])
            .run()
            .with_context(|| format!("Failed to check out '{}'", branch))?;
        Ok(())
    }

    fn reset_hard(&self, cwd: &Path, reference: &str) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["reset", "--hard", reference])
            .run()
            .with_context(|| format!("Failed to reset to '{}'", reference))?;
        Ok(())
    }

    fn clean(&self, cwd: &Path) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["clean", "-fd"])
            .run()
            .context("Failed to clean worktree")?;
        Ok(())
    }

    fn create_branch(&self, cwd: &Path, name: &str, start_point: Option<&str>) -> Result<()> {
        let mut cmd = Cmd::new("git").workdir(cwd).args(&["branch", name]);
        if let Some(start) = start_point {
            cmd = cmd.arg(start);
        }
        cmd.run()
            .with_context(|| format!("Failed to create branch '{}'", name))?;
        Ok(())
    }

    fn branch_exists(&self, cwd: &Path, name: &str) -> Result<bool> {
        let reference = format!("refs/heads/{}", name);
        Cmd::new("git")
            .workdir(cwd)
            .args(&["rev-parse", "--verify", "--quiet", &reference])
            .run_as_check()
    }

    fn delete_branch(&self, cwd: &Path, name: &str) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["branch", "-D", name])
            .run()
            .with_context(|| format!("Failed to delete branch '{}'", name))?;
        Ok(())
    }

    fn delete_remote_branch(&self, cwd: &Path, name: &str) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["push", "--delete", "origin", name])
            .run()
            .with_context(|| format!("Failed to delete remote branch '{}'", name))?;
        Ok(())
    }

    fn merge(&self, cwd: &Path, branch: &str, strategy: MergeStrategy) -> Result<()> {
        let flag = match strategy {
            MergeStrategy::Ff => "--ff-only",
            MergeStrategy::Merge => "--no-ff",
        };
        Cmd::new("git")
            .workdir(cwd)
            .args(&["merge", flag, "--no-edit", branch])
            .run()
            .with_context(|| format!("Failed to merge '{}'", branch))?;
        Ok(())
    }

    fn current_branch(&self, cwd: &Path) -> Result<String> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["branch", "--show-current"])
            .run_and_capture_stdout()
    }

    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid worktree path"))?;
        let start = format!("origin/{}", branch);
        Cmd::new("git")
            .workdir(repo)
            .args(&["worktree", "add", "--detach", path_str, &start])
            .run()
            .with_context(|| format!("Failed to add worktree at {}", path.display()))?;
        Ok(())
    }

    fn remove_worktree(&self, repo: &Path, path: &Path) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid worktree path"))?;
        Cmd::new("git")
            .workdir(repo)
            .args(&["worktree", "remove", "--force", path_str])
            .run()
            .with_context(|| format!("Failed to remove worktree at {}", path.display()))?;
        Ok(())
    }

    fn commit_hash(&self, cwd: &Path, short: bool) -> Result<String> {
        let mut cmd = Cmd::new("git").workdir(cwd).args(&["rev-parse"]);
        if short {
            cmd = cmd.arg("--short");
        }
        cmd.arg("HEAD").run_and_capture_stdout()
    }

    fn diff_stats(&self, cwd: &Path, base: &str) -> Result<DiffStats> {
        let range = format!("{}...HEAD", base);
        let output = Cmd::new("git")
            .workdir(cwd)
            .args(&["diff", "--numstat", &range])
            .run_and_capture_stdout()?;

        let mut stats = DiffStats::default();
        for line in output.lines() {
            let mut parts = line.split_whitespace();
            // Format: <added> <removed> <file>; binary files show "-"
            if let (Some(added), Some(removed)) = (parts.next(), parts.next()) {
                stats.files += 1;
                stats.added += added.parse::<usize>().unwrap_or(0);
                stats.removed += removed.parse::<usize>().unwrap_or(0);
            }
        }
        Ok(stats)
    }

    fn commit_count(&self, cwd: &Path, base: &str) -> Result<usize> {
        let range = format!("{}..HEAD", base);
        let output = Cmd::new("git")
            .workdir(cwd)
            .args(&["rev-list", "--count", &range])
            .run_and_capture_stdout()?;
        output
            .parse()
            .with_context(|| format!("Unexpected rev-list output: {}", output))
    }

    fn push_branch(&self, cwd: &Path, branch: &str) -> Result<()> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["push", "-u", "origin", branch])
            .run()
            .with_context(|| format!("Failed to push branch '{}'", branch))?;
        Ok(())
    }

    fn remote_url(&self, cwd: &Path) -> Result<String> {
        Cmd::new("git")
            .workdir(cwd)
            .args(&["config", "--get", "remote.origin.url"])
            .run_and_capture_stdout()
            .context("Failed to get URL for remote 'origin'")
    }
}
