//! In-memory git double for engine, pool, and monitor tests.
//!
//! Tracks branches and call order per repository and creates real worktree
//! directories (with a plausible `gitdir:` pointer file) so filesystem-side
//! code paths run for real against a tempdir.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;

use super::{DiffStats, Git, MergeStrategy};
use crate::error::OrangeError;

#[derive(Debug, Default)]
struct State {
    /// Branches per repository root
    branches: HashMap<PathBuf, HashSet<String>>,
    /// Branches considered checked out in some other worktree
    in_use: HashSet<String>,
    /// Every call, for order assertions: "fetch /path", "checkout feature-x", ...
    calls: Vec<String>,
    /// Force the next reset_hard to fail (release-failure path)
    fail_reset: bool,
}

#[derive(Debug, Default)]
pub struct FakeGit {
    state: Mutex<State>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_branch(&self, repo: &Path, branch: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .entry(repo.to_path_buf())
            .or_default()
            .insert(branch.to_string());
    }

    /// Mark a branch as checked out elsewhere; `checkout` will then fail the
    /// way git does.
    pub fn mark_branch_in_use(&self, branch: &str) {
        self.state.lock().unwrap().in_use.insert(branch.to_string());
    }

    pub fn fail_next_reset(&self) {
        self.state.lock().unwrap().fail_reset = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl Git for FakeGit {
    fn is_git_root(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir())
    }

    fn default_branch(&self, _cwd: &Path) -> Result<String> {
        Ok("main".to_string())
    }

    fn fetch(&self, cwd: &Path) -> Result<()> {
        self.record(format!("fetch {}", cwd.display()));
        Ok(())
    }

    fn checkout(&self, cwd: &Path, branch: &str) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if state.in_use.contains(branch) {
                return Err(OrangeError::SubprocessFailed {
                    tool: "git".into(),
                    exit: 128,
                    stderr: format!("fatal: '{}' is already used by worktree", branch),
                }
                .into());
            }
        }
        self.record(format!("checkout {} {}", cwd.display(), branch));
        Ok(())
    }

    fn reset_hard(&self, cwd: &Path, reference: &str) -> Result<()> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            std::mem::take(&mut state.fail_reset)
        };
        if fail {
            return Err(OrangeError::SubprocessFailed {
                tool: "git".into(),
                exit: 1,
                stderr: "injected reset failure".into(),
            }
            .into());
        }
        self.record(format!("reset_hard {} {}", cwd.display(), reference));
        Ok(())
    }

    fn clean(&self, cwd: &Path) -> Result<()> {
        self.record(format!("clean {}", cwd.display()));
        Ok(())
    }

    fn create_branch(&self, cwd: &Path, name: &str, start_point: Option<&str>) -> Result<()> {
        self.record(format!(
            "create_branch {} {}",
            name,
            start_point.unwrap_or("HEAD")
        ));
        self.add_branch(cwd, name);
        Ok(())
    }

    fn branch_exists(&self, cwd: &Path, name: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        // Branches live repo-wide in real git; the fake does not distinguish
        // worktree paths from the repo root.
        Ok(state.branches.values().any(|set| set.contains(name))
            || state
                .branches
                .get(cwd)
                .is_some_and(|set| set.contains(name)))
    }

    fn delete_branch(&self, _cwd: &Path, name: &str) -> Result<()> {
        self.record(format!("delete_branch {}", name));
        let mut state = self.state.lock().unwrap();
        for set in state.branches.values_mut() {
            set.remove(name);
        }
        Ok(())
    }

    fn delete_remote_branch(&self, _cwd: &Path, name: &str) -> Result<()> {
        self.record(format!("delete_remote_branch {}", name));
        Ok(())
    }

    fn merge(&self, cwd: &Path, branch: &str, strategy: MergeStrategy) -> Result<()> {
        self.record(format!(
            "merge {} {} {}",
            cwd.display(),
            branch,
            strategy.as_str()
        ));
        Ok(())
    }

    fn current_branch(&self, _cwd: &Path) -> Result<String> {
        Ok("main".to_string())
    }

    fn add_worktree(&self, repo: &Path, path: &Path, branch: &str) -> Result<()> {
        self.record(format!("add_worktree {} {}", path.display(), branch));
        fs::create_dir_all(path)?;
        // Mimic a linked worktree's gitdir pointer so exclude seeding works.
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let gitdir = repo.join(".git").join("worktrees").join(name.as_ref());
        fs::create_dir_all(&gitdir)?;
        fs::write(path.join(".git"), format!("gitdir: {}\n", gitdir.display()))?;
        Ok(())
    }

    fn remove_worktree(&self, _repo: &Path, path: &Path) -> Result<()> {
        self.record(format!("remove_worktree {}", path.display()));
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    fn commit_hash(&self, _cwd: &Path, short: bool) -> Result<String> {
        Ok(if short {
            "abc1234".into()
        } else {
            "abc1234abc1234abc1234abc1234abc1234abc12".into()
        })
    }

    fn diff_stats(&self, _cwd: &Path, _base: &str) -> Result<DiffStats> {
        Ok(DiffStats {
            files: 1,
            added: 10,
            removed: 2,
        })
    }

    fn commit_count(&self, _cwd: &Path, _base: &str) -> Result<usize> {
        Ok(1)
    }

    fn push_branch(&self, _cwd: &Path, branch: &str) -> Result<()> {
        self.record(format!("push_branch {}", branch));
        Ok(())
    }

    fn remote_url(&self, _cwd: &Path) -> Result<String> {
        Ok("git@github.com:acme/orange.git".to_string())
    }
}
