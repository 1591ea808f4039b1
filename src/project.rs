use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_pool_size() -> usize {
    2
}

/// A registered git project. Created by `project add`, mutated only by
/// explicit `project update`, never deleted implicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Unique human name within the registry
    pub name: String,
    /// Absolute path to the repository root
    pub path: PathBuf,
    /// Branch that worktrees reset to and tasks branch from
    pub default_branch: String,
    /// Maximum concurrent worktree leases
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Project {
    /// Pool slot name for ordinal `n` (ordinals are dense from 1).
    pub fn slot_name(&self, n: usize) -> String {
        format!("{}--{}", self.name, n)
    }
}

/// Parse the ordinal out of a slot name like `orange--3`.
pub fn slot_ordinal(project: &str, slot: &str) -> Option<usize> {
    let rest = slot.strip_prefix(project)?.strip_prefix("--")?;
    rest.parse().ok()
}
