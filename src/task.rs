use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// The closed set of task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Clarification,
    Working,
    AgentReview,
    Reviewing,
    Stuck,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Planning => "planning",
            TaskStatus::Clarification => "clarification",
            TaskStatus::Working => "working",
            TaskStatus::AgentReview => "agent-review",
            TaskStatus::Reviewing => "reviewing",
            TaskStatus::Stuck => "stuck",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => TaskStatus::Pending,
            "planning" => TaskStatus::Planning,
            "clarification" => TaskStatus::Clarification,
            "working" => TaskStatus::Working,
            "agent-review" => TaskStatus::AgentReview,
            "reviewing" => TaskStatus::Reviewing,
            "stuck" => TaskStatus::Stuck,
            "done" => TaskStatus::Done,
            "cancelled" => TaskStatus::Cancelled,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// Statuses in which a live multiplexer session is expected.
    pub fn expects_session(&self) -> bool {
        matches!(
            self,
            TaskStatus::Planning
                | TaskStatus::Clarification
                | TaskStatus::Working
                | TaskStatus::AgentReview
                | TaskStatus::Reviewing
                | TaskStatus::Stuck
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One coding task: a branch, an agent session, and a gated lifecycle.
///
/// Persisted as YAML frontmatter + markdown body in TASK.md. The body is the
/// raw markdown the agent edits; the engine only ever reads it.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub project: String,
    pub branch: String,
    pub harness: String,
    pub review_harness: String,
    pub status: TaskStatus,
    pub review_round: u32,
    pub crash_count: u32,
    pub workspace: Option<String>,
    pub tmux_session: Option<String>,
    pub summary: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub pr_url: Option<String>,
    pub body: String,
    /// Frontmatter keys we don't know about, preserved across rewrites
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Frontmatter view of a task (everything except the body).
#[derive(Debug, Serialize, Deserialize)]
struct Frontmatter {
    id: String,
    project: String,
    branch: String,
    harness: String,
    review_harness: String,
    status: TaskStatus,
    #[serde(default)]
    review_round: u32,
    #[serde(default)]
    crash_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tmux_session: Option<String>,
    #[serde(default)]
    summary: String,
    created_at: u64,
    updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pr_url: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

impl Task {
    /// Create a task. An empty summary means the operator still owes the
    /// agent a description, so the task starts in clarification.
    pub fn new(project: &str, branch: &str, summary: &str, harness: &str) -> Result<Self> {
        let now = now();
        let status = if summary.trim().is_empty() {
            TaskStatus::Clarification
        } else {
            TaskStatus::Pending
        };
        Ok(Self {
            id: generate_id()?,
            project: project.to_string(),
            branch: branch.to_string(),
            harness: harness.to_string(),
            review_harness: harness.to_string(),
            status,
            review_round: 0,
            crash_count: 0,
            workspace: None,
            tmux_session: None,
            summary: summary.trim().to_string(),
            created_at: now,
            updated_at: now,
            pr_url: None,
            body: String::new(),
            extra: BTreeMap::new(),
        })
    }

    /// Multiplexer session name. The `<project>/<branch>` scheme partitions
    /// the session namespace so independent tasks never collide.
    pub fn session_name(&self) -> String {
        format!("{}/{}", self.project, self.branch)
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }

    /// Render as frontmatter + body for TASK.md.
    pub fn to_markdown(&self) -> Result<String> {
        let fm = Frontmatter {
            id: self.id.clone(),
            project: self.project.clone(),
            branch: self.branch.clone(),
            harness: self.harness.clone(),
            review_harness: self.review_harness.clone(),
            status: self.status,
            review_round: self.review_round,
            crash_count: self.crash_count,
            workspace: self.workspace.clone(),
            tmux_session: self.tmux_session.clone(),
            summary: self.summary.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            pr_url: self.pr_url.clone(),
            extra: self.extra.clone(),
        };
        let yaml = serde_yaml::to_string(&fm).context("Failed to serialize task frontmatter")?;
        Ok(format!("---\n{}---\n{}", yaml, self.body))
    }

    /// Parse a TASK.md document.
    pub fn from_markdown(content: &str) -> Result<Self> {
        let (yaml, body) = split_frontmatter(content)
            .ok_or_else(|| anyhow!("Task document has no frontmatter"))?;
        let fm: Frontmatter =
            serde_yaml::from_str(&yaml).context("Failed to parse task frontmatter")?;
        Ok(Self {
            id: fm.id,
            project: fm.project,
            branch: fm.branch,
            harness: fm.harness,
            review_harness: fm.review_harness,
            status: fm.status,
            review_round: fm.review_round,
            crash_count: fm.crash_count,
            workspace: fm.workspace,
            tmux_session: fm.tmux_session,
            summary: fm.summary,
            created_at: fm.created_at,
            updated_at: fm.updated_at,
            pr_url: fm.pr_url,
            body: body.to_string(),
            extra: fm.extra,
        })
    }
}

/// Split frontmatter from markdown content.
/// Returns (frontmatter_yaml, body) if a fenced frontmatter block exists.
fn split_frontmatter(content: &str) -> Option<(String, &str)> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.is_empty() || lines[0].trim() != "---" {
        return None;
    }

    let closing_idx = lines
        .iter()
        .skip(1)
        .position(|line| line.trim() == "---")?;

    let actual_idx = closing_idx + 1;
    let frontmatter = lines[1..actual_idx].join("\n");
    let body_start = lines
        .iter()
        .take(actual_idx + 1)
        .map(|l| l.len() + 1)
        .sum::<usize>();
    let body = &content[body_start.min(content.len())..];
    Some((frontmatter, body))
}

/// Current UNIX time in seconds.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

const ID_LEN: usize = 21;
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a 21-character case-sensitive alphanumeric task id.
/// The alphabet has no `-`, so ids are always safe as CLI arguments.
pub fn generate_id() -> Result<String> {
    let mut buf = [0u8; ID_LEN];
    getrandom::fill(&mut buf).map_err(|e| anyhow!("OS random source failed: {}", e))?;
    Ok(buf
        .iter()
        .map(|b| ID_ALPHABET[(*b as usize) % ID_ALPHABET.len()] as char)
        .collect())
}
