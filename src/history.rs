use serde::{Deserialize, Serialize};

use crate::task::{TaskStatus, now};

/// One line in a task's append-only history log.
///
/// The wire format is a tagged union discriminated by `type`; readers parse
/// `type` first and then the variant fields, so unknown context never breaks
/// old consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEvent {
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "task.created")]
    TaskCreated {
        id: String,
        project: String,
        branch: String,
    },
    #[serde(rename = "status.changed")]
    StatusChanged { from: TaskStatus, to: TaskStatus },
    #[serde(rename = "agent.spawned")]
    AgentSpawned { variant: String, session: String },
    #[serde(rename = "agent.crashed")]
    AgentCrashed { crash_count: u32 },
    #[serde(rename = "auto.advanced")]
    AutoAdvanced {
        from: TaskStatus,
        to: TaskStatus,
        reason: String,
    },
    #[serde(rename = "task.merged")]
    TaskMerged { strategy: String },
    #[serde(rename = "task.cancelled")]
    TaskCancelled {},
    #[serde(rename = "pr.created")]
    PrCreated { url: String },
    #[serde(rename = "pr.merged")]
    PrMerged { url: Option<String> },
}

impl HistoryEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_by_type() {
        let ev = HistoryEvent {
            timestamp: 42,
            kind: EventKind::StatusChanged {
                from: TaskStatus::Pending,
                to: TaskStatus::Planning,
            },
        };
        let line = serde_json::to_string(&ev).unwrap();
        assert!(line.contains(r#""type":"status.changed""#));
        assert!(line.contains(r#""from":"pending""#));

        let back: HistoryEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn all_variants_round_trip() {
        let kinds = vec![
            EventKind::TaskCreated {
                id: "x".into(),
                project: "orange".into(),
                branch: "b".into(),
            },
            EventKind::AgentSpawned {
                variant: "worker".into(),
                session: "orange/b".into(),
            },
            EventKind::AgentCrashed { crash_count: 1 },
            EventKind::AutoAdvanced {
                from: TaskStatus::Planning,
                to: TaskStatus::Working,
                reason: "session-exited".into(),
            },
            EventKind::TaskMerged {
                strategy: "ff".into(),
            },
            EventKind::TaskCancelled {},
            EventKind::PrCreated {
                url: "https://example.com/pr/1".into(),
            },
            EventKind::PrMerged { url: None },
        ];
        for kind in kinds {
            let ev = HistoryEvent { timestamp: 1, kind };
            let line = serde_json::to_string(&ev).unwrap();
            let back: HistoryEvent = serde_json::from_str(&line).unwrap();
            assert_eq!(back, ev);
        }
    }
}
