use std::sync::LazyLock;

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;

use crate::error::OrangeError;

/// Review verdict requested from the Review gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// A pure predicate over the task body that authorises a transition.
///
/// Gates are deterministic and whitespace-tolerant but case-sensitive on the
/// keywords. A failing gate refuses the transition and mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Body has a `## Plan` section with a non-empty `APPROACH:` line.
    Plan,
    /// Body has a `## Handoff` section with a non-empty `DONE:` line.
    Handoff,
    /// Body has a `## Review` section with the requested verdict.
    Review(Verdict),
}

static APPROACH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*APPROACH:[ \t]*\S").expect("static regex"));
static DONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*DONE:[ \t]*\S").expect("static regex"));
static VERDICT_PASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Verdict:[ \t]*PASS[ \t]*$").expect("static regex"));
static VERDICT_FAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Verdict:[ \t]*FAIL[ \t]*$").expect("static regex"));

impl Gate {
    pub fn name(&self) -> &'static str {
        match self {
            Gate::Plan => "Plan",
            Gate::Handoff => "Handoff",
            Gate::Review(_) => "Review",
        }
    }

    /// Evaluate the gate against a task body.
    pub fn check(&self, body: &str) -> Result<(), OrangeError> {
        let (heading, pattern, wanted) = match self {
            Gate::Plan => ("Plan", &*APPROACH_RE, "a non-empty APPROACH: line"),
            Gate::Handoff => ("Handoff", &*DONE_RE, "a non-empty DONE: line"),
            Gate::Review(Verdict::Pass) => ("Review", &*VERDICT_PASS_RE, "Verdict: PASS"),
            Gate::Review(Verdict::Fail) => ("Review", &*VERDICT_FAIL_RE, "Verdict: FAIL"),
        };

        let section = section_text(body, heading).ok_or_else(|| OrangeError::GateRejected {
            gate: self.name(),
            reason: format!("body has no '## {}' section", heading),
        })?;

        if pattern.is_match(section) {
            Ok(())
        } else {
            Err(OrangeError::GateRejected {
                gate: self.name(),
                reason: format!("'## {}' section lacks {}", heading, wanted),
            })
        }
    }

    pub fn passes(&self, body: &str) -> bool {
        self.check(body).is_ok()
    }
}

/// Extract the text of the level-2 section titled `title`: everything after
/// its heading up to the next heading of level 2 or 1, or end of document.
fn section_text<'a>(body: &'a str, title: &str) -> Option<&'a str> {
    let mut in_heading: Option<HeadingLevel> = None;
    let mut heading_text = String::new();
    let mut section_start: Option<usize> = None;

    for (event, range) in Parser::new(body).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                if let Some(start) = section_start
                    && matches!(level, HeadingLevel::H1 | HeadingLevel::H2)
                {
                    return Some(&body[start..range.start]);
                }
                in_heading = Some(level);
                heading_text.clear();
            }
            Event::End(TagEnd::Heading(level)) => {
                in_heading = None;
                if section_start.is_none()
                    && level == HeadingLevel::H2
                    && heading_text.trim() == title
                {
                    section_start = Some(range.end);
                }
            }
            Event::Text(text) | Event::Code(text) if in_heading.is_some() => {
                heading_text.push_str(&text);
            }
            _ => {}
        }
    }

    section_start.map(|start| &body[start..])
}
