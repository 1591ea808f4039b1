use std::fs;

use anyhow::Result;
use serde_json::Value;

use super::Ctx;
use crate::logger;

/// Print the tail of the application log with optional filters. Entries are
/// JSON lines; unparseable lines are shown only when no filter applies.
pub fn run(
    ctx: &Ctx,
    level: Option<&str>,
    component: Option<&str>,
    grep: Option<&str>,
    lines: usize,
) -> Result<()> {
    let mut entries: Vec<String> = Vec::new();

    // Oldest file first so the tail is chronological.
    for path in logger::log_files(&ctx.deps.data).into_iter().rev() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rendered) = filter_line(line, level, component, grep) {
                entries.push(rendered);
            }
        }
    }

    let start = entries.len().saturating_sub(lines);
    for entry in &entries[start..] {
        println!("{}", entry);
    }
    Ok(())
}

fn filter_line(
    line: &str,
    level: Option<&str>,
    component: Option<&str>,
    grep: Option<&str>,
) -> Option<String> {
    let json: Value = match serde_json::from_str(line) {
        Ok(json) => json,
        Err(_) => {
            // Not JSON; only passes when no structured filter is active.
            if level.is_none() && component.is_none() {
                return match grep {
                    Some(pattern) if !line.contains(pattern) => None,
                    _ => Some(line.to_string()),
                };
            }
            return None;
        }
    };

    let entry_level = json["level"].as_str().unwrap_or_default();
    if let Some(wanted) = level
        && !entry_level.eq_ignore_ascii_case(wanted)
    {
        return None;
    }

    let target = json["target"].as_str().unwrap_or_default();
    if let Some(wanted) = component
        && !target.contains(wanted)
    {
        return None;
    }

    if let Some(pattern) = grep
        && !line.contains(pattern)
    {
        return None;
    }

    let ts = json["timestamp"].as_str().unwrap_or_default();
    let msg = json["message"].as_str().unwrap_or_default();
    Some(format!("{} {:5} {} {}", ts, entry_level, target, msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{"timestamp":"2026-08-01T10:00:00Z","level":"WARN","target":"orange::pool","message":"worktree reset failed"}"#;

    #[test]
    fn level_filter_is_case_insensitive() {
        assert!(filter_line(LINE, Some("warn"), None, None).is_some());
        assert!(filter_line(LINE, Some("info"), None, None).is_none());
    }

    #[test]
    fn component_filter_matches_target() {
        assert!(filter_line(LINE, None, Some("pool"), None).is_some());
        assert!(filter_line(LINE, None, Some("engine"), None).is_none());
    }

    #[test]
    fn grep_matches_raw_line() {
        assert!(filter_line(LINE, None, None, Some("reset failed")).is_some());
        assert!(filter_line(LINE, None, None, Some("nope")).is_none());
    }

    #[test]
    fn unparseable_lines_pass_only_without_structured_filters() {
        assert!(filter_line("plain text", None, None, None).is_some());
        assert!(filter_line("plain text", Some("warn"), None, None).is_none());
    }
}
