use std::path::Path;

use anyhow::{Context, Result};
use git_url_parse::GitUrl;
use serde_json::Value;
use tracing::debug;

use super::{ChecksState, Host, PrParams, PrState, PrStatus};
use crate::cmd::Cmd;
use crate::error::OrangeError;
use crate::git::{Git, GitCli};

/// Default public host assumed when the remote URL doesn't parse.
const DEFAULT_HOST: &str = "github.com";

/// GitHub CLI adapter. `GH_PROXY` is forwarded to `gh` as both
/// `HTTPS_PROXY` and `HTTP_PROXY`.
#[derive(Debug, Default, Clone)]
pub struct GhCli;

impl GhCli {
    pub fn new() -> Self {
        Self
    }

    /// Host name from the origin remote, supporting SSH and HTTPS forms.
    /// Falls back to the default public host when parsing fails.
    fn detect_host(&self, cwd: &Path) -> String {
        let url = match GitCli::new().remote_url(cwd) {
            Ok(url) => url,
            Err(_) => return DEFAULT_HOST.to_string(),
        };
        match GitUrl::parse(&url) {
            Ok(parsed) => parsed
                .host()
                .map(|h| h.to_string())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            Err(_) => DEFAULT_HOST.to_string(),
        }
    }

    fn run(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        let proxy = std::env::var("GH_PROXY").ok();
        let mut cmd = Cmd::new("gh").workdir(cwd).args(args);
        if let Some(ref proxy) = proxy {
            cmd = cmd.env("HTTPS_PROXY", proxy).env("HTTP_PROXY", proxy);
        }
        cmd.run_and_capture_stdout()
    }
}

impl Host for GhCli {
    fn is_available(&self, cwd: &Path) -> bool {
        if which::which("gh").is_err() {
            return false;
        }
        let host = self.detect_host(cwd);
        let supported = host == DEFAULT_HOST || host.contains("github");
        debug!(host, supported, "gh:host detection");
        supported
    }

    fn create_pr(&self, cwd: &Path, params: &PrParams<'_>) -> Result<String> {
        let url = self
            .run(
                cwd,
                &[
                    "pr",
                    "create",
                    "--head",
                    params.head,
                    "--base",
                    params.base,
                    "--title",
                    params.title,
                    "--body",
                    params.body,
                ],
            )
            .context("Failed to create pull request")?;
        // gh prints the PR URL as the last stdout line.
        Ok(url
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn pr_status(&self, cwd: &Path, branch: &str) -> Result<PrStatus> {
        let output = self.run(
            cwd,
            &[
                "pr",
                "view",
                branch,
                "--json",
                "url,state,mergeCommit,statusCheckRollup,reviewDecision",
            ],
        );

        let raw = match output {
            Ok(raw) => raw,
            Err(e) => {
                // "no pull requests found" is a normal answer, not a failure.
                if let Some(OrangeError::SubprocessFailed { stderr, .. }) =
                    e.downcast_ref::<OrangeError>()
                    && stderr.contains("no pull requests found")
                {
                    return Ok(PrStatus::default());
                }
                return Err(e);
            }
        };

        let json: Value =
            serde_json::from_str(&raw).context("Failed to parse gh pr view output")?;

        let state = match json["state"].as_str() {
            Some("OPEN") => Some(PrState::Open),
            Some("CLOSED") => Some(PrState::Closed),
            Some("MERGED") => Some(PrState::Merged),
            _ => None,
        };

        Ok(PrStatus {
            exists: true,
            url: json["url"].as_str().map(String::from),
            state,
            merge_commit: json["mergeCommit"]["oid"].as_str().map(String::from),
            checks: parse_checks(&json["statusCheckRollup"]),
            review_decision: json["reviewDecision"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(String::from),
        })
    }
}

/// Collapse gh's per-check rollup into a single verdict.
fn parse_checks(rollup: &Value) -> ChecksState {
    let Some(checks) = rollup.as_array() else {
        return ChecksState::None;
    };
    if checks.is_empty() {
        return ChecksState::None;
    }

    let mut pending = false;
    for check in checks {
        let status = check["status"].as_str().unwrap_or_default();
        let conclusion = check["conclusion"].as_str().unwrap_or_default();
        if status != "COMPLETED" {
            pending = true;
            continue;
        }
        match conclusion {
            "SUCCESS" | "NEUTRAL" | "SKIPPED" => {}
            _ => return ChecksState::Fail,
        }
    }
    if pending {
        ChecksState::Pending
    } else {
        ChecksState::Pass
    }
}
