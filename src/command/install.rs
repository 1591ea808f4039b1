use std::fs;

use anyhow::{Context, Result};
use console::style;

use super::Ctx;

/// Stop hook relayed by the agent harness on exit. Reads the worktree marker
/// without a JSON parser and calls back into the CLI with the outcome the
/// agent recorded there.
const STOP_HOOK: &str = r#"#!/bin/sh
# orange stop hook: relay the agent's outcome to the orange CLI.
# Runs in the agent's working directory (the task worktree).
marker=".orange-task"
[ -f "$marker" ] || exit 0

id=$(sed -n 's/.*"id"[[:space:]]*:[[:space:]]*"\([^"]*\)".*/\1/p' "$marker")
outcome=$(sed -n 's/.*"outcome"[[:space:]]*:[[:space:]]*"\([^"]*\)".*/\1/p' "$marker")
[ -n "$id" ] || exit 0

case "$outcome" in
  stuck)
    exec orange task stuck "$id"
    ;;
  *)
    exec orange task complete "$id"
    ;;
esac
"#;

pub fn run(ctx: &Ctx) -> Result<()> {
    let hooks_dir = ctx.deps.data.hooks_dir();
    fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;

    let hook_path = hooks_dir.join("stop-hook.sh");
    fs::write(&hook_path, STOP_HOOK)
        .with_context(|| format!("Failed to write {}", hook_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&hook_path, fs::Permissions::from_mode(0o755))?;
    }

    println!(
        "{} stop hook installed at {}",
        style("✔").green(),
        hook_path.display()
    );
    println!();
    println!("Wire it into your agent harness so it runs when the agent exits.");
    println!("For Claude Code, add to ~/.claude/settings.json:");
    println!();
    println!("  \"hooks\": {{");
    println!("    \"Stop\": [{{ \"hooks\": [{{ \"type\": \"command\",");
    println!("      \"command\": \"{}\" }}] }}]", hook_path.display());
    println!("  }}");
    Ok(())
}
