//! Harness profiles: how each known agent binary is launched, resumed, and
//! fed its prompt. Unknown harnesses get the generic `--`-separator form.

/// Prompt file names dropped into the worktree (kept out of git by the
/// pool's exclude seeding).
pub const WORKER_PROMPT_FILE: &str = ".orange-prompt";
pub const REVIEW_PROMPT_FILE: &str = ".orange-prompt-review";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Claude,
    Codex,
    Gemini,
    OpenCode,
    Generic,
}

/// Launch profile for one harness binary.
#[derive(Debug, Clone)]
pub struct Profile {
    pub bin: String,
    kind: Kind,
}

/// Resolve a harness name to its launch profile.
pub fn resolve(name: &str) -> Profile {
    let bin = name.trim();
    let kind = match bin {
        "claude" => Kind::Claude,
        "codex" => Kind::Codex,
        "gemini" => Kind::Gemini,
        "opencode" => Kind::OpenCode,
        _ => Kind::Generic,
    };
    Profile {
        bin: if bin.is_empty() { "claude".to_string() } else { bin.to_string() },
        kind,
    }
}

impl Profile {
    /// Command that starts the harness with the prompt read from a file in
    /// the worktree. `None` launches the bare binary (clarification mode).
    pub fn spawn_command(&self, prompt_file: Option<&str>) -> String {
        let Some(file) = prompt_file else {
            return self.bin.clone();
        };
        match self.kind {
            Kind::Gemini => format!("{} -i \"$(cat {})\"", self.bin, file),
            Kind::OpenCode => format!("{} -p \"$(cat {})\"", self.bin, file),
            Kind::Claude | Kind::Codex | Kind::Generic => {
                format!("{} -- \"$(cat {})\"", self.bin, file)
            }
        }
    }

    /// Command that resumes the harness's previous conversation, optionally
    /// injecting a fresh prompt.
    pub fn respawn_command(&self, prompt_file: Option<&str>) -> String {
        let resume = match self.kind {
            Kind::Claude => format!("{} --continue", self.bin),
            Kind::Codex => format!("{} resume --last", self.bin),
            Kind::OpenCode => format!("{} --continue", self.bin),
            Kind::Gemini | Kind::Generic => self.bin.clone(),
        };
        match (prompt_file, self.kind) {
            (Some(file), Kind::Claude) => format!("{} -- \"$(cat {})\"", resume, file),
            (Some(file), Kind::Gemini) => format!("{} -i \"$(cat {})\"", resume, file),
            (Some(file), Kind::OpenCode) => format!("{} -p \"$(cat {})\"", resume, file),
            (Some(file), _) => format!("{} -- \"$(cat {})\"", resume, file),
            (None, _) => resume,
        }
    }

    /// Optional shell step run once when a workspace is bound to a task.
    /// None of the known harnesses need one today; kept as the seam the
    /// acquire-workspace hook calls.
    pub fn setup_command(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_uses_separator_form() {
        let p = resolve("claude");
        assert_eq!(
            p.spawn_command(Some(".orange-prompt")),
            "claude -- \"$(cat .orange-prompt)\""
        );
        assert_eq!(p.respawn_command(None), "claude --continue");
    }

    #[test]
    fn gemini_uses_interactive_flag() {
        let p = resolve("gemini");
        assert_eq!(
            p.spawn_command(Some(".orange-prompt")),
            "gemini -i \"$(cat .orange-prompt)\""
        );
    }

    #[test]
    fn opencode_uses_prompt_flag() {
        let p = resolve("opencode");
        assert_eq!(
            p.spawn_command(Some(".orange-prompt")),
            "opencode -p \"$(cat .orange-prompt)\""
        );
    }

    #[test]
    fn unknown_harness_gets_generic_form() {
        let p = resolve("my-agent");
        assert_eq!(
            p.spawn_command(Some(".orange-prompt")),
            "my-agent -- \"$(cat .orange-prompt)\""
        );
    }

    #[test]
    fn bare_launch_without_prompt() {
        assert_eq!(resolve("claude").spawn_command(None), "claude");
    }
}
