use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::{Command, Output};
use tracing::{debug, trace};

use crate::error::OrangeError;

/// A builder for executing external tools with unified error handling.
///
/// All adapters (git, tmux, gh) go through this so a non-zero exit always
/// surfaces as `OrangeError::SubprocessFailed` carrying the tool's stderr.
pub struct Cmd<'a> {
    command: &'a str,
    args: Vec<&'a str>,
    workdir: Option<&'a Path>,
    envs: Vec<(&'a str, &'a str)>,
}

impl<'a> Cmd<'a> {
    /// Create a new command builder
    pub fn new(command: &'a str) -> Self {
        Self {
            command,
            args: Vec::new(),
            workdir: None,
            envs: Vec::new(),
        }
    }

    /// Add a single argument
    pub fn arg(mut self, arg: &'a str) -> Self {
        self.args.push(arg);
        self
    }

    /// Add multiple arguments
    pub fn args(mut self, args: &[&'a str]) -> Self {
        self.args.extend_from_slice(args);
        self
    }

    /// Set the working directory for the command
    pub fn workdir(mut self, path: &'a Path) -> Self {
        self.workdir = Some(path);
        self
    }

    /// Add an environment variable for the child process
    pub fn env(mut self, key: &'a str, value: &'a str) -> Self {
        self.envs.push((key, value));
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(self.command);
        if let Some(dir) = self.workdir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.args(&self.args);
        cmd
    }

    /// Execute the command and return the output.
    /// A non-zero exit code becomes a typed `SubprocessFailed` error.
    pub fn run(self) -> Result<Output> {
        let workdir_display = self.workdir.map(|p| p.display().to_string());
        trace!(command = self.command, args = ?self.args, workdir = ?workdir_display, "cmd:run start");

        let output = self.build().output().with_context(|| {
            format!(
                "Failed to execute command: {} {}",
                self.command,
                self.args.join(" ")
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(
                command = self.command,
                args = ?self.args,
                status = ?output.status.code(),
                stderr = %stderr,
                "cmd:run failure"
            );
            return Err(OrangeError::SubprocessFailed {
                tool: self.command.to_string(),
                exit: output.status.code().unwrap_or(-1),
                stderr,
            }
            .into());
        }
        trace!(command = self.command, "cmd:run success");
        Ok(output)
    }

    /// Execute the command and return stdout as a trimmed string
    pub fn run_and_capture_stdout(self) -> Result<String> {
        let output = self.run()?;
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    /// Execute the command, returning Ok(true) if it succeeds, Ok(false) if it fails.
    /// Useful for commands that act as checks (e.g. git rev-parse --verify).
    pub fn run_as_check(self) -> Result<bool> {
        trace!(command = self.command, args = ?self.args, "cmd:check start");

        let output = self.build().output().with_context(|| {
            format!(
                "Failed to execute command: {} {}",
                self.command,
                self.args.join(" ")
            )
        })?;

        let success = output.status.success();
        trace!(command = self.command, success, "cmd:check result");
        Ok(success)
    }

    /// Execute the command with the parent's stdio attached (interactive use,
    /// e.g. `tmux attach-session`). Fails on non-zero exit.
    pub fn run_interactive(self) -> Result<()> {
        let status = self
            .build()
            .status()
            .with_context(|| format!("Failed to execute command: {}", self.command))?;

        if !status.success() {
            return Err(anyhow!(
                "Command failed with exit code {}: {}",
                status.code().unwrap_or(-1),
                self.command
            ));
        }
        Ok(())
    }
}

/// Run a shell command line in a working directory (harness setup steps).
pub fn shell_command(command: &str, workdir: &Path) -> Result<()> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .status()
        .with_context(|| format!("Failed to execute shell command: {}", command))?;

    if !status.success() {
        return Err(anyhow!(
            "Shell command failed with exit code {}: {}",
            status.code().unwrap_or(-1),
            command
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_command_yields_typed_error() {
        let err = Cmd::new("false").run().unwrap_err();
        let typed = err.downcast_ref::<OrangeError>();
        assert!(matches!(
            typed,
            Some(OrangeError::SubprocessFailed { exit: 1, .. })
        ));
    }

    #[test]
    fn check_does_not_error_on_failure() {
        assert!(!Cmd::new("false").run_as_check().unwrap());
        assert!(Cmd::new("true").run_as_check().unwrap());
    }

    #[test]
    fn capture_trims_stdout() {
        let out = Cmd::new("echo")
            .arg("hello")
            .run_and_capture_stdout()
            .unwrap();
        assert_eq!(out, "hello");
    }
}
