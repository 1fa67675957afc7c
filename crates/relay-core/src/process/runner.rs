//! External command execution behind an injectable [`CommandRunner`].
//!
//! Commands are always spawned directly with an argument vector, never via
//! `sh -c`, so operator input can never be interpreted by a shell. Every call
//! blocks until the child exits; there is no timeout.

use std::fmt;
use std::io;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn { command: String, source: io::Error },
    #[error("`{command}` exited with {}: {stderr}", exit_code_label(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_code_label(code: &Option<i32>) -> String {
    match *code {
        Some(c) => format!("status {}", c),
        None => "no status (killed by signal)".to_string(),
    }
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs external commands to completion. Success means exit status zero.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<(), CommandError>;
}

/// Spawns real processes with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<(), CommandError> {
        debug!(command = %cmd, "Running command");

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .map_err(|source| CommandError::Spawn {
                command: cmd.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(command = %cmd, stdout = %stdout.trim(), "Command output");
        }

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: cmd.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Run `cmd`, logging `error_message` before handing back the failure.
pub fn run_logged<R: CommandRunner + ?Sized>(
    runner: &R,
    cmd: &CommandSpec,
    error_message: &str,
) -> Result<(), CommandError> {
    runner.run(cmd).map_err(|e| {
        error!(command = %cmd, error = %e, "Error: {}", error_message);
        e
    })
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    #[test]
    fn test_display_joins_args() {
        let cmd = CommandSpec::new("chmod").arg("600").args(["/a", "/b"]);
        assert_eq!(cmd.to_string(), "chmod 600 /a /b");
    }

    #[test]
    fn test_system_runner_success() {
        let cmd = CommandSpec::new("true");
        assert!(SystemCommandRunner.run(&cmd).is_ok());
    }

    #[test]
    fn test_system_runner_nonzero_exit() {
        let cmd = CommandSpec::new("false");
        match SystemCommandRunner.run(&cmd) {
            Err(CommandError::Failed { code, command, .. }) => {
                assert_eq!(code, Some(1));
                assert_eq!(command, "false");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_system_runner_captures_stderr() {
        let cmd = CommandSpec::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        match SystemCommandRunner.run(&cmd) {
            Err(CommandError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_system_runner_missing_program() {
        let cmd = CommandSpec::new("definitely-not-a-real-program-4f1c");
        assert!(matches!(
            SystemCommandRunner.run(&cmd),
            Err(CommandError::Spawn { .. })
        ));
    }

    #[test]
    fn test_run_logged_passes_error_through() {
        let runner = RecordingRunner::failing_on("postmap");
        let cmd = CommandSpec::new("postmap").arg("/etc/postfix/sasl_password");
        let err = run_logged(&runner, &cmd, "Failed to run postmap").unwrap_err();
        assert!(err.to_string().contains("simulated failure"));
        assert_eq!(runner.command_lines(), vec!["postmap /etc/postfix/sasl_password"]);
    }
}
