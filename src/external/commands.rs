//! Shell command execution.

use std::borrow::Cow;
use std::path::Path;

use async_trait::async_trait;
use shell_escape::escape;
use tokio::process::Command;

use crate::error::{ControlError, ControlResult};

/// Runs a shell command line and returns its standard output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// A non-zero exit status is an error carrying the command's stderr.
    async fn run(&self, command: &str) -> ControlResult<String>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> ControlResult<String> {
        tracing::debug!(command, "Running command");

        let output = Command::new("sh").arg("-c").arg(command).output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let output = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            };
            Err(ControlError::Command {
                command: command.to_string(),
                output,
            })
        }
    }
}

/// Quote a value for interpolation into a `sh -c` command line. Plain
/// words pass through unchanged.
pub fn quote(value: &str) -> String {
    escape(Cow::Borrowed(value)).into_owned()
}

pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_runner_captures_stdout() {
        let out = ShellRunner.run("echo hello").await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_shell_runner_reports_stderr() {
        let err = ShellRunner.run("echo broken >&2; exit 3").await.unwrap_err();
        match err {
            ControlError::Command { command, output } => {
                assert_eq!(command, "echo broken >&2; exit 3");
                assert_eq!(output, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_quote_leaves_plain_words_alone() {
        assert_eq!(quote("app.example.com"), "app.example.com");
        assert_eq!(quote_path(Path::new("/etc/ssl/app/privkey.pem")), "/etc/ssl/app/privkey.pem");
    }

    #[tokio::test]
    async fn test_quoted_glob_reaches_command_literally() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.example.com"), "").unwrap();

        let command = format!("cd {} && echo {}", quote_path(dir.path()), quote("*.example.com"));
        assert_eq!(ShellRunner.run(&command).await.unwrap(), "*.example.com\n");
    }
}
