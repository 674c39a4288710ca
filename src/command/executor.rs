//! Command execution - runs a finished command line under a timeout

use crate::core::error::{AgentError, Result};
use crate::core::types::CommandExecutionResult;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Default upper bound for a single command
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs command lines through the platform shell
///
/// The child is killed on timeout, and also when the returned future is
/// dropped (caller-side cancellation).
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_EXEC_TIMEOUT)
    }
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` with the executor's configured timeout
    pub async fn run(&self, command: &str) -> Result<CommandExecutionResult> {
        self.execute(command, self.timeout).await
    }

    /// Run `command` through the shell and capture its streams
    ///
    /// A non-zero exit is a normal result. Only the timeout (or a failure
    /// to spawn) is an error.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<CommandExecutionResult> {
        let mut child = shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let completed = {
            let wait = async {
                tokio::try_join!(read_stream(stdout), read_stream(stderr), child.wait())
            };
            tokio::time::timeout(timeout, wait).await
        };

        let (stdout, stderr, status) = match completed {
            Ok(result) => result?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed-out command");
                }
                tracing::warn!(command, ?timeout, "command timed out");
                return Err(AgentError::ExecutionTimeout {
                    command: command.to_string(),
                    timeout,
                });
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        tracing::debug!(command, exit_code, "command finished");

        Ok(CommandExecutionResult {
            command: command.to_string(),
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        })
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
