// CLI invocation for daemon operations the local API does not expose.
//
// Output is captured as stdout followed by stderr and attached to the
// error on a non-zero exit.

use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::scoped;
use crate::error::CoreError;

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Runs the daemon's CLI binary.
#[derive(Debug, Clone)]
pub struct CliRunner {
    command: String,
}

impl CliRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run `<command> <args...>` and return its output.
    ///
    /// The child is killed if `scope` ends before it exits.
    pub async fn run(
        &self,
        op: &'static str,
        scope: &CancellationToken,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<CliOutput, CoreError> {
        debug!(op, command = %self.command, ?args, "running cli");

        let mut cmd = Command::new(&self.command);
        cmd.args(args)
            .envs(envs.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| CoreError::CliFailed {
            op,
            status: "spawn failed".into(),
            output: format!("{}: {e}", self.command),
        })?;

        let output = scoped(op, scope, async {
            child
                .wait_with_output()
                .await
                .map_err(|e| CoreError::CliFailed {
                    op,
                    status: "wait failed".into(),
                    output: e.to_string(),
                })
        })
        .await?;

        let captured = CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(captured)
        } else {
            Err(CoreError::CliFailed {
                op,
                status: output.status.to_string(),
                output: captured.combined().trim().to_owned(),
            })
        }
    }
}
