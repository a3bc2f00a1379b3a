// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers.
//!
//! All external tools are invoked with argv arrays (never a shell string)
//! and a finite timeout.

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for task CLI invocations.
pub const TASK_CLI_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("empty argv")]
    EmptyArgv,
    #[error("{description} failed: {source}")]
    Spawn {
        description: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} timed out after {}s", timeout.as_secs())]
    TimedOut {
        description: String,
        timeout: Duration,
    },
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `argv` with a timeout, capturing stdout and stderr.
///
/// The child is killed automatically if the timeout elapses (via the tokio
/// `Child` drop implementation). A process killed by a signal reports
/// `exit_code = -1`.
pub async fn run_with_timeout(
    argv: &[String],
    timeout: Duration,
    description: &str,
) -> Result<CmdOutput, SubprocessError> {
    let (program, args) = argv.split_first().ok_or(SubprocessError::EmptyArgv)?;
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        }),
        Ok(Err(io_err)) => Err(SubprocessError::Spawn {
            description: description.to_string(),
            source: io_err,
        }),
        Err(_elapsed) => Err(SubprocessError::TimedOut {
            description: description.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
