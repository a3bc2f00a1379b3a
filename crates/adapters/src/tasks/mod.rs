// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task gateway: a thin adapter over the external `bd` task store.
//!
//! Every operation shells out to the task CLI with an argv array and a
//! finite timeout; a non-zero exit surfaces as an error value for the scan
//! loop to log, never a crash.

pub mod fake;

use crate::subprocess::{run_with_timeout, SubprocessError, TASK_CLI_TIMEOUT};
use async_trait::async_trait;
use pilot_core::{SessionId, TaskId, TaskInfo};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskGatewayError {
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
    #[error("task CLI exited with code {code}: {stderr}")]
    Tool { code: i32, stderr: String },
    #[error("unparseable task CLI output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Dependency edges for one task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDeps {
    #[serde(default)]
    pub blocks: Vec<TaskId>,
    #[serde(default)]
    pub blocked_by: Vec<TaskId>,
}

/// The six operations pilot needs from the task store.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    /// Unclaimed tasks whose dependencies are satisfied.
    async fn ready(&self) -> Result<Vec<TaskInfo>, TaskGatewayError>;
    async fn list(&self, filter: &str) -> Result<Vec<TaskInfo>, TaskGatewayError>;
    async fn deps(&self, id: &TaskId) -> Result<TaskDeps, TaskGatewayError>;
    async fn claim(&self, id: &TaskId, session: &SessionId) -> Result<(), TaskGatewayError>;
    async fn update(&self, id: &TaskId, fields: &[(String, String)])
        -> Result<(), TaskGatewayError>;
    async fn close(&self, id: &TaskId) -> Result<(), TaskGatewayError>;
}

/// Gateway invoking the `bd` CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct CliTaskGateway {
    bin: String,
    project_root: PathBuf,
    timeout: Duration,
}

impl CliTaskGateway {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            bin: "bd".to_string(),
            project_root: project_root.into(),
            timeout: TASK_CLI_TIMEOUT,
        }
    }

    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 3);
        argv.push(self.bin.clone());
        argv.extend(args.iter().map(|s| s.to_string()));
        argv.push("--dir".to_string());
        argv.push(self.project_root.display().to_string());
        argv
    }

    async fn run(&self, args: &[&str], description: &str) -> Result<String, TaskGatewayError> {
        let out = run_with_timeout(&self.argv(args), self.timeout, description).await?;
        if !out.success() {
            return Err(TaskGatewayError::Tool {
                code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout)
    }

    fn parse_tasks(stdout: &str) -> Result<Vec<TaskInfo>, TaskGatewayError> {
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(stdout)?)
    }
}

#[async_trait]
impl TaskGateway for CliTaskGateway {
    async fn ready(&self) -> Result<Vec<TaskInfo>, TaskGatewayError> {
        let stdout = self.run(&["ready", "--json"], "bd ready").await?;
        Self::parse_tasks(&stdout)
    }

    async fn list(&self, filter: &str) -> Result<Vec<TaskInfo>, TaskGatewayError> {
        let stdout = self
            .run(&["list", "--filter", filter, "--json"], "bd list")
            .await?;
        Self::parse_tasks(&stdout)
    }

    async fn deps(&self, id: &TaskId) -> Result<TaskDeps, TaskGatewayError> {
        let stdout = self
            .run(&["deps", id.as_str(), "--json"], "bd deps")
            .await?;
        if stdout.trim().is_empty() {
            return Ok(TaskDeps::default());
        }
        Ok(serde_json::from_str(&stdout)?)
    }

    async fn claim(&self, id: &TaskId, session: &SessionId) -> Result<(), TaskGatewayError> {
        self.run(
            &["claim", id.as_str(), "--session", session.as_str()],
            "bd claim",
        )
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        id: &TaskId,
        fields: &[(String, String)],
    ) -> Result<(), TaskGatewayError> {
        let mut args: Vec<String> = vec!["update".to_string(), id.as_str().to_string()];
        for (key, value) in fields {
            args.push("--field".to_string());
            args.push(format!("{key}={value}"));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs, "bd update").await?;
        Ok(())
    }

    async fn close(&self, id: &TaskId) -> Result<(), TaskGatewayError> {
        self.run(&["close", id.as_str()], "bd close").await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
