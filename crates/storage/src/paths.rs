// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout under the project root.
//!
//! ```text
//! state/
//!   sessions/<session-id>.json
//!   sessions/<session-id>.pressure.json
//!   orchestrator/{pm-state.json, pm-daemon.pid, spawned.json,
//!                 action-log.jsonl, human-escalations.jsonl,
//!                 scaling-history.jsonl}
//!   checkpoints/<session-id>/v<n>.json
//!   overnight/<run-id>.json, overnight/errors/, overnight/reports/
//! messages/
//!   bus.jsonl
//!   offsets/<consumer>.json
//! logs/
//!   pm-daemon.log, agent-<task-id>.log[.1..N]
//! ```

use pilot_core::{SessionId, TaskId};
use std::path::{Path, PathBuf};

/// Replace anything that is not path-segment-safe.
pub fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Resolver for every state path pilot touches.
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -- state/ --

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("state").join("sessions")
    }

    pub fn session_file(&self, id: &SessionId) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", sanitize_id(id.as_str())))
    }

    pub fn pressure_file(&self, id: &SessionId) -> PathBuf {
        self.sessions_dir()
            .join(format!("{}.pressure.json", sanitize_id(id.as_str())))
    }

    pub fn orchestrator_dir(&self) -> PathBuf {
        self.root.join("state").join("orchestrator")
    }

    pub fn pm_state_file(&self) -> PathBuf {
        self.orchestrator_dir().join("pm-state.json")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.orchestrator_dir().join("pm-daemon.pid")
    }

    pub fn spawned_file(&self) -> PathBuf {
        self.orchestrator_dir().join("spawned.json")
    }

    pub fn action_log_file(&self) -> PathBuf {
        self.orchestrator_dir().join("action-log.jsonl")
    }

    pub fn human_escalations_file(&self) -> PathBuf {
        self.orchestrator_dir().join("human-escalations.jsonl")
    }

    pub fn scaling_history_file(&self) -> PathBuf {
        self.orchestrator_dir().join("scaling-history.jsonl")
    }

    pub fn checkpoints_dir(&self, session: &SessionId) -> PathBuf {
        self.root
            .join("state")
            .join("checkpoints")
            .join(sanitize_id(session.as_str()))
    }

    pub fn overnight_dir(&self) -> PathBuf {
        self.root.join("state").join("overnight")
    }

    pub fn overnight_run_file(&self, run_id: &str) -> PathBuf {
        self.overnight_dir().join(format!("{}.json", sanitize_id(run_id)))
    }

    pub fn overnight_error_file(&self, task: &TaskId) -> PathBuf {
        self.overnight_dir()
            .join("errors")
            .join(format!("{}.json", sanitize_id(task.as_str())))
    }

    pub fn overnight_reports_dir(&self) -> PathBuf {
        self.overnight_dir().join("reports")
    }

    // -- messages/ --

    pub fn bus_file(&self) -> PathBuf {
        self.root.join("messages").join("bus.jsonl")
    }

    pub fn offset_file(&self, consumer: &str) -> PathBuf {
        self.root
            .join("messages")
            .join("offsets")
            .join(format!("{}.json", sanitize_id(consumer)))
    }

    // -- logs/ --

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.logs_dir().join("pm-daemon.log")
    }

    pub fn agent_log_file(&self, task: &TaskId) -> PathBuf {
        self.logs_dir()
            .join(format!("agent-{}.log", sanitize_id(task.as_str())))
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
