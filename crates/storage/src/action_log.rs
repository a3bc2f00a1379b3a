// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit logs: the action log, human escalations, and the
//! scaling history. PM is the only writer of all three.

use crate::atomic::{append_jsonl, read_jsonl, StoreError};
use crate::paths::StatePaths;
use pilot_core::{Clock, ScalingDecision, SessionId, SystemClock, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether an action was a routine bookkeeping step or a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Mechanical,
    Judgment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub ts: u64,
    /// Which scan or handler produced this entry
    pub source: String,
    pub kind: ActionKind,
    pub action: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

/// A condition the escalation policy marked for a human.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanEscalation {
    pub ts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

#[derive(Debug, Clone)]
pub struct AuditLogs<C: Clock = SystemClock> {
    paths: StatePaths,
    clock: C,
}

impl<C: Clock> AuditLogs<C> {
    pub fn new(paths: StatePaths, clock: C) -> Self {
        Self { paths, clock }
    }

    pub fn record_action(
        &self,
        source: &str,
        kind: ActionKind,
        action: &str,
        detail: Value,
    ) -> Result<(), StoreError> {
        append_jsonl(
            &self.paths.action_log_file(),
            &ActionEntry {
                ts: self.clock.epoch_ms(),
                source: source.to_string(),
                kind,
                action: action.to_string(),
                detail,
            },
        )
    }

    pub fn actions(&self) -> Vec<ActionEntry> {
        read_jsonl(&self.paths.action_log_file())
    }

    pub fn record_escalation(
        &self,
        session_id: Option<SessionId>,
        task_id: Option<TaskId>,
        reason: &str,
        detail: Value,
    ) -> Result<(), StoreError> {
        append_jsonl(
            &self.paths.human_escalations_file(),
            &HumanEscalation {
                ts: self.clock.epoch_ms(),
                session_id,
                task_id,
                reason: reason.to_string(),
                detail,
            },
        )
    }

    pub fn escalations(&self) -> Vec<HumanEscalation> {
        read_jsonl(&self.paths.human_escalations_file())
    }

    pub fn record_scaling(&self, decision: &ScalingDecision) -> Result<(), StoreError> {
        append_jsonl(&self.paths.scaling_history_file(), decision)
    }

    pub fn scaling_history(&self) -> Vec<ScalingDecision> {
        read_jsonl(&self.paths.scaling_history_file())
    }
}

#[cfg(test)]
#[path = "action_log_tests.rs"]
mod tests;
