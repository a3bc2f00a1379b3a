// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint model: a snapshot of a session's task progress.
//!
//! Versioning and archival live in the storage crate; this is the document.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// One finished plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub step: u32,
    pub description: String,
    #[serde(default)]
    pub result: String,
}

/// Versioned snapshot of task progress, written by the owning session
/// (or by PM for its own self-checkpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub task_id: TaskId,
    pub task_title: String,
    #[serde(default)]
    pub plan_step: u32,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub completed_steps: Vec<CompletedStep>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub current_context: String,
    #[serde(default)]
    pub important_findings: Vec<String>,
    #[serde(default)]
    pub tool_call_count_at_save: u64,
    #[serde(default)]
    pub output_bytes_at_save: u64,
    pub saved_at: u64,
}

impl Checkpoint {
    /// A fresh version-0 checkpoint; the store assigns the real version.
    pub fn new(task_id: impl Into<TaskId>, task_title: impl Into<String>) -> Self {
        Self {
            version: 0,
            task_id: task_id.into(),
            task_title: task_title.into(),
            plan_step: 0,
            total_steps: 0,
            completed_steps: Vec::new(),
            key_decisions: Vec::new(),
            files_modified: Vec::new(),
            current_context: String::new(),
            important_findings: Vec::new(),
            tool_call_count_at_save: 0,
            output_bytes_at_save: 0,
            saved_at: 0,
        }
    }
}
