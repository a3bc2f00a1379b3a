// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overnight run model: a bounded, supervised batch of tasks.

use crate::id::sortable_id;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvernightStatus {
    Active,
    Completed,
    Stopped,
}

/// A supervised batch run with error budgets and a terminal report.
///
/// A task id appears in at most one of `tasks_in_progress`,
/// `tasks_completed`, `tasks_failed`; the transition helpers maintain this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvernightRun {
    pub run_id: String,
    pub description: String,
    pub task_ids: Vec<TaskId>,
    #[serde(default)]
    pub tasks_in_progress: Vec<TaskId>,
    #[serde(default)]
    pub tasks_completed: Vec<TaskId>,
    #[serde(default)]
    pub tasks_failed: Vec<TaskId>,
    #[serde(default)]
    pub total_errors: u32,
    #[serde(default)]
    pub drain_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_requested_at: Option<u64>,
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    pub status: OvernightStatus,
}

impl OvernightRun {
    pub fn new(description: impl Into<String>, task_ids: Vec<TaskId>, now_ms: u64) -> Self {
        Self {
            run_id: sortable_id("R", now_ms),
            description: description.into(),
            task_ids,
            tasks_in_progress: Vec::new(),
            tasks_completed: Vec::new(),
            tasks_failed: Vec::new(),
            total_errors: 0,
            drain_requested: false,
            drain_requested_at: None,
            started_at: now_ms,
            ended_at: None,
            status: OvernightStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OvernightStatus::Active
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.task_ids.contains(task_id)
    }

    fn remove_everywhere(&mut self, task_id: &TaskId) {
        self.tasks_in_progress.retain(|t| t != task_id);
        self.tasks_completed.retain(|t| t != task_id);
        self.tasks_failed.retain(|t| t != task_id);
    }

    pub fn mark_in_progress(&mut self, task_id: &TaskId) {
        self.remove_everywhere(task_id);
        self.tasks_in_progress.push(task_id.clone());
    }

    pub fn mark_completed(&mut self, task_id: &TaskId) {
        self.remove_everywhere(task_id);
        self.tasks_completed.push(task_id.clone());
    }

    pub fn mark_failed(&mut self, task_id: &TaskId) {
        self.remove_everywhere(task_id);
        self.tasks_failed.push(task_id.clone());
    }

    pub fn request_drain(&mut self, now_ms: u64) {
        if !self.drain_requested {
            self.drain_requested = true;
            self.drain_requested_at = Some(now_ms);
        }
    }

    /// Every task has reached a terminal list.
    pub fn all_tasks_settled(&self) -> bool {
        self.task_ids
            .iter()
            .all(|t| self.tasks_completed.contains(t) || self.tasks_failed.contains(t))
    }

    pub fn end(&mut self, status: OvernightStatus, now_ms: u64) {
        self.status = status;
        self.ended_at = Some(now_ms);
    }
}

#[cfg(test)]
#[path = "overnight_tests.rs"]
mod tests;
