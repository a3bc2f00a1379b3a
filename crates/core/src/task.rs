// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task metadata as seen through the task gateway.

use crate::session::SessionRole;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier of a task in the external task store.
    pub struct TaskId;
}

/// Complexity class used by the task scan to decide on decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complexity {
    S,
    M,
    L,
}

/// A task row returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    /// Higher wins; ties broken by `created_at`.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub blocked_by: Vec<TaskId>,
    /// Tasks this one blocks; used as the dependency-openness signal.
    #[serde(default)]
    pub blocks: Vec<TaskId>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl TaskInfo {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: "open".to_string(),
            priority: 0,
            created_at: 0,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Role affinity derived from labels, if any label names a role.
    pub fn role_hint(&self) -> Option<SessionRole> {
        self.labels.iter().find_map(|l| {
            matches!(l.as_str(), "frontend" | "backend" | "testing")
                .then(|| SessionRole::from_label(l))
        })
    }

    /// Coarse complexity classification by description size and fan-out.
    ///
    /// Large tasks are candidates for decomposition before scheduling; the
    /// boundaries are deliberately rough since only L matters downstream.
    pub fn complexity(&self) -> Complexity {
        let weight = self.description.len() + self.title.len() + 80 * self.blocks.len();
        if weight > 1_200 {
            Complexity::L
        } else if weight > 300 {
            Complexity::M
        } else {
            Complexity::S
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
