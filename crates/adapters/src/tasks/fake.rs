// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory task gateway for tests.

use super::{TaskDeps, TaskGateway, TaskGatewayError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pilot_core::{SessionId, TaskId, TaskInfo};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct FakeState {
    ready: Vec<TaskInfo>,
    deps: HashMap<TaskId, TaskDeps>,
    claims: HashMap<TaskId, SessionId>,
    closed: Vec<TaskId>,
    updates: Vec<(TaskId, Vec<(String, String)>)>,
    fail_next: Option<String>,
}

/// Scriptable gateway: seed ready tasks, observe claims/closes.
#[derive(Clone, Default)]
pub struct FakeTaskGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTaskGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ready(&self, task: TaskInfo) {
        self.state.lock().ready.push(task);
    }

    pub fn set_deps(&self, id: TaskId, deps: TaskDeps) {
        self.state.lock().deps.insert(id, deps);
    }

    /// Make the next operation fail with a tool error.
    pub fn fail_next(&self, stderr: impl Into<String>) {
        self.state.lock().fail_next = Some(stderr.into());
    }

    pub fn closed(&self) -> Vec<TaskId> {
        self.state.lock().closed.clone()
    }

    pub fn claims(&self) -> HashMap<TaskId, SessionId> {
        self.state.lock().claims.clone()
    }

    pub fn updates(&self) -> Vec<(TaskId, Vec<(String, String)>)> {
        self.state.lock().updates.clone()
    }

    fn take_failure(&self) -> Option<TaskGatewayError> {
        self.state
            .lock()
            .fail_next
            .take()
            .map(|stderr| TaskGatewayError::Tool { code: 1, stderr })
    }
}

#[async_trait]
impl TaskGateway for FakeTaskGateway {
    async fn ready(&self) -> Result<Vec<TaskInfo>, TaskGatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let state = self.state.lock();
        Ok(state
            .ready
            .iter()
            .filter(|t| !state.closed.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn list(&self, _filter: &str) -> Result<Vec<TaskInfo>, TaskGatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.state.lock().ready.clone())
    }

    async fn deps(&self, id: &TaskId) -> Result<TaskDeps, TaskGatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self
            .state
            .lock()
            .deps
            .get(id)
            .map(|d| TaskDeps {
                blocks: d.blocks.clone(),
                blocked_by: d.blocked_by.clone(),
            })
            .unwrap_or_default())
    }

    async fn claim(&self, id: &TaskId, session: &SessionId) -> Result<(), TaskGatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state.lock().claims.insert(id.clone(), session.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: &TaskId,
        fields: &[(String, String)],
    ) -> Result<(), TaskGatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state
            .lock()
            .updates
            .push((id.clone(), fields.to_vec()));
        Ok(())
    }

    async fn close(&self, id: &TaskId) -> Result<(), TaskGatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state.lock().closed.push(id.clone());
        Ok(())
    }
}
