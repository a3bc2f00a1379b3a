// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: one JSON file per session under `state/sessions/`.
//!
//! Each session file is written by the owning process; PM writes only to
//! mark dead sessions crashed and release their claims. Claim races between
//! processes are settled by the atomic-rename contract: one writer wins the
//! rename, the other re-reads and observes the existing live claim.

use crate::atomic::{read_json, write_json_atomic, StoreError};
use crate::paths::StatePaths;
use pilot_core::{
    generate_session_id, Clock, SessionId, SessionRole, SessionState, SessionStatus, SystemClock,
    TaskId, SESSION_ENV_VAR,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error("task {task_id} already claimed by session {held_by}")]
    ClaimHeld { task_id: TaskId, held_by: SessionId },
}

#[derive(Debug, Clone)]
pub struct SessionRegistry<C: Clock = SystemClock> {
    paths: StatePaths,
    clock: C,
}

impl<C: Clock> SessionRegistry<C> {
    pub fn new(paths: StatePaths, clock: C) -> Self {
        Self { paths, clock }
    }

    pub fn generate_id(&self) -> SessionId {
        generate_session_id(self.clock.epoch_ms())
    }

    /// Record a session birth. Idempotent on identity: re-recording an
    /// existing id rewrites the same file.
    pub fn record_start(
        &self,
        id: &SessionId,
        pid: u32,
        parent_pid: u32,
        role: SessionRole,
    ) -> Result<(), RegistryError> {
        let state = SessionState::new(id.clone(), pid, parent_pid, role, self.clock.epoch_ms());
        write_json_atomic(&self.paths.session_file(id), &state)?;
        Ok(())
    }

    /// Refresh the heartbeat. No-op if the session file is missing.
    pub fn heartbeat(&self, id: &SessionId) -> Result<(), RegistryError> {
        let Some(mut state) = self.get(id) else {
            return Ok(());
        };
        state.heartbeat_at = self.clock.epoch_ms();
        write_json_atomic(&self.paths.session_file(id), &state)?;
        Ok(())
    }

    /// End a session, releasing any claim atomically with the status change.
    pub fn end(&self, id: &SessionId, reason: &str) -> Result<(), RegistryError> {
        let Some(mut state) = self.get(id) else {
            return Err(RegistryError::NotFound(id.clone()));
        };
        state.status = SessionStatus::Ended;
        state.ended_at = Some(self.clock.epoch_ms());
        state.exit_reason = Some(reason.to_string());
        state.clear_claim();
        write_json_atomic(&self.paths.session_file(id), &state)?;
        Ok(())
    }

    /// Mark a session crashed (PM-only path) and release its claim.
    pub fn mark_crashed(&self, id: &SessionId, reason: &str) -> Result<(), RegistryError> {
        let Some(mut state) = self.get(id) else {
            return Err(RegistryError::NotFound(id.clone()));
        };
        state.status = SessionStatus::Crashed;
        state.ended_at = Some(self.clock.epoch_ms());
        state.exit_reason = Some(reason.to_string());
        state.clear_claim();
        write_json_atomic(&self.paths.session_file(id), &state)?;
        Ok(())
    }

    /// Claim a task with a lease. Fails with [`RegistryError::ClaimHeld`] if
    /// another session holds a live claim on it. Re-claiming by the same
    /// session renews the lease.
    pub fn claim(
        &self,
        id: &SessionId,
        task_id: &TaskId,
        lease_ms: u64,
    ) -> Result<(), RegistryError> {
        let now = self.clock.epoch_ms();
        for other in self.all_session_states() {
            if other.id != *id
                && other.claim_is_live(now)
                && other.claimed_task_id.as_ref() == Some(task_id)
            {
                return Err(RegistryError::ClaimHeld {
                    task_id: task_id.clone(),
                    held_by: other.id,
                });
            }
        }
        let Some(mut state) = self.get(id) else {
            return Err(RegistryError::NotFound(id.clone()));
        };
        state.claimed_task_id = Some(task_id.clone());
        state.claimed_at = Some(now);
        state.lease_expires_at = Some(now + lease_ms);
        write_json_atomic(&self.paths.session_file(id), &state)?;
        Ok(())
    }

    /// Clear the claim fields. Idempotent.
    pub fn release(&self, id: &SessionId) -> Result<(), RegistryError> {
        let Some(mut state) = self.get(id) else {
            return Ok(());
        };
        state.clear_claim();
        write_json_atomic(&self.paths.session_file(id), &state)?;
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionState> {
        read_json(&self.paths.session_file(id))
    }

    /// Every session state on disk, unreadable files skipped.
    pub fn all_session_states(&self) -> Vec<SessionState> {
        let dir = self.paths.sessions_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut sessions: Vec<SessionState> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.ends_with(".json") && !name.ends_with(".pressure.json")
            })
            .filter_map(|e| read_json(&e.path()))
            .collect();
        sessions.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        sessions
    }

    pub fn active_sessions(&self) -> Vec<SessionState> {
        self.all_session_states()
            .into_iter()
            .filter(SessionState::is_active)
            .collect()
    }

    /// Resolve the session owning the current process: the environment
    /// variable wins, then parent-pid matching, then most-recent-active.
    pub fn resolve_current_session(&self) -> Option<SessionState> {
        if let Ok(id) = std::env::var(SESSION_ENV_VAR) {
            if let Some(state) = self.get(&SessionId::new(id)) {
                return Some(state);
            }
        }
        let pid = std::process::id();
        let active = self.active_sessions();
        if let Some(state) = active.iter().find(|s| s.pid == pid || s.parent_pid == pid) {
            return Some(state.clone());
        }
        active.into_iter().max_by_key(|s| s.started_at)
    }

    /// Task ids under a live claim, optionally excluding one session.
    pub fn claimed_task_ids(&self, exclude: Option<&SessionId>) -> HashSet<TaskId> {
        let now = self.clock.epoch_ms();
        self.all_session_states()
            .into_iter()
            .filter(|s| exclude != Some(&s.id))
            .filter(|s| s.claim_is_live(now))
            .filter_map(|s| s.claimed_task_id)
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
