// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records and lifecycle predicates.
//!
//! A session is one agent process's registration with the orchestrator. The
//! session file is owned by that process for writes; PM takes over only to
//! mark an obviously-dead session crashed and release its claim.

use crate::id::sortable_id;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// Environment variable carrying the current session id into child hooks.
pub const SESSION_ENV_VAR: &str = "PILOT_SESSION_ID";

crate::define_id! {
    /// Unique, sortable session identifier (`S-<base36 ms>-<rand>`).
    pub struct SessionId;
}

/// Mint a fresh session id sortable by birth time.
pub fn generate_session_id(now_ms: u64) -> SessionId {
    SessionId::new(sortable_id("S", now_ms))
}

/// Role tag used for task affinity in scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Pm,
    Frontend,
    Backend,
    Testing,
    #[default]
    General,
}

impl SessionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Pm => "pm",
            SessionRole::Frontend => "frontend",
            SessionRole::Backend => "backend",
            SessionRole::Testing => "testing",
            SessionRole::General => "general",
        }
    }

    /// Parse a role label; anything unrecognised lands in `General`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "pm" => SessionRole::Pm,
            "frontend" => SessionRole::Frontend,
            "backend" => SessionRole::Backend,
            "testing" => SessionRole::Testing,
            _ => SessionRole::General,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
    Crashed,
}

/// The per-session state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    pub pid: u32,
    pub parent_pid: u32,
    pub role: SessionRole,
    pub status: SessionStatus,
    pub started_at: u64,
    pub heartbeat_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<String>,
}

impl SessionState {
    pub fn new(id: SessionId, pid: u32, parent_pid: u32, role: SessionRole, now_ms: u64) -> Self {
        Self {
            id,
            pid,
            parent_pid,
            role,
            status: SessionStatus::Active,
            started_at: now_ms,
            heartbeat_at: now_ms,
            ended_at: None,
            claimed_task_id: None,
            claimed_at: None,
            lease_expires_at: None,
            exit_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Active but silent for longer than the stale threshold.
    pub fn is_stale(&self, now_ms: u64, stale_after_ms: u64) -> bool {
        self.is_active() && now_ms.saturating_sub(self.heartbeat_at) > stale_after_ms
    }

    /// Active but silent for longer than the dead threshold.
    pub fn is_dead(&self, now_ms: u64, dead_after_ms: u64) -> bool {
        self.is_active() && now_ms.saturating_sub(self.heartbeat_at) > dead_after_ms
    }

    /// A claim is live iff the session is active and the lease has not expired.
    pub fn claim_is_live(&self, now_ms: u64) -> bool {
        self.is_active()
            && self.claimed_task_id.is_some()
            && self.lease_expires_at.is_some_and(|exp| now_ms < exp)
    }

    /// Clear the claim fields (does not touch status).
    pub fn clear_claim(&mut self) {
        self.claimed_task_id = None;
        self.claimed_at = None;
        self.lease_expires_at = None;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
