// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide PM daemon counters, atomically rewritten each tick.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PmState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm_session_id: Option<SessionId>,
    #[serde(default)]
    pub started_at: u64,
    #[serde(default)]
    pub tick_count: u64,
    #[serde(default)]
    pub events_processed: u64,
    #[serde(default)]
    pub agents_spawned: u64,
    #[serde(default)]
    pub tasks_auto_reviewed: u64,
    #[serde(default)]
    pub tasks_auto_closed: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub last_tick_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PmState {
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.last_error = Some(message.into());
    }
}
