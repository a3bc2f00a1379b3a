// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context-pressure accounting.
//!
//! Pressure is a coarse monotonic proxy for context-window occupancy: a byte
//! count of agent output divided by an assumed context size. It is never a
//! ground-truth token count; the nudge threshold lives in policy so a better
//! signal can be swapped in without touching callers.

use serde::{Deserialize, Serialize};

/// Assumed usable context size in bytes (~800 KiB).
pub const ESTIMATED_CONTEXT_BYTES: u64 = 800 * 1024;

/// A session is re-nudged only after climbing this many percentage points
/// past its last nudge.
pub const RENUDGE_STEP_PCT: u8 = 10;

/// Per-session pressure counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureState {
    #[serde(default)]
    pub tool_call_count: u64,
    #[serde(default)]
    pub estimated_output_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_nudge_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_nudge_pct: Option<u8>,
}

impl PressureState {
    /// Percentage estimate, capped at 100.
    pub fn pct_estimate(&self) -> u8 {
        let pct = (self.estimated_output_bytes * 100 + ESTIMATED_CONTEXT_BYTES / 2)
            / ESTIMATED_CONTEXT_BYTES;
        pct.min(100) as u8
    }

    /// Nudge once on crossing the threshold; re-nudge only after a further
    /// [`RENUDGE_STEP_PCT`] increase.
    pub fn should_nudge(&self, threshold_pct: u8) -> bool {
        let pct = self.pct_estimate();
        if pct < threshold_pct {
            return false;
        }
        match self.last_nudge_pct {
            None => true,
            Some(last) => pct >= last.saturating_add(RENUDGE_STEP_PCT),
        }
    }

    /// Record that a nudge was delivered at the current estimate.
    pub fn record_nudge(&mut self, now_ms: u64) {
        self.last_nudge_at = Some(now_ms);
        self.last_nudge_pct = Some(self.pct_estimate());
    }
}

#[cfg(test)]
#[path = "pressure_tests.rs"]
mod tests;
