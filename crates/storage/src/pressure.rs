// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session pressure tracker backed by `sessions/<id>.pressure.json`.

use crate::atomic::{read_json, write_json_atomic, StoreError};
use crate::paths::StatePaths;
use pilot_core::{Clock, PressureState, SessionId, SystemClock};

#[derive(Debug, Clone)]
pub struct PressureTracker<C: Clock = SystemClock> {
    paths: StatePaths,
    clock: C,
}

impl<C: Clock> PressureTracker<C> {
    pub fn new(paths: StatePaths, clock: C) -> Self {
        Self { paths, clock }
    }

    pub fn load(&self, session: &SessionId) -> PressureState {
        read_json(&self.paths.pressure_file(session)).unwrap_or_default()
    }

    fn save(&self, session: &SessionId, state: &PressureState) -> Result<(), StoreError> {
        write_json_atomic(&self.paths.pressure_file(session), state)
    }

    /// Count a tool call and its output volume; returns the updated state.
    pub fn record_tool_call(
        &self,
        session: &SessionId,
        output_bytes: u64,
    ) -> Result<PressureState, StoreError> {
        let mut state = self.load(session);
        state.tool_call_count += 1;
        state.estimated_output_bytes += output_bytes;
        self.save(session, &state)?;
        Ok(state)
    }

    /// Returns `(should_nudge, state)`, recording the nudge when it fires so
    /// the next one requires a further 10-point climb.
    pub fn check_and_nudge(
        &self,
        session: &SessionId,
        threshold_pct: u8,
    ) -> Result<(bool, PressureState), StoreError> {
        let mut state = self.load(session);
        if !state.should_nudge(threshold_pct) {
            return Ok((false, state));
        }
        state.record_nudge(self.clock.epoch_ms());
        self.save(session, &state)?;
        Ok((true, state))
    }

    /// Called after a successful checkpoint save.
    pub fn reset(&self, session: &SessionId) -> Result<(), StoreError> {
        self.save(session, &PressureState::default())
    }
}

#[cfg(test)]
#[path = "pressure_tests.rs"]
mod tests;
