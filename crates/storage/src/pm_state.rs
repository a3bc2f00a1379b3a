// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PmState persistence: atomically rewritten once per tick, PM-only writer.

use crate::atomic::{read_json, write_json_atomic, StoreError};
use crate::paths::StatePaths;
use pilot_core::PmState;

#[derive(Debug, Clone)]
pub struct PmStateStore {
    paths: StatePaths,
}

impl PmStateStore {
    pub fn new(paths: StatePaths) -> Self {
        Self { paths }
    }

    pub fn load(&self) -> PmState {
        read_json(&self.paths.pm_state_file()).unwrap_or_default()
    }

    pub fn save(&self, state: &PmState) -> Result<(), StoreError> {
        write_json_atomic(&self.paths.pm_state_file(), state)
    }
}

#[cfg(test)]
#[path = "pm_state_tests.rs"]
mod tests;
