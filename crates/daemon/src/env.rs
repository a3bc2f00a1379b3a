// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable contract and test overrides.

use std::time::Duration;

/// Set to `1` in children spawned by the daemon.
pub const DAEMON_SPAWNED_VAR: &str = "PILOT_DAEMON_SPAWNED";

/// The task id the spawned child is expected to work on.
pub const TASK_HINT_VAR: &str = "PILOT_TASK_HINT";

/// Tick interval override in milliseconds (`PILOT_TICK_MS`), mainly for tests.
pub fn tick_override() -> Option<Duration> {
    std::env::var("PILOT_TICK_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
