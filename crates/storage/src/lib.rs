// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pilot-storage: file-backed state with crash-safe write discipline.
//!
//! Every state file has a single writer (see the ownership table in the
//! design notes); mutations go through atomic temp-rename writes and
//! append-only JSONL logs, so no cross-process locks are needed.

pub mod action_log;
pub mod atomic;
pub mod bus;
pub mod checkpoint;
pub mod overnight;
pub mod paths;
pub mod pm_state;
pub mod pressure;
pub mod registry;

pub use action_log::{ActionEntry, ActionKind, AuditLogs, HumanEscalation};
pub use atomic::{append_jsonl, ensure_dir, read_json, read_jsonl, write_json_atomic, StoreError};
pub use bus::{MessageBus, MAX_LINE_BYTES};
pub use checkpoint::{CheckpointStore, ARCHIVE_KEEP};
pub use overnight::OvernightStore;
pub use paths::{sanitize_id, StatePaths};
pub use pm_state::PmStateStore;
pub use pressure::PressureTracker;
pub use registry::{RegistryError, SessionRegistry};
