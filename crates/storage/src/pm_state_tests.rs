// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_when_missing_or_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = PmStateStore::new(StatePaths::new(dir.path()));
    assert_eq!(store.load(), PmState::default());

    std::fs::create_dir_all(dir.path().join("state/orchestrator")).unwrap();
    std::fs::write(dir.path().join("state/orchestrator/pm-state.json"), "}{").unwrap();
    assert_eq!(store.load(), PmState::default());
}

#[test]
fn save_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = PmStateStore::new(StatePaths::new(dir.path()));
    let mut state = PmState {
        tick_count: 7,
        agents_spawned: 2,
        ..Default::default()
    };
    state.record_error("gateway timed out");
    store.save(&state).unwrap();

    let loaded = store.load();
    assert_eq!(loaded, state);
    assert_eq!(loaded.errors, 1);
    assert_eq!(loaded.last_error.as_deref(), Some("gateway timed out"));
}
