// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{CompletedStep, FakeClock};
use tempfile::TempDir;

fn store() -> (TempDir, CheckpointStore<FakeClock>, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new(50_000);
    let store = CheckpointStore::new(StatePaths::new(dir.path()), clock.clone());
    (dir, store, clock)
}

fn checkpoint(title: &str) -> Checkpoint {
    Checkpoint::new("T1", title)
}

#[test]
fn versions_increase_monotonically() {
    let (_dir, store, clock) = store();
    let sid = SessionId::new("S-1");

    let v1 = store.save(&sid, checkpoint("first")).unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(v1.saved_at, 50_000);

    clock.advance(1_000);
    let v2 = store.save(&sid, checkpoint("second")).unwrap();
    assert_eq!(v2.version, 2);

    let latest = store.load(&sid).unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.task_title, "second");
}

#[test]
fn history_is_archived_newest_first() {
    let (_dir, store, _clock) = store();
    let sid = SessionId::new("S-1");
    for i in 1..=4 {
        store.save(&sid, checkpoint(&format!("cp{i}"))).unwrap();
    }
    let history = store.list_history(&sid);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].version, 3);
    assert_eq!(history[2].version, 1);
}

#[test]
fn history_length_tracks_versions_up_to_cap() {
    let (_dir, store, _clock) = store();
    let sid = SessionId::new("S-1");
    for i in 1..=(ARCHIVE_KEEP as u32 + 5) {
        store.save(&sid, checkpoint(&format!("cp{i}"))).unwrap();
    }
    let history = store.list_history(&sid);
    assert_eq!(history.len(), ARCHIVE_KEEP);
    // Newest archived is previous version, oldest ones pruned
    assert_eq!(history[0].version, ARCHIVE_KEEP as u32 + 4);
    assert_eq!(history[ARCHIVE_KEEP - 1].version, 5);
}

#[test]
fn load_missing_session_is_none() {
    let (_dir, store, _clock) = store();
    assert!(store.load(&SessionId::new("S-none")).is_none());
    assert!(store.list_history(&SessionId::new("S-none")).is_empty());
}

#[test]
fn sessions_are_isolated() {
    let (_dir, store, _clock) = store();
    store.save(&SessionId::new("S-1"), checkpoint("one")).unwrap();
    store.save(&SessionId::new("S-2"), checkpoint("two")).unwrap();
    assert_eq!(store.load(&SessionId::new("S-1")).unwrap().task_title, "one");
    assert_eq!(store.load(&SessionId::new("S-2")).unwrap().task_title, "two");
}

#[test]
fn restoration_prompt_includes_progress() {
    let mut cp = checkpoint("implement login");
    cp.version = 3;
    cp.plan_step = 2;
    cp.total_steps = 5;
    cp.completed_steps = vec![CompletedStep {
        step: 1,
        description: "add session model".to_string(),
        result: "done".to_string(),
    }];
    cp.key_decisions = vec!["use argon2".to_string()];
    cp.files_modified = vec!["src/auth.rs".to_string()];
    cp.current_context = "wiring the middleware".to_string();

    let prompt = CheckpointStore::<FakeClock>::build_restoration_prompt(&cp);
    assert!(prompt.contains("Resuming task T1"));
    assert!(prompt.contains("implement login"));
    assert!(prompt.contains("step 2 of 5"));
    assert!(prompt.contains("add session model"));
    assert!(prompt.contains("use argon2"));
    assert!(prompt.contains("`src/auth.rs`"));
    assert!(prompt.contains("do not redo completed work"));
}
