// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{FakeClock, ESTIMATED_CONTEXT_BYTES};
use tempfile::TempDir;

fn tracker() -> (TempDir, PressureTracker<FakeClock>) {
    let dir = tempfile::tempdir().unwrap();
    let tracker = PressureTracker::new(StatePaths::new(dir.path()), FakeClock::new(1_000));
    (dir, tracker)
}

#[test]
fn records_accumulate() {
    let (_dir, tracker) = tracker();
    let sid = SessionId::new("S-1");
    tracker.record_tool_call(&sid, 100).unwrap();
    let state = tracker.record_tool_call(&sid, 400).unwrap();
    assert_eq!(state.tool_call_count, 2);
    assert_eq!(state.estimated_output_bytes, 500);
    // Persisted
    assert_eq!(tracker.load(&sid), state);
}

#[test]
fn nudge_fires_once_per_band() {
    let (_dir, tracker) = tracker();
    let sid = SessionId::new("S-1");
    tracker
        .record_tool_call(&sid, ESTIMATED_CONTEXT_BYTES * 75 / 100)
        .unwrap();

    let (nudge, state) = tracker.check_and_nudge(&sid, 70).unwrap();
    assert!(nudge);
    assert_eq!(state.last_nudge_pct, Some(75));
    assert_eq!(state.last_nudge_at, Some(1_000));

    // Same pressure: silent
    let (nudge, _) = tracker.check_and_nudge(&sid, 70).unwrap();
    assert!(!nudge);

    // +5 points: still inside the band
    tracker
        .record_tool_call(&sid, ESTIMATED_CONTEXT_BYTES * 5 / 100)
        .unwrap();
    let (nudge, _) = tracker.check_and_nudge(&sid, 70).unwrap();
    assert!(!nudge);

    // +10 from last nudge: fires again
    tracker
        .record_tool_call(&sid, ESTIMATED_CONTEXT_BYTES * 5 / 100)
        .unwrap();
    let (nudge, state) = tracker.check_and_nudge(&sid, 70).unwrap();
    assert!(nudge);
    assert_eq!(state.last_nudge_pct, Some(85));
}

#[test]
fn reset_clears_counters_after_checkpoint() {
    let (_dir, tracker) = tracker();
    let sid = SessionId::new("S-1");
    tracker
        .record_tool_call(&sid, ESTIMATED_CONTEXT_BYTES)
        .unwrap();
    tracker.check_and_nudge(&sid, 70).unwrap();

    tracker.reset(&sid).unwrap();
    let state = tracker.load(&sid);
    assert_eq!(state, PressureState::default());
    let (nudge, _) = tracker.check_and_nudge(&sid, 70).unwrap();
    assert!(!nudge);
}

#[test]
fn unknown_session_loads_default() {
    let (_dir, tracker) = tracker();
    assert_eq!(tracker.load(&SessionId::new("S-none")), PressureState::default());
}
