// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn at_pct(pct: u64) -> PressureState {
    PressureState {
        estimated_output_bytes: ESTIMATED_CONTEXT_BYTES * pct / 100,
        ..Default::default()
    }
}

#[test]
fn pct_estimate_is_capped() {
    assert_eq!(at_pct(0).pct_estimate(), 0);
    assert_eq!(at_pct(50).pct_estimate(), 50);
    assert_eq!(at_pct(100).pct_estimate(), 100);
    assert_eq!(at_pct(250).pct_estimate(), 100);
}

#[test]
fn no_nudge_below_threshold() {
    assert!(!at_pct(69).should_nudge(70));
    assert!(at_pct(70).should_nudge(70));
}

#[test]
fn renudge_requires_ten_point_climb() {
    let mut state = at_pct(72);
    assert!(state.should_nudge(70));
    state.record_nudge(1_000);
    assert_eq!(state.last_nudge_pct, Some(72));

    // 72 → 79: inside the band, stay quiet
    state.estimated_output_bytes = ESTIMATED_CONTEXT_BYTES * 79 / 100;
    assert!(!state.should_nudge(70));

    // 72 → 82: band crossed
    state.estimated_output_bytes = ESTIMATED_CONTEXT_BYTES * 82 / 100;
    assert!(state.should_nudge(70));
    state.record_nudge(2_000);

    // saturated at 100: one more nudge fires from 82, then silence
    state.estimated_output_bytes = ESTIMATED_CONTEXT_BYTES * 3;
    assert!(state.should_nudge(70));
    state.record_nudge(3_000);
    assert!(!state.should_nudge(70));
}

#[test]
fn nudge_fires_at_most_once_per_band() {
    let mut state = at_pct(75);
    let mut nudges = 0;
    for step in 0..30 {
        state.estimated_output_bytes = ESTIMATED_CONTEXT_BYTES * (75 + step) / 100;
        if state.should_nudge(70) {
            nudges += 1;
            state.record_nudge(step);
        }
    }
    // 75..=104 covers bands at 75, 85, 95 (capped at 100)
    assert_eq!(nudges, 3);
}
