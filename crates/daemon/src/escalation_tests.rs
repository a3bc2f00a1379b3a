// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn key(task: &str) -> SignalKey {
    SignalKey::new(
        "agent.error",
        Some(SessionId::new("S-1")),
        Some(TaskId::new(task)),
    )
}

#[test]
fn levels_escalate_in_order() {
    let mut engine = PolicyEngine::default();
    let k = key("T1");
    assert_eq!(engine.record(k.clone(), 0), EscalationAction::Notify);
    assert_eq!(engine.record(k.clone(), 1), EscalationAction::Notify);
    assert_eq!(engine.record(k.clone(), 2), EscalationAction::Reassign);
    assert_eq!(engine.record(k.clone(), 3), EscalationAction::Kill);
    assert_eq!(engine.record(k.clone(), 4), EscalationAction::HumanEscalate);
    assert_eq!(engine.record(k.clone(), 5), EscalationAction::HumanEscalate);
}

#[test]
fn distinct_signals_do_not_interfere() {
    let mut engine = PolicyEngine::default();
    engine.record(key("T1"), 0);
    engine.record(key("T1"), 0);
    assert_eq!(engine.record(key("T2"), 0), EscalationAction::Notify);
    assert_eq!(engine.level(&key("T1")), 2);
    assert_eq!(engine.level(&key("T2")), 1);
}

#[test]
fn clear_resets_the_ladder() {
    let mut engine = PolicyEngine::default();
    for _ in 0..4 {
        engine.record(key("T1"), 0);
    }
    engine.clear(&key("T1"));
    assert_eq!(engine.level(&key("T1")), 0);
    assert_eq!(engine.record(key("T1"), 0), EscalationAction::Notify);
}

#[test]
fn decay_steps_down_and_clears() {
    let mut engine = PolicyEngine::new(Duration::from_secs(60));
    engine.record(key("T1"), 0);
    engine.record(key("T1"), 1_000);

    // Quiet for under the decay window: untouched
    assert!(engine.decay(30_000).is_empty());
    assert_eq!(engine.level(&key("T1")), 2);

    // One decay step
    assert!(engine.decay(61_000).is_empty());
    assert_eq!(engine.level(&key("T1")), 1);

    // Next step clears it
    let cleared = engine.decay(122_000);
    assert_eq!(cleared, vec![key("T1")]);
    assert_eq!(engine.level(&key("T1")), 0);
}

#[test]
fn fresh_signal_resets_decay_timer() {
    let mut engine = PolicyEngine::new(Duration::from_secs(60));
    engine.record(key("T1"), 0);
    engine.record(key("T1"), 59_000);
    assert!(engine.decay(60_000).is_empty());
    assert_eq!(engine.level(&key("T1")), 2, "recent activity blocks decay");
}

#[test]
fn failure_count_sums_per_session() {
    let mut engine = PolicyEngine::default();
    engine.record(key("T1"), 0);
    engine.record(key("T1"), 0);
    engine.record(key("T2"), 0);
    engine.record(
        SignalKey::new("agent.error", Some(SessionId::new("S-other")), None),
        0,
    );
    assert_eq!(engine.failure_count(&SessionId::new("S-1")), 3);
    assert_eq!(engine.failure_count(&SessionId::new("S-other")), 1);

    engine.clear_session(&SessionId::new("S-1"));
    assert_eq!(engine.failure_count(&SessionId::new("S-1")), 0);
}
