// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{FakeClock, PoolSnapshot, ScalingAction};
use serde_json::json;

fn logs() -> (tempfile::TempDir, AuditLogs<FakeClock>) {
    let dir = tempfile::tempdir().unwrap();
    let logs = AuditLogs::new(StatePaths::new(dir.path()), FakeClock::new(7_000));
    (dir, logs)
}

#[test]
fn actions_append_in_order() {
    let (_dir, logs) = logs();
    logs.record_action("health", ActionKind::Mechanical, "cleanup_session", json!({"s": 1}))
        .unwrap();
    logs.record_action("tasks", ActionKind::Judgment, "assign", Value::Null)
        .unwrap();

    let entries = logs.actions();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].source, "health");
    assert_eq!(entries[0].kind, ActionKind::Mechanical);
    assert_eq!(entries[1].action, "assign");
    assert_eq!(entries[1].ts, 7_000);
}

#[test]
fn escalations_roundtrip() {
    let (_dir, logs) = logs();
    logs.record_escalation(
        Some(SessionId::new("S-1")),
        Some(TaskId::new("T1")),
        "repeated test failures",
        json!({"count": 5}),
    )
    .unwrap();

    let escalations = logs.escalations();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].reason, "repeated test failures");
    assert_eq!(escalations[0].task_id, Some(TaskId::new("T1")));
}

#[test]
fn scaling_history_appends() {
    let (_dir, logs) = logs();
    let decision = ScalingDecision {
        ts: 1,
        action: ScalingAction::ScaleUp,
        reason: "bootstrap".to_string(),
        target_count: 1,
        pool: PoolSnapshot::default(),
    };
    logs.record_scaling(&decision).unwrap();
    logs.record_scaling(&decision).unwrap();
    assert_eq!(logs.scaling_history().len(), 2);
}
