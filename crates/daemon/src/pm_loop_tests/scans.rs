// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-scan behavior through the full tick.

use super::*;
use crate::collab::fakes::{FakeArtifacts, FakeCost, FakeDrift};
use pilot_core::{Checkpoint, SessionStatus, TaskId, ESTIMATED_CONTEXT_BYTES};
use pilot_storage::write_json_atomic;

#[tokio::test]
async fn pressure_scan_nudges_once_per_band() {
    let mut rig = Rig::new();
    let worker = rig.agent_session("S-worker", SessionRole::General);
    rig.pm_loop
        .deps
        .pressure
        .record_tool_call(&worker, ESTIMATED_CONTEXT_BYTES * 75 / 100)
        .unwrap();

    rig.tick().await;
    let alerts = |rig: &Rig| {
        rig.events_for("S-worker")
            .into_iter()
            .filter(|e| e.topic == "pressure.alert")
            .count()
    };
    assert_eq!(alerts(&rig), 1);

    // Unchanged pressure one scan later: silent
    rig.advance(60_000);
    rig.tick().await;
    assert_eq!(alerts(&rig), 1);

    // Ten more points: a second nudge
    rig.pm_loop
        .deps
        .pressure
        .record_tool_call(&worker, ESTIMATED_CONTEXT_BYTES * 10 / 100)
        .unwrap();
    rig.advance(60_000);
    rig.tick().await;
    assert_eq!(alerts(&rig), 2);
}

#[tokio::test]
async fn pm_pressure_becomes_a_self_checkpoint() {
    let mut rig = Rig::new();
    let pm = rig.pm_session_id.clone();
    rig.pm_loop
        .deps
        .pressure
        .record_tool_call(&pm, ESTIMATED_CONTEXT_BYTES)
        .unwrap();

    rig.tick().await;

    let checkpoint = rig.pm_loop.deps.checkpoints.load(&pm).unwrap();
    assert_eq!(checkpoint.version, 1);
    assert_eq!(checkpoint.task_id, TaskId::new("pm"));

    // Pressure reset after the save
    let state = rig.pm_loop.deps.pressure.load(&pm);
    assert_eq!(state.estimated_output_bytes, 0);
}

#[tokio::test]
async fn drift_above_threshold_alerts_the_agent() {
    let mut rig = Rig::new();
    let drift = FakeDrift::default();
    rig.pm_loop.deps.collab.drift = Box::new(drift.clone());

    let worker = rig.agent_session("S-worker", SessionRole::General);
    rig.registry
        .claim(&worker, &TaskId::new("T1"), 3_600_000)
        .unwrap();
    drift.set(TaskId::new("T1"), 0.8);

    rig.tick().await;

    let alerts: Vec<_> = rig
        .events_for(worker.as_str())
        .into_iter()
        .filter(|e| e.topic == "drift.alert")
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].data().unwrap()["task_id"], serde_json::json!("T1"));
}

#[tokio::test]
async fn cost_thresholds_warn_then_exceed() {
    let mut rig = Rig::new();
    let cost = FakeCost::default();
    rig.pm_loop.deps.collab.cost = Box::new(cost.clone());

    let worker = rig.agent_session("S-worker", SessionRole::General);
    rig.registry
        .claim(&worker, &TaskId::new("T1"), 36_000_000)
        .unwrap();

    cost.set(TaskId::new("T1"), 2.5); // above soft (2.0), below hard (5.0)
    rig.tick().await;

    rig.advance(60_000);
    cost.set(TaskId::new("T1"), 6.0);
    rig.tick().await;

    // One more scan: both warnings already delivered, nothing new
    rig.advance(60_000);
    rig.tick().await;

    let topics: Vec<String> = rig
        .events_for(worker.as_str())
        .into_iter()
        .filter(|e| e.topic.starts_with("cost."))
        .map(|e| e.topic)
        .collect();
    assert_eq!(topics, vec!["cost.warning", "cost.exceeded"]);
}

#[tokio::test]
async fn recovery_scan_respawns_from_checkpoint() {
    let mut rig = Rig::new();
    let crashed = rig.agent_session("S-crashed", SessionRole::General);
    let mut checkpoint = Checkpoint::new("T7", "half-finished refactor");
    checkpoint.plan_step = 3;
    checkpoint.total_steps = 5;
    rig.pm_loop
        .deps
        .checkpoints
        .save(&crashed, checkpoint)
        .unwrap();
    rig.registry.mark_crashed(&crashed, "oom").unwrap();

    rig.tick().await;

    // No idle agent: a fresh child is spawned with the restoration prompt
    assert_eq!(rig.launcher.launch_count(), 1);
    let (_, request, _) = rig.launcher.launched().remove(0);
    assert_eq!(request.task_id, TaskId::new("T7"));
    assert!(request.prompt.contains("Resuming task T7"));
    assert!(request.prompt.contains("step 3"));

    // The same crashed session is not redelegated next scan
    rig.advance(30_000);
    rig.tick().await;
    assert_eq!(rig.launcher.launch_count(), 1);
}

#[tokio::test]
async fn recovery_prefers_idle_agents() {
    let mut rig = Rig::new();
    let crashed = rig.agent_session("S-crashed", SessionRole::General);
    rig.pm_loop
        .deps
        .checkpoints
        .save(&crashed, Checkpoint::new("T7", "interrupted"))
        .unwrap();
    rig.registry.mark_crashed(&crashed, "oom").unwrap();
    let idle = rig.agent_session("S-idle", SessionRole::General);

    rig.tick().await;

    assert_eq!(rig.launcher.launch_count(), 0);
    let assigns: Vec<_> = rig
        .events_for(idle.as_str())
        .into_iter()
        .filter(|e| e.topic == "task.assign")
        .collect();
    assert_eq!(assigns.len(), 1);
    assert!(assigns[0].data().unwrap()["prompt"]
        .as_str()
        .unwrap()
        .contains("Resuming task T7"));
}

#[tokio::test]
async fn progress_scan_flags_missing_inputs() {
    let mut rig = Rig::new();
    let artifacts = FakeArtifacts::default();
    rig.pm_loop.deps.collab.artifacts = Box::new(artifacts.clone());

    let worker = rig.agent_session("S-worker", SessionRole::General);
    rig.registry
        .claim(&worker, &TaskId::new("T1"), 3_600_000)
        .unwrap();
    artifacts.set_missing(TaskId::new("T1"), vec!["api-schema.json".to_string()]);

    rig.tick().await;

    let blocked: Vec<_> = rig
        .events_for(worker.as_str())
        .into_iter()
        .filter(|e| e.topic == "task.blocked")
        .collect();
    assert_eq!(blocked.len(), 1);
    assert_eq!(
        blocked[0].data().unwrap()["missing_inputs"],
        serde_json::json!(["api-schema.json"])
    );
}

#[tokio::test]
async fn task_scan_skips_tasks_missing_inputs() {
    let mut rig = Rig::new();
    let artifacts = FakeArtifacts::default();
    rig.pm_loop.deps.collab.artifacts = Box::new(artifacts.clone());
    artifacts.set_missing(TaskId::new("T1"), vec!["dataset.csv".to_string()]);
    rig.gateway.push_ready(task("T1", "needs data"));

    rig.tick().await;
    assert_eq!(rig.launcher.launch_count(), 0);
    assert!(rig
        .pm_loop
        .deps
        .audit
        .actions()
        .iter()
        .any(|a| a.action == "skipped_missing_inputs"));
}

#[tokio::test]
async fn health_scan_repairs_double_claims() {
    let mut rig = Rig::new();
    let older = rig.agent_session("S-older", SessionRole::General);
    let newer = rig.agent_session("S-newer", SessionRole::General);

    // Forge overlapping live claims directly in the session files, as if
    // two processes raced past the registry guard
    for (id, claimed_at) in [(&older, 1_000), (&newer, 2_000)] {
        let mut state = rig.registry.get(id).unwrap();
        state.claimed_task_id = Some(TaskId::new("T1"));
        state.claimed_at = Some(claimed_at);
        state.lease_expires_at = Some(rig.clock.epoch_ms() + 3_600_000);
        write_json_atomic(&rig.paths.session_file(id), &state).unwrap();
    }

    rig.tick().await;

    assert_eq!(
        rig.registry.get(&older).unwrap().claimed_task_id,
        Some(TaskId::new("T1")),
        "oldest claim survives"
    );
    assert!(rig.registry.get(&newer).unwrap().claimed_task_id.is_none());
    assert!(rig
        .pm_loop
        .deps
        .audit
        .actions()
        .iter()
        .any(|a| a.action == "invariant_violation"));
}

#[tokio::test]
async fn analytics_scan_publishes_a_snapshot() {
    let mut rig = Rig::new();
    rig.agent_session("S-worker", SessionRole::General);
    rig.tick().await;

    let snapshots: Vec<_> = rig
        .events_for("S-analytics-reader")
        .into_iter()
        .filter(|e| e.topic == "analytics.snapshot")
        .collect();
    assert_eq!(snapshots.len(), 1);
    let data = snapshots[0].data().unwrap();
    assert_eq!(data["active_agents"], serde_json::json!(1));
}

#[tokio::test]
async fn escalation_ladder_reassigns_then_kills() {
    let mut rig = Rig::new();
    let worker = rig.agent_session("S-worker", SessionRole::General);
    rig.registry
        .claim(&worker, &TaskId::new("T1"), 36_000_000)
        .unwrap();

    // Three errors: notify, notify, reassign (claim released)
    for _ in 0..3 {
        rig.publish(&worker, "agent.error", task_payload("T1"));
    }
    rig.tick().await;
    assert!(rig.registry.get(&worker).unwrap().claimed_task_id.is_none());

    // Fourth error: kill → session marked crashed
    rig.publish(&worker, "agent.error", task_payload("T1"));
    rig.advance(1_000);
    rig.tick().await;
    assert_eq!(
        rig.registry.get(&worker).unwrap().status,
        SessionStatus::Crashed
    );

    // Fifth: human escalation
    rig.publish(&worker, "agent.error", task_payload("T1"));
    rig.advance(1_000);
    rig.tick().await;
    assert_eq!(rig.pm_loop.deps.audit.escalations().len(), 1);
}
