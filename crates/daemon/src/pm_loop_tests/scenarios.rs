// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over the fakes.

use super::*;
use pilot_core::{AutonomyMode, OvernightRun, OvernightStatus, TaskId};

#[tokio::test]
async fn idle_daemon_spawns_nothing() {
    let mut rig = Rig::new();
    rig.tick().await;

    assert_eq!(rig.state().tick_count, 1);
    assert_eq!(rig.state().agents_spawned, 0);
    assert_eq!(rig.launcher.launch_count(), 0);

    // PmState persisted each tick
    let persisted = PmStateStore::new(rig.paths.clone()).load();
    assert_eq!(persisted.agents_spawned, 0);
    assert_eq!(persisted.tick_count, 1);
}

#[tokio::test]
async fn ready_task_is_spawned_claimed_completed_and_closed() {
    let mut rig = Rig::new();
    rig.gateway.push_ready(task("T1", "build the thing"));

    // Bootstrap: pending work with no agents → one child spawned
    rig.tick().await;
    assert_eq!(rig.state().agents_spawned, 1);
    assert_eq!(rig.launcher.launch_count(), 1);
    let (_, request, _) = rig.launcher.launched().remove(0);
    assert_eq!(request.task_id, TaskId::new("T1"));
    assert!(request.prompt.contains("build the thing"));
    assert!(request
        .env
        .iter()
        .any(|(k, v)| k == "PILOT_TASK_HINT" && v == "T1"));

    // The child comes up and claims
    let child = rig.agent_session("S-child", SessionRole::General);
    rig.publish(&child, "task.claimed", task_payload("T1"));
    rig.advance(1_000);
    rig.tick().await;
    let session = rig.registry.get(&child).unwrap();
    assert_eq!(session.claimed_task_id, Some(TaskId::new("T1")));

    // The child finishes: auto-review closes the task and frees the agent
    rig.publish(&child, "task.complete", task_payload("T1"));
    rig.advance(1_000);
    rig.tick().await;

    assert_eq!(rig.gateway.closed(), vec![TaskId::new("T1")]);
    assert_eq!(rig.state().tasks_auto_reviewed, 1);
    assert_eq!(rig.state().tasks_auto_closed, 1);
    assert!(rig.registry.get(&child).unwrap().claimed_task_id.is_none());
}

#[tokio::test]
async fn spawn_cooldown_spaces_out_children() {
    let mut rig = Rig::new();
    // Cooldown (15s) longer than the task scan interval (10s) so the
    // middle scan observes the deferral
    rig.pm_loop.deps.spawner = AgentSpawner::new(
        rig.paths.clone(),
        rig.clock.clone(),
        rig.launcher.clone(),
    )
    .with_cooldown(std::time::Duration::from_secs(15));
    rig.gateway.push_ready(task("T1", "one"));
    rig.gateway.push_ready(task("T2", "two"));

    rig.tick().await;
    assert_eq!(rig.launcher.launch_count(), 1, "bootstrap spawns one child");

    rig.advance(10_000);
    rig.tick().await;
    assert_eq!(
        rig.launcher.launch_count(),
        1,
        "cooldown still active at +10s"
    );
    assert!(rig
        .pm_loop
        .deps
        .audit
        .actions()
        .iter()
        .any(|a| a.action == "spawn_deferred_cooldown"));

    rig.advance(10_000);
    rig.tick().await;
    assert_eq!(rig.launcher.launch_count(), 2, "cooldown elapsed at +20s");
}

#[tokio::test]
async fn dead_session_is_cleaned_up_and_task_reassigned() {
    let mut rig = Rig::new();
    let worker = rig.agent_session("S-worker", SessionRole::General);
    rig.registry.claim(&worker, &TaskId::new("T2"), 3_600_000).unwrap();
    rig.gateway.push_ready(task("T2", "stalled work"));

    rig.tick().await;
    assert_eq!(rig.launcher.launch_count(), 0, "claimed task is not rescheduled");

    // Heartbeats stop for longer than the dead threshold (900s default);
    // a second, healthy agent sits idle
    rig.advance(901_000);
    let idle = rig.agent_session("S-idle", SessionRole::General);

    rig.tick().await;

    let crashed = rig.registry.get(&worker).unwrap();
    assert_eq!(crashed.status, pilot_core::SessionStatus::Crashed);
    assert!(crashed.claimed_task_id.is_none());

    // Cleanup was broadcast and the task went to the idle agent
    let cleanups: Vec<_> = rig
        .events_for("S-observer")
        .into_iter()
        .filter(|e| e.topic == "session.cleanup")
        .collect();
    assert_eq!(cleanups.len(), 1);

    let assigns: Vec<_> = rig
        .events_for(idle.as_str())
        .into_iter()
        .filter(|e| e.topic == "task.assign")
        .collect();
    assert_eq!(assigns.len(), 1);
    assert_eq!(
        assigns[0].data().unwrap()["task_id"],
        serde_json::json!("T2")
    );
}

#[tokio::test]
async fn overnight_error_budget_stops_the_run() {
    let mut policy = Policy::default();
    policy.overnight.error_budget.max_total_failures = 5;
    policy.overnight.error_budget.max_failures_per_task = 3;
    let mut rig = Rig::with_policy(policy);

    let run = OvernightRun::new(
        "nightly",
        vec![TaskId::new("T1"), TaskId::new("T2")],
        rig.clock.epoch_ms(),
    );
    let run_id = run.run_id.clone();
    rig.pm_loop.deps.overnight.save_run(&run).unwrap();

    let worker = rig.agent_session("S-worker", SessionRole::General);
    for i in 0..6 {
        let task_id = if i % 2 == 0 { "T1" } else { "T2" };
        rig.publish(&worker, "test_failure", task_payload(task_id));
    }
    rig.tick().await;

    let stopped = rig.pm_loop.deps.overnight.load_run(&run_id).unwrap();
    assert_eq!(stopped.status, OvernightStatus::Stopped);
    assert!(stopped.tasks_failed.contains(&TaskId::new("T1")));

    // Report files exist
    let reports = rig.paths.overnight_reports_dir();
    assert!(reports.join(format!("{run_id}.json")).exists());
    assert!(reports.join(format!("{run_id}.md")).exists());

    // Tasks of the stopped run are never scheduled again
    rig.gateway.push_ready(task("T1", "one"));
    rig.gateway.push_ready(task("T2", "two"));
    let idle = rig.agent_session("S-idle", SessionRole::General);
    rig.advance(60_000);
    rig.tick().await;

    assert_eq!(rig.launcher.launch_count(), 0);
    assert!(rig
        .events_for(idle.as_str())
        .iter()
        .all(|e| e.topic != "task.assign"));
}

#[tokio::test]
async fn full_autonomy_denies_questions_without_human_roundtrip() {
    let mut policy = Policy::default();
    policy.autonomy.mode = AutonomyMode::Full;
    let mut rig = Rig::with_policy(policy);

    let asker = rig.agent_session("S-asker", SessionRole::General);
    rig.publish(
        &asker,
        "agent.question",
        serde_json::json!({ "data": { "question": "which database should I use?" } }),
    );
    rig.tick().await;

    // Guidance went back to the agent
    let guidance: Vec<_> = rig
        .events_for(asker.as_str())
        .into_iter()
        .filter(|e| e.topic == "pm.guidance")
        .collect();
    assert_eq!(guidance.len(), 1);
    assert!(guidance[0].data().unwrap()["message"]
        .as_str()
        .unwrap()
        .contains("no human"));

    // No human escalation was recorded
    assert!(rig.pm_loop.deps.audit.escalations().is_empty());
}

#[tokio::test]
async fn supervised_questions_become_human_escalations() {
    let mut rig = Rig::new();
    let asker = rig.agent_session("S-asker", SessionRole::General);
    rig.publish(&asker, "agent.question", serde_json::json!({}));
    rig.tick().await;

    let escalations = rig.pm_loop.deps.audit.escalations();
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0].reason.contains("question"));
}

#[tokio::test]
async fn event_cap_defers_excess_to_next_tick() {
    let mut rig = Rig::new();
    let chatty = rig.agent_session("S-chatty", SessionRole::General);
    for i in 0..(MAX_ACTIONS_PER_CYCLE + 5) {
        rig.publish(&chatty, &format!("misc.topic.{i}"), serde_json::Value::Null);
    }

    rig.tick().await;
    assert_eq!(rig.state().events_processed, MAX_ACTIONS_PER_CYCLE as u64);
    let throttled = rig
        .pm_loop
        .deps
        .audit
        .actions()
        .into_iter()
        .any(|a| a.action == "throttled");
    assert!(throttled);

    rig.tick().await;
    assert_eq!(
        rig.state().events_processed,
        (MAX_ACTIONS_PER_CYCLE + 5) as u64
    );
}

#[tokio::test]
async fn duplicate_event_ids_are_handled_once() {
    let mut rig = Rig::new();
    let sender = rig.agent_session("S-dup", SessionRole::General);
    let event = BusEvent::new(
        rig.clock.epoch_ms(),
        EventType::Notify,
        sender.as_str(),
        pilot_core::PM,
        "task.complete",
        task_payload("T9"),
    );
    rig.bus.publish(&event).unwrap();
    rig.bus.publish(&event).unwrap();

    rig.tick().await;
    assert_eq!(rig.gateway.closed(), vec![TaskId::new("T9")]);
    assert_eq!(rig.state().tasks_auto_closed, 1);
    assert_eq!(rig.state().events_processed, 1);
}

#[tokio::test]
async fn gateway_failure_is_contained_in_the_tick() {
    let mut rig = Rig::new();
    rig.gateway.fail_next("store offline");
    rig.tick().await;

    assert!(rig.state().errors > 0);
    assert!(rig.state().last_error.as_deref().unwrap().contains("store offline"));
    assert_eq!(rig.state().tick_count, 1, "tick completed despite the error");

    // Next tick recovers
    rig.advance(60_000);
    rig.gateway.push_ready(task("T1", "later"));
    rig.tick().await;
    assert_eq!(rig.launcher.launch_count(), 1);
}

#[tokio::test]
async fn dry_run_plans_but_never_spawns() {
    let mut rig = Rig::new();
    rig.pm_loop.deps.cfg.dry_run = true;
    rig.gateway.push_ready(task("T1", "one"));
    rig.tick().await;

    assert_eq!(rig.launcher.launch_count(), 0);
    assert_eq!(rig.state().agents_spawned, 0);
    assert!(rig
        .pm_loop
        .deps
        .audit
        .actions()
        .iter()
        .any(|a| a.action == "spawn_dry_run"));
}

#[tokio::test]
async fn concurrency_cap_reserves_a_slot_for_pm() {
    let mut rig = Rig::new();
    rig.pm_loop.deps.cfg.max_agents = 3; // cap of 2 agents
    rig.agent_session("S-a", SessionRole::General);
    rig.agent_session("S-b", SessionRole::General);
    // Both busy so the scheduler cannot just assign to them
    rig.registry.claim(&SessionId::new("S-a"), &TaskId::new("X1"), 3_600_000).unwrap();
    rig.registry.claim(&SessionId::new("S-b"), &TaskId::new("X2"), 3_600_000).unwrap();

    rig.gateway.push_ready(task("T1", "more work"));
    rig.tick().await;

    assert_eq!(rig.launcher.launch_count(), 0);
    assert!(rig
        .pm_loop
        .deps
        .audit
        .actions()
        .iter()
        .any(|a| a.action == "spawn_skipped_at_capacity"));
}
