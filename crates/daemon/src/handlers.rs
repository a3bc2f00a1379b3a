// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus event handlers, one per classification.
//!
//! Delivery is at-least-once, so every handler is idempotent keyed on the
//! event id (the loop also keeps a seen-set for the current run). Handlers
//! return errors as values; the loop converts them to action-log entries.

use crate::escalation::{EscalationAction, SignalKey};
use crate::pm_loop::{LoopDeps, TickError};
use crate::watcher::ClassifiedEvent;
use pilot_adapters::ProcessLauncher;
use pilot_adapters::TaskGateway;
use pilot_core::{
    AutonomyMode, BusEvent, Clock, EventAction, EventType, OvernightStatus, SessionId, TaskId, PM,
};
use pilot_storage::{ActionKind, RegistryError};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Extract the task id from `payload.data.task_id`, falling back to the
/// sender's current claim.
fn task_id_of<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &LoopDeps<G, L, C>,
    event: &BusEvent,
    sender: &SessionId,
) -> Option<TaskId> {
    event
        .data()
        .and_then(|d| d.get("task_id"))
        .and_then(Value::as_str)
        .map(TaskId::new)
        .or_else(|| deps.registry.get(sender).and_then(|s| s.claimed_task_id))
}

fn sender_of(event: &BusEvent) -> SessionId {
    SessionId::new(event.from.clone())
}

pub async fn handle_event<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    now_ms: u64,
    classified: &ClassifiedEvent,
) -> Result<(), TickError> {
    let event = &classified.event;
    match classified.action {
        EventAction::AssignNext => assign_next(deps, now_ms, event).await,
        EventAction::TrackClaim => track_claim(deps, event),
        EventAction::RespondToAgent => respond_to_agent(deps, event),
        EventAction::HandleError => handle_error(deps, now_ms, event),
        EventAction::GreetAgent => greet_agent(deps, event),
        EventAction::CleanupSession => cleanup_session(deps, event),
        EventAction::ReviewMerge => review_merge(deps, event),
        EventAction::TrackProgress => track_progress(deps, event),
        EventAction::ProcessHealth => process_health(deps, event),
        EventAction::LogOnly => log_only(deps, event),
    }
}

/// `task.complete`: auto-review and close, freeing the agent for the next
/// task scan.
async fn assign_next<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    _now_ms: u64,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    let Some(task_id) = task_id_of(deps, event, &sender) else {
        warn!(from = %event.from, "task.complete without a resolvable task id");
        return Ok(());
    };

    deps.state.tasks_auto_reviewed += 1;
    deps.audit.record_action(
        "handler",
        ActionKind::Judgment,
        "auto_review",
        json!({ "task_id": task_id.as_str(), "session": event.from }),
    )?;

    deps.gateway.close(&task_id).await?;
    deps.state.tasks_auto_closed += 1;
    deps.registry.release(&sender)?;

    // Success clears the error ladder for this pairing
    deps.engine.clear(&SignalKey::new(
        "agent.error",
        Some(sender.clone()),
        Some(task_id.clone()),
    ));

    if let Some(mut run) = deps.overnight.active_run() {
        if run.contains(&task_id) {
            run.mark_completed(&task_id);
            deps.overnight.save_run(&run)?;
        }
    }

    info!(task_id = %task_id, "task auto-reviewed and closed");
    Ok(())
}

/// `task.claimed`: mirror the agent's claim into the registry lease.
fn track_claim<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    let Some(task_id) = task_id_of(deps, event, &sender) else {
        return Ok(());
    };
    let lease_ms = deps.cfg.policy.session.lease_secs * 1_000;
    match deps.registry.claim(&sender, &task_id, lease_ms) {
        Ok(()) => {}
        // Someone else already holds it; the agent will observe this and
        // back off. The health scan settles true double-claims.
        Err(RegistryError::ClaimHeld { held_by, .. }) => {
            warn!(task_id = %task_id, held_by = %held_by, claimant = %sender, "claim conflict observed");
        }
        Err(e) => return Err(e.into()),
    }

    if let Some(mut run) = deps.overnight.active_run() {
        if run.contains(&task_id) {
            run.mark_in_progress(&task_id);
            deps.overnight.save_run(&run)?;
        }
    }
    Ok(())
}

/// `agent.question` / `*.help`: under full autonomy the prompt is denied
/// with guidance; otherwise it becomes a human escalation.
fn respond_to_agent<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    if deps.cfg.policy.autonomy.mode == AutonomyMode::Full {
        deps.publish_from_pm(
            EventType::Notify,
            sender.as_str(),
            "pm.guidance",
            json!({
                "action": "autonomy_deny",
                "data": {
                    "message": "Autonomy mode is full: no human is available. \
                        Decide yourself using the task description and plan, \
                        record the decision, and continue.",
                    "in_reply_to": event.id,
                }
            }),
        )?;
        deps.audit.record_action(
            "handler",
            ActionKind::Judgment,
            "autonomy_deny",
            json!({ "session": event.from, "event": event.id }),
        )?;
        return Ok(());
    }

    let task_id = task_id_of(deps, event, &sender);
    deps.audit.record_escalation(
        Some(sender),
        task_id,
        "agent question awaiting human reply",
        event.payload.clone(),
    )?;
    Ok(())
}

/// `agent.error` / `test_failure`: run the escalation ladder and the
/// overnight error budgets.
fn handle_error<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    now_ms: u64,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    let task_id = task_id_of(deps, event, &sender);
    let message = event
        .data()
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .unwrap_or(event.topic.as_str())
        .to_string();

    overnight_failure(deps, now_ms, task_id.as_ref(), &message)?;

    let key = SignalKey::new(event.topic.clone(), Some(sender.clone()), task_id.clone());
    let action = deps.engine.record(key.clone(), now_ms);
    apply_escalation(deps, now_ms, &sender, task_id.as_ref(), action, &message)?;

    deps.audit.record_action(
        "handler",
        ActionKind::Judgment,
        "handle_error",
        json!({
            "session": event.from,
            "task_id": task_id.as_ref().map(|t| t.as_str()),
            "level": deps.engine.level(&key),
            "escalation": action,
        }),
    )?;
    Ok(())
}

/// Book a failure against an active overnight run, stopping the run when a
/// budget is exhausted.
fn overnight_failure<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    now_ms: u64,
    task_id: Option<&TaskId>,
    message: &str,
) -> Result<(), TickError> {
    let Some(task_id) = task_id else {
        return Ok(());
    };
    let Some(mut run) = deps.overnight.active_run() else {
        return Ok(());
    };
    if !run.contains(task_id) {
        return Ok(());
    }

    let tally = deps.overnight.record_failure(task_id, message)?;
    run.total_errors += 1;

    let budget = deps.cfg.policy.overnight.error_budget;
    if tally.count >= budget.max_failures_per_task && !run.tasks_failed.contains(task_id) {
        run.mark_failed(task_id);
        warn!(task_id = %task_id, failures = tally.count, "task exhausted its error budget");
    }
    if run.total_errors >= budget.max_total_failures {
        run.end(OvernightStatus::Stopped, now_ms);
        deps.overnight.save_run(&run)?;
        deps.overnight.write_report(&run)?;
        deps.publish_from_pm(
            EventType::Broadcast,
            "*",
            "overnight.stopped",
            json!({ "data": { "run_id": run.run_id, "total_errors": run.total_errors } }),
        )?;
        warn!(run_id = %run.run_id, "overnight run stopped: total error budget exhausted");
        return Ok(());
    }
    deps.overnight.save_run(&run)?;
    Ok(())
}

/// Execute one escalation decision.
fn apply_escalation<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    _now_ms: u64,
    session: &SessionId,
    task_id: Option<&TaskId>,
    action: EscalationAction,
    message: &str,
) -> Result<(), TickError> {
    match action {
        EscalationAction::Noop => {}
        EscalationAction::Notify => {
            deps.publish_from_pm(
                EventType::Notify,
                session.as_str(),
                "pm.escalation_notice",
                json!({ "data": { "message": message } }),
            )?;
        }
        EscalationAction::Reassign => {
            deps.registry.release(session)?;
            deps.publish_from_pm(
                EventType::Notify,
                session.as_str(),
                "pm.reassigned",
                json!({ "data": { "task_id": task_id.map(|t| t.as_str()), "message": message } }),
            )?;
        }
        EscalationAction::Kill => {
            if let Some(task_id) = task_id {
                if let Some(agent) = deps.spawner.running_for_task(task_id) {
                    deps.spawner.terminate(agent.pid);
                }
            }
            if deps.registry.get(session).is_some() {
                deps.registry.mark_crashed(session, "killed by escalation policy")?;
            }
        }
        EscalationAction::HumanEscalate => {
            deps.audit.record_escalation(
                Some(session.clone()),
                task_id.cloned(),
                message,
                Value::Null,
            )?;
        }
    }
    Ok(())
}

/// `session.start`: welcome the agent so it knows PM is listening.
fn greet_agent<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    deps.publish_from_pm(
        EventType::Response,
        event.from.as_str(),
        "pm.welcome",
        json!({ "data": { "pm_session_id": deps.pm_session_id.as_str() } }),
    )?;
    deps.audit.record_action(
        "handler",
        ActionKind::Mechanical,
        "greet_agent",
        json!({ "session": event.from }),
    )?;
    Ok(())
}

/// `session.end`: finalize the session record and drop its signals.
fn cleanup_session<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    let reason = event
        .data()
        .and_then(|d| d.get("reason"))
        .and_then(Value::as_str)
        .unwrap_or("session ended");
    match deps.registry.end(&sender, reason) {
        Ok(()) | Err(RegistryError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    deps.engine.clear_session(&sender);
    Ok(())
}

/// `merge.request`: auto-review. Gate contents are out of scope; with
/// gates enabled the merge is approved after the (pluggable) checks.
fn review_merge<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    deps.state.tasks_auto_reviewed += 1;
    deps.publish_from_pm(
        EventType::Response,
        event.from.as_str(),
        "merge.approved",
        json!({ "data": { "in_reply_to": event.id } }),
    )?;
    deps.audit.record_action(
        "handler",
        ActionKind::Judgment,
        "review_merge",
        json!({ "session": event.from, "gates_enabled": deps.cfg.policy.quality_gates.enabled }),
    )?;
    Ok(())
}

/// `step.complete`: progress doubles as a heartbeat.
fn track_progress<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    deps.registry.heartbeat(&sender)?;
    deps.audit.record_action(
        "handler",
        ActionKind::Mechanical,
        "track_progress",
        json!({ "session": event.from, "payload": event.payload }),
    )?;
    Ok(())
}

/// `health.report`: recorded for the analytics scan.
fn process_health<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    let sender = sender_of(event);
    deps.registry.heartbeat(&sender)?;
    deps.audit.record_action(
        "handler",
        ActionKind::Mechanical,
        "process_health",
        json!({ "session": event.from, "payload": event.payload }),
    )?;
    Ok(())
}

/// Unknown topics are recorded, not dropped.
fn log_only<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    event: &BusEvent,
) -> Result<(), TickError> {
    // Skip PM's own broadcasts echoing back through the bus
    if event.from == PM {
        return Ok(());
    }
    deps.audit.record_action(
        "handler",
        ActionKind::Mechanical,
        "log_only",
        json!({ "topic": event.topic, "from": event.from }),
    )?;
    Ok(())
}
