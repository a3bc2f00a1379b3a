// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assignment execution: either an `assign` event to an idle agent, or a
//! fresh child spawned with the capsule prompt.

use crate::env::{DAEMON_SPAWNED_VAR, TASK_HINT_VAR};
use crate::pm_loop::{LoopDeps, TickError};
use pilot_adapters::{ProcessLauncher, SpawnError, SpawnRequest, TaskGateway};
use pilot_core::{Assignment, Clock, EventType, TaskInfo};
use pilot_storage::ActionKind;
use serde_json::json;
use tracing::info;

/// Hand a task to an already-idle agent session.
pub fn assign_to_session<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    assignment: &Assignment,
    prompt: &str,
) -> Result<(), TickError> {
    deps.publish_from_pm(
        EventType::Request,
        assignment.session_id.as_str(),
        "task.assign",
        json!({
            "action": "assign",
            "data": {
                "task_id": assignment.task.id.as_str(),
                "title": assignment.task.title,
                "rationale": assignment.rationale,
                "prompt": prompt,
            }
        }),
    )?;
    info!(
        task_id = %assignment.task.id,
        session = %assignment.session_id,
        score = assignment.score,
        "task assigned to idle agent"
    );
    Ok(())
}

/// Spawn a new agent child for a task.
///
/// Returns the pid, or `None` when nothing was spawned: concurrency cap
/// reached, spawn cooldown active, or dry-run. The spawner's cooldown is
/// what bounds spawn storms; hitting it is not an error.
pub async fn spawn_for_task<G: TaskGateway, L: ProcessLauncher, C: Clock>(
    deps: &mut LoopDeps<G, L, C>,
    task: &TaskInfo,
    prompt: &str,
) -> Result<Option<u32>, TickError> {
    // Reserve one slot for PM itself
    let cap = deps.cfg.max_agents.saturating_sub(1);
    let active = deps.active_agents().len() as u32;
    if active >= cap {
        deps.audit.record_action(
            "dispatch",
            ActionKind::Mechanical,
            "spawn_skipped_at_capacity",
            json!({ "task_id": task.id.as_str(), "active": active, "cap": cap }),
        )?;
        return Ok(None);
    }

    if deps.cfg.dry_run {
        deps.audit.record_action(
            "dispatch",
            ActionKind::Judgment,
            "spawn_dry_run",
            json!({ "task_id": task.id.as_str() }),
        )?;
        return Ok(None);
    }

    let role = task.role_hint().unwrap_or_default();
    let request = SpawnRequest {
        task_id: task.id.clone(),
        role,
        prompt: prompt.to_string(),
        program: deps.cfg.agent_program.clone(),
        args: deps.cfg.agent_args.clone(),
        env: vec![
            (DAEMON_SPAWNED_VAR.to_string(), "1".to_string()),
            (TASK_HINT_VAR.to_string(), task.id.as_str().to_string()),
        ],
        cwd: deps.cfg.project_root.clone(),
    };

    match deps.spawner.spawn(request).await {
        Ok(pid) => {
            deps.state.agents_spawned += 1;
            deps.audit.record_action(
                "dispatch",
                ActionKind::Judgment,
                "spawn",
                json!({ "task_id": task.id.as_str(), "pid": pid, "role": role.as_str() }),
            )?;
            Ok(Some(pid))
        }
        Err(SpawnError::Cooldown { remaining_ms }) => {
            deps.audit.record_action(
                "dispatch",
                ActionKind::Mechanical,
                "spawn_deferred_cooldown",
                json!({ "task_id": task.id.as_str(), "remaining_ms": remaining_ms }),
            )?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
