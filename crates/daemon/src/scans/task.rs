// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task scan: ready-task intake, decomposition, batch scheduling, and
//! dispatch.

use super::{Scan, ScanResult};
use crate::capsule::ContextCapsule;
use crate::dispatch;
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{plan_assignments, Clock, Complexity, ScalingAction, TaskInfo};
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;

pub struct TaskScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for TaskScan {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Judgment
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let mut results = Vec::new();

        let ready = deps.gateway.ready().await?;
        let claimed = deps.registry.claimed_task_ids(None);
        let excluded = deps.overnight_excluded();

        let mut candidates: Vec<TaskInfo> = Vec::new();
        for task in ready {
            if claimed.contains(&task.id) || excluded.contains(&task.id) {
                continue;
            }
            if deps.spawner.running_for_task(&task.id).is_some() {
                continue;
            }
            let missing = deps.collab.artifacts.missing_inputs(&task.id);
            if !missing.is_empty() {
                results.push(ScanResult::new(
                    "skipped_missing_inputs",
                    json!({ "task_id": task.id.as_str(), "missing": missing }),
                ));
                continue;
            }
            candidates.push(task);
        }

        // Large tasks get one decomposition attempt before scheduling
        let mut scheduled: Vec<TaskInfo> = Vec::new();
        for task in candidates {
            if task.complexity() == Complexity::L {
                match deps.collab.decomposer.decompose(&task) {
                    Some(subtasks) => {
                        results.push(ScanResult::new(
                            "decomposed",
                            json!({ "task_id": task.id.as_str(), "subtasks": subtasks.len() }),
                        ));
                        scheduled.extend(subtasks);
                        continue;
                    }
                    None => {
                        results.push(ScanResult::new(
                            "large_task_undecomposed",
                            json!({ "task_id": task.id.as_str() }),
                        ));
                    }
                }
            }
            scheduled.push(task);
        }

        if scheduled.is_empty() {
            return Ok(results);
        }

        let idle = deps.idle_slots(now_ms);
        let plan = plan_assignments(&scheduled, &idle);

        for assignment in &plan.assignments {
            let prompt = ContextCapsule::for_task(assignment.task.clone()).render();
            dispatch::assign_to_session(deps, assignment, &prompt)?;
            results.push(ScanResult::new(
                "assigned",
                json!({
                    "task_id": assignment.task.id.as_str(),
                    "session": assignment.session_id.as_str(),
                    "score": assignment.score,
                    "rationale": assignment.rationale,
                }),
            ));
        }

        // No idle agent took the front of the queue; spawn one if the
        // autoscaler agrees (the cooldown bounds this to one per window)
        if let Some(first) = plan.unassigned.first() {
            if deps.scaling == ScalingAction::ScaleUp {
                let prompt = ContextCapsule::for_task(first.task.clone()).render();
                let task = first.task.clone();
                if let Some(pid) = dispatch::spawn_for_task(deps, &task, &prompt).await? {
                    results.push(ScanResult::new(
                        "spawned",
                        json!({ "task_id": task.id.as_str(), "pid": pid }),
                    ));
                }
            }
        }
        for unassigned in &plan.unassigned {
            results.push(ScanResult::new(
                "unassigned",
                json!({ "task_id": unassigned.task.id.as_str(), "reason": unassigned.reason }),
            ));
        }

        Ok(results)
    }
}
