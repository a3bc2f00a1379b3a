// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery scan: hand tasks from crashed sessions to a fresh agent with
//! the checkpoint-restoration prompt.

use super::{Scan, ScanResult};
use crate::capsule::ContextCapsule;
use crate::dispatch;
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{plan_assignments, Clock, SessionId, SessionStatus, TaskInfo};
use pilot_storage::{ActionKind, CheckpointStore};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Default)]
pub struct RecoveryScan {
    /// Crashed sessions already redelegated this daemon run
    recovered: HashSet<SessionId>,
}

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for RecoveryScan {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Judgment
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let mut results = Vec::new();
        let claimed = deps.registry.claimed_task_ids(None);
        let excluded = deps.overnight_excluded();

        for session in deps.registry.all_session_states() {
            if session.status != SessionStatus::Crashed || self.recovered.contains(&session.id) {
                continue;
            }
            let Some(checkpoint) = deps.checkpoints.load(&session.id) else {
                continue;
            };
            let task_id = checkpoint.task_id.clone();
            if claimed.contains(&task_id)
                || excluded.contains(&task_id)
                || deps.spawner.running_for_task(&task_id).is_some()
            {
                continue;
            }

            let resume = CheckpointStore::<C>::build_restoration_prompt(&checkpoint);
            let task = TaskInfo::new(task_id.clone(), checkpoint.task_title.clone());
            let prompt = ContextCapsule::for_task(task.clone())
                .with_resume(resume)
                .render();

            let idle = deps.idle_slots(now_ms);
            let plan = plan_assignments(std::slice::from_ref(&task), &idle);
            let delegated = if let Some(assignment) = plan.assignments.first() {
                dispatch::assign_to_session(deps, assignment, &prompt)?;
                Some(assignment.session_id.as_str().to_string())
            } else {
                dispatch::spawn_for_task(deps, &task, &prompt)
                    .await?
                    .map(|pid| format!("pid:{pid}"))
            };

            if let Some(target) = delegated {
                self.recovered.insert(session.id.clone());
                results.push(ScanResult::new(
                    "recovered",
                    json!({
                        "crashed_session": session.id.as_str(),
                        "task_id": task_id.as_str(),
                        "checkpoint_version": checkpoint.version,
                        "delegated_to": target,
                    }),
                ));
            }
        }
        Ok(results)
    }
}
