// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cost scan: per-task spend against the soft and hard thresholds.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Clock, EventType, TaskId};
use pilot_storage::ActionKind;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Default)]
pub struct CostScan {
    warned_soft: HashSet<TaskId>,
    warned_hard: HashSet<TaskId>,
}

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for CostScan {
    fn name(&self) -> &'static str {
        "cost"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Mechanical
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let soft = deps.cfg.policy.cost.soft_usd;
        let hard = deps.cfg.policy.cost.hard_usd;
        let mut results = Vec::new();

        for session in deps.active_agents() {
            if !session.claim_is_live(now_ms) {
                continue;
            }
            let Some(task_id) = session.claimed_task_id.clone() else {
                continue;
            };
            let cost = deps.collab.cost.task_cost_usd(&task_id);

            if cost >= hard && self.warned_hard.insert(task_id.clone()) {
                deps.publish_from_pm(
                    EventType::Notify,
                    session.id.as_str(),
                    "cost.exceeded",
                    json!({ "data": { "task_id": task_id.as_str(), "cost_usd": cost, "limit_usd": hard } }),
                )?;
                results.push(ScanResult::new(
                    "cost_exceeded",
                    json!({ "task_id": task_id.as_str(), "cost_usd": cost }),
                ));
            } else if cost >= soft && self.warned_soft.insert(task_id.clone()) {
                deps.publish_from_pm(
                    EventType::Notify,
                    session.id.as_str(),
                    "cost.warning",
                    json!({ "data": { "task_id": task_id.as_str(), "cost_usd": cost, "limit_usd": soft } }),
                )?;
                results.push(ScanResult::new(
                    "cost_warning",
                    json!({ "task_id": task_id.as_str(), "cost_usd": cost }),
                ));
            }
        }
        Ok(results)
    }
}
