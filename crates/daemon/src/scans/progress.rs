// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress scan: flag claimed tasks blocked on missing declared inputs.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Clock, EventType};
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;

pub struct ProgressScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for ProgressScan {
    fn name(&self) -> &'static str {
        "progress"
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
        let mut results = Vec::new();
        for session in deps.active_agents() {
            if !session.claim_is_live(now_ms) {
                continue;
            }
            let Some(task_id) = &session.claimed_task_id else {
                continue;
            };
            let missing = deps.collab.artifacts.missing_inputs(task_id);
            if missing.is_empty() {
                continue;
            }
            deps.publish_from_pm(
                EventType::Notify,
                session.id.as_str(),
                "task.blocked",
                json!({ "data": { "task_id": task_id.as_str(), "missing_inputs": missing } }),
            )?;
            results.push(ScanResult::new(
                "task_blocked",
                json!({
                    "session_id": session.id.as_str(),
                    "task_id": task_id.as_str(),
                    "missing": deps.collab.artifacts.missing_inputs(task_id),
                }),
            ));
        }
        Ok(results)
    }
}
