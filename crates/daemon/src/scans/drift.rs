// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drift scan: compare each claimed task's file activity against the
//! approved plan via the injected drift detector.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Clock, EventType};
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;

pub struct DriftScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for DriftScan {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Judgment
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(120)
    }

    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let threshold = deps.cfg.policy.quality_gates.drift_threshold;
        let mut results = Vec::new();

        for session in deps.active_agents() {
            if !session.claim_is_live(now_ms) {
                continue;
            }
            let Some(task_id) = &session.claimed_task_id else {
                continue;
            };
            let score = deps.collab.drift.score(&session.id, task_id);
            if score <= threshold {
                continue;
            }
            deps.publish_from_pm(
                EventType::Notify,
                session.id.as_str(),
                "drift.alert",
                json!({
                    "data": {
                        "task_id": task_id.as_str(),
                        "score": score,
                        "threshold": threshold,
                    }
                }),
            )?;
            results.push(ScanResult::new(
                "drift_alert",
                json!({
                    "session_id": session.id.as_str(),
                    "task_id": task_id.as_str(),
                    "score": score,
                }),
            ));
        }
        Ok(results)
    }
}
