// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health scan: stale/dead session cleanup and claim-invariant repair.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Clock, EventType, SessionState, TaskId};
use pilot_storage::ActionKind;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

pub struct HealthScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for HealthScan {
    fn name(&self) -> &'static str {
        "health"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Mechanical
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let stale_ms = deps.cfg.policy.session.stale_after_secs * 1_000;
        let dead_ms = deps.cfg.policy.session.dead_after_secs * 1_000;
        let mut results = Vec::new();

        let sessions = deps.registry.all_session_states();
        for session in &sessions {
            if session.id == deps.pm_session_id {
                continue;
            }
            if session.is_dead(now_ms, dead_ms) {
                let freed_task = session.claimed_task_id.clone();
                deps.registry.mark_crashed(&session.id, "heartbeat lost")?;
                deps.engine.clear_session(&session.id);
                deps.publish_from_pm(
                    EventType::Broadcast,
                    "*",
                    "session.cleanup",
                    json!({
                        "data": {
                            "session_id": session.id.as_str(),
                            "task_id": freed_task.as_ref().map(|t| t.as_str()),
                        }
                    }),
                )?;
                warn!(session = %session.id, "dead session cleaned up");
                results.push(ScanResult::new(
                    "session_crashed",
                    json!({
                        "session_id": session.id.as_str(),
                        "released_task": freed_task.map(|t| t.as_str().to_string()),
                    }),
                ));
            } else if session.is_stale(now_ms, stale_ms) {
                results.push(ScanResult::new(
                    "session_stale",
                    json!({
                        "session_id": session.id.as_str(),
                        "silent_ms": now_ms.saturating_sub(session.heartbeat_at),
                    }),
                ));
            }
        }

        // Invariant repair: two live claims on the same task keeps the
        // oldest, releases the newer.
        let mut by_task: HashMap<TaskId, Vec<&SessionState>> = HashMap::new();
        for session in &sessions {
            if session.claim_is_live(now_ms) {
                if let Some(task) = &session.claimed_task_id {
                    by_task.entry(task.clone()).or_default().push(session);
                }
            }
        }
        for (task, mut holders) in by_task {
            if holders.len() < 2 {
                continue;
            }
            holders.sort_by_key(|s| s.claimed_at.unwrap_or(u64::MAX));
            for extra in &holders[1..] {
                deps.registry.release(&extra.id)?;
                results.push(ScanResult::new(
                    "invariant_violation",
                    json!({
                        "task_id": task.as_str(),
                        "kept": holders[0].id.as_str(),
                        "released": extra.id.as_str(),
                    }),
                ));
            }
        }

        Ok(results)
    }
}
