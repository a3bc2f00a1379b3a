// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Analytics scan: periodic pool snapshot and bottleneck detection,
//! published to the analytics channel.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Clock, EventType};
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;

pub struct AnalyticsScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for AnalyticsScan {
    fn name(&self) -> &'static str {
        "analytics"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Mechanical
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(300)
    }

    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let agents = deps.active_agents();
        let active = agents.len() as u32;
        let idle = agents.iter().filter(|s| !s.claim_is_live(now_ms)).count() as u32;
        let pool = deps.last_pool;

        let mut bottlenecks = Vec::new();
        if pool.pending_ready > 2 * active.max(1) {
            bottlenecks.push(format!(
                "queue backlog: {} ready tasks for {} agents",
                pool.pending_ready, active
            ));
        }
        if active > 0 && idle == 0 && pool.pending_ready > 0 {
            bottlenecks.push("no idle capacity while work is queued".to_string());
        }
        if deps.state.errors > 0 && deps.state.tick_count > 0 {
            let per_hundred = deps.state.errors * 100 / deps.state.tick_count.max(1);
            if per_hundred > 10 {
                bottlenecks.push(format!("elevated error rate: {per_hundred}/100 ticks"));
            }
        }

        let snapshot = json!({
            "data": {
                "ts": now_ms,
                "active_agents": active,
                "idle_agents": idle,
                "pending_ready": pool.pending_ready,
                "agents_spawned": deps.state.agents_spawned,
                "tasks_auto_closed": deps.state.tasks_auto_closed,
                "events_processed": deps.state.events_processed,
                "errors": deps.state.errors,
                "bottlenecks": bottlenecks,
            }
        });
        deps.publish_from_pm(EventType::Broadcast, "*", "analytics.snapshot", snapshot.clone())?;

        Ok(vec![ScanResult::new("snapshot", snapshot)])
    }
}
