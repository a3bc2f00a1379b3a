// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escalation scan: decay quiet signals and report the current ladder.
//!
//! Escalation actions themselves fire from the error handler at record
//! time; this scan owns de-escalation.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::Clock;
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;

pub struct EscalationScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for EscalationScan {
    fn name(&self) -> &'static str {
        "escalation"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Judgment
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

        for key in deps.engine.decay(now_ms) {
            results.push(ScanResult::new(
                "de_escalated",
                json!({
                    "kind": key.kind,
                    "session_id": key.session_id.as_ref().map(|s| s.as_str()),
                    "task_id": key.task_id.as_ref().map(|t| t.as_str()),
                }),
            ));
        }

        let active = deps.engine.active();
        if !active.is_empty() {
            let top: Vec<_> = active
                .iter()
                .take(5)
                .map(|(key, level)| {
                    json!({
                        "kind": key.kind,
                        "session_id": key.session_id.as_ref().map(|s| s.as_str()),
                        "count": level.count,
                    })
                })
                .collect();
            results.push(ScanResult::new(
                "active_signals",
                json!({ "total": active.len(), "top": top }),
            ));
        }
        Ok(results)
    }
}
