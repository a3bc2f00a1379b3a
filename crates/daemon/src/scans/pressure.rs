// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pressure scan: nudge high-pressure agents to checkpoint; PM itself
//! self-checkpoints instead of being nudged.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Checkpoint, Clock, EventType, SessionRole};
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;

pub struct PressureScan;

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for PressureScan {
    fn name(&self) -> &'static str {
        "pressure"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Mechanical
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn run(
        &mut self,
        _now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError> {
        let threshold = deps.cfg.policy.checkpoint.pressure_threshold_pct;
        let mut results = Vec::new();

        for session in deps.registry.active_sessions() {
            if session.role == SessionRole::Pm {
                let state = deps.pressure.load(&session.id);
                if !state.should_nudge(threshold) {
                    continue;
                }
                let mut checkpoint = Checkpoint::new("pm", "PM coordination state");
                checkpoint.current_context =
                    format!("tick {} snapshot before context trim", deps.state.tick_count);
                checkpoint.tool_call_count_at_save = state.tool_call_count;
                checkpoint.output_bytes_at_save = state.estimated_output_bytes;
                let saved = deps.checkpoints.save(&session.id, checkpoint)?;
                deps.pressure.reset(&session.id)?;
                results.push(ScanResult::new(
                    "pm_self_checkpoint",
                    json!({ "version": saved.version, "pct": state.pct_estimate() }),
                ));
                continue;
            }

            let (nudge, state) = deps.pressure.check_and_nudge(&session.id, threshold)?;
            if !nudge {
                continue;
            }
            deps.publish_from_pm(
                EventType::Notify,
                session.id.as_str(),
                "pressure.alert",
                json!({
                    "data": {
                        "pct": state.pct_estimate(),
                        "threshold": threshold,
                        "message": "context pressure is high: save a checkpoint now",
                    }
                }),
            )?;
            results.push(ScanResult::new(
                "pressure_alert",
                json!({ "session_id": session.id.as_str(), "pct": state.pct_estimate() }),
            ));
        }
        Ok(results)
    }
}
