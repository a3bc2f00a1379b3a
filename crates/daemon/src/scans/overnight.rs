// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overnight scan: error budgets, drain completion, and run termination.

use super::{Scan, ScanResult};
use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::{Clock, EventType, OvernightRun, OvernightStatus};
use pilot_storage::ActionKind;
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub struct OvernightScan;

impl OvernightScan {
    fn finish<G: TaskGateway, L: ProcessLauncher, C: Clock>(
        deps: &mut LoopDeps<G, L, C>,
        mut run: OvernightRun,
        status: OvernightStatus,
        now_ms: u64,
        reason: &str,
    ) -> Result<ScanResult, TickError> {
        run.end(status, now_ms);
        deps.overnight.save_run(&run)?;
        let (json_path, md_path) = deps.overnight.write_report(&run)?;
        let topic = match status {
            OvernightStatus::Completed => "overnight.completed",
            _ => "overnight.stopped",
        };
        deps.publish_from_pm(
            EventType::Broadcast,
            "*",
            topic,
            json!({ "data": { "run_id": run.run_id, "reason": reason } }),
        )?;
        info!(run_id = %run.run_id, reason, "overnight run finished");
        Ok(ScanResult::new(
            "run_finished",
            json!({
                "run_id": run.run_id,
                "status": status,
                "reason": reason,
                "report_json": json_path.display().to_string(),
                "report_md": md_path.display().to_string(),
            }),
        ))
    }
}

#[async_trait]
impl<G: TaskGateway, L: ProcessLauncher, C: Clock> Scan<G, L, C> for OvernightScan {
    fn name(&self) -> &'static str {
        "overnight"
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
        let Some(mut run) = deps.overnight.active_run() else {
            return Ok(Vec::new());
        };
        let mut results = Vec::new();
        let budget = deps.cfg.policy.overnight.error_budget;

        // Per-task budgets may have been exhausted by failures that arrived
        // while the run file was not being watched
        let mut changed = false;
        for task in run.task_ids.clone() {
            if run.tasks_failed.contains(&task) {
                continue;
            }
            let failures = deps.overnight.task_failure_count(&task);
            if failures >= budget.max_failures_per_task {
                run.mark_failed(&task);
                changed = true;
                results.push(ScanResult::new(
                    "task_budget_exhausted",
                    json!({ "task_id": task.as_str(), "failures": failures }),
                ));
            }
        }
        if changed {
            deps.overnight.save_run(&run)?;
        }

        if run.total_errors >= budget.max_total_failures {
            results.push(Self::finish(
                deps,
                run,
                OvernightStatus::Stopped,
                now_ms,
                "total error budget exhausted",
            )?);
            return Ok(results);
        }

        if run.all_tasks_settled() {
            results.push(Self::finish(
                deps,
                run,
                OvernightStatus::Completed,
                now_ms,
                "all tasks settled",
            )?);
            return Ok(results);
        }

        if run.drain_requested {
            let drained = run.tasks_in_progress.is_empty();
            let timed_out = run.drain_requested_at.is_some_and(|at| {
                now_ms.saturating_sub(at)
                    >= deps.cfg.policy.overnight.drain.timeout_min * 60_000
            });
            if drained || timed_out {
                let reason = if drained {
                    "drain complete"
                } else {
                    "drain timeout"
                };
                results.push(Self::finish(
                    deps,
                    run,
                    OvernightStatus::Stopped,
                    now_ms,
                    reason,
                )?);
            }
        }

        Ok(results)
    }
}
