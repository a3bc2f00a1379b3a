// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic scans.
//!
//! Each scan is a value implementing the small [`Scan`] capability; the
//! loop owns the vector and the deadlines. Order in [`default_scans`] is
//! the fixed within-tick order.

pub mod analytics;
pub mod cost;
pub mod drift;
pub mod escalation;
pub mod health;
pub mod overnight;
pub mod pressure;
pub mod progress;
pub mod recovery;
pub mod task;

use crate::pm_loop::{LoopDeps, TickError};
use async_trait::async_trait;
use pilot_adapters::{ProcessLauncher, TaskGateway};
use pilot_core::Clock;
use pilot_storage::ActionKind;
use serde_json::Value;
use std::time::Duration;

/// One action record produced by a scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub action: String,
    pub detail: Value,
}

impl ScanResult {
    pub fn new(action: impl Into<String>, detail: Value) -> Self {
        Self {
            action: action.into(),
            detail,
        }
    }
}

/// A periodic unit of work driven by the loop's deadline check.
#[async_trait]
pub trait Scan<G: TaskGateway, L: ProcessLauncher, C: Clock>: Send {
    fn name(&self) -> &'static str;
    fn kind(&self) -> ActionKind;
    fn interval(&self) -> Duration;
    async fn run(
        &mut self,
        now_ms: u64,
        deps: &mut LoopDeps<G, L, C>,
    ) -> Result<Vec<ScanResult>, TickError>;
}

/// The fixed scan order: health → task → drift → pressure → cost →
/// recovery → escalation → progress → overnight → analytics.
pub fn default_scans<G, L, C>() -> Vec<Box<dyn Scan<G, L, C>>>
where
    G: TaskGateway + 'static,
    L: ProcessLauncher + 'static,
    C: Clock + 'static,
{
    vec![
        Box::new(health::HealthScan),
        Box::new(task::TaskScan),
        Box::new(drift::DriftScan),
        Box::new(pressure::PressureScan),
        Box::new(cost::CostScan::default()),
        Box::new(recovery::RecoveryScan::default()),
        Box::new(escalation::EscalationScan),
        Box::new(progress::ProgressScan),
        Box::new(overnight::OvernightScan),
        Box::new(analytics::AnalyticsScan),
    ]
}
