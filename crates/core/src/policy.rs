// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative policy document (`pilot.toml`).
//!
//! Every section has serde defaults so a missing or partial file yields a
//! working configuration; a present-but-corrupt file is an error (silently
//! running with defaults against an operator's explicit config would be
//! worse than refusing).

use crate::scaling::ScalingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid policy file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyMode {
    /// No human in the loop: user-facing prompts are denied with guidance
    Full,
    /// Questions surface as human escalations
    #[default]
    Supervised,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomyPolicy {
    pub mode: AutonomyMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointPolicy {
    pub pressure_threshold_pct: u8,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            pressure_threshold_pct: 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub max_concurrent_sessions: u32,
    /// Heartbeat silence before a session counts as stale
    pub stale_after_secs: u64,
    /// Heartbeat silence before a session counts as dead
    pub dead_after_secs: u64,
    /// Default task-claim lease
    pub lease_secs: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 4,
            stale_after_secs: 300,
            dead_after_secs: 900,
            lease_secs: 1_800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBudget {
    pub max_failures_per_task: u32,
    pub max_total_failures: u32,
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self {
            max_failures_per_task: 3,
            max_total_failures: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainPolicy {
    pub timeout_min: u64,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self { timeout_min: 30 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OvernightPolicy {
    pub error_budget: ErrorBudget,
    pub drain: DrainPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGatesPolicy {
    pub enabled: bool,
    /// Plan-divergence score above which a drift alert is sent
    pub drift_threshold: f64,
}

impl Default for QualityGatesPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            drift_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostPolicy {
    /// Per-task soft warning threshold
    pub soft_usd: f64,
    /// Per-task hard threshold
    pub hard_usd: f64,
}

impl Default for CostPolicy {
    fn default() -> Self {
        Self {
            soft_usd: 2.0,
            hard_usd: 5.0,
        }
    }
}

/// The whole `pilot.toml` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub autonomy: AutonomyPolicy,
    pub checkpoint: CheckpointPolicy,
    pub session: SessionPolicy,
    pub overnight: OvernightPolicy,
    pub pool_scaling: ScalingPolicy,
    pub quality_gates: QualityGatesPolicy,
    pub cost: CostPolicy,
}

impl Policy {
    /// Load from `pilot.toml` under the project root; missing file → defaults.
    pub fn load(project_root: &Path) -> Result<Self, PolicyError> {
        let path = project_root.join("pilot.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
