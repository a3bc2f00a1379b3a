// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator interfaces injected into the scan loop.
//!
//! Drift scoring, cost tracking, artifact bookkeeping, task decomposition,
//! and host metrics are pluggable modules; the loop depends only on these
//! seams. Defaults are inert so the core runs without any of them wired.

use pilot_core::{SessionId, TaskId, TaskInfo};

/// Scores how far a session's work has diverged from its approved plan.
pub trait DriftDetector: Send + Sync {
    /// 0.0 = on plan, 1.0 = unrecognisable.
    fn score(&self, session: &SessionId, task: &TaskId) -> f64;
}

/// Tracks per-task and total spend.
pub trait CostTracker: Send + Sync {
    fn task_cost_usd(&self, task: &TaskId) -> f64;
    fn total_cost_usd(&self) -> f64;
}

/// Knows which declared inputs a task is still missing.
pub trait ArtifactRegistry: Send + Sync {
    fn missing_inputs(&self, task: &TaskId) -> Vec<String>;
}

/// Splits a large task into subtasks, when it knows how.
pub trait TaskDecomposer: Send + Sync {
    fn decompose(&self, task: &TaskInfo) -> Option<Vec<TaskInfo>>;
}

/// Host resource usage for the autoscaler.
pub trait HostMetrics: Send + Sync {
    fn cpu_pct(&self) -> u8;
    fn mem_pct(&self) -> u8;
}

struct NoDrift;
impl DriftDetector for NoDrift {
    fn score(&self, _session: &SessionId, _task: &TaskId) -> f64 {
        0.0
    }
}

struct NoCost;
impl CostTracker for NoCost {
    fn task_cost_usd(&self, _task: &TaskId) -> f64 {
        0.0
    }
    fn total_cost_usd(&self) -> f64 {
        0.0
    }
}

struct NoArtifacts;
impl ArtifactRegistry for NoArtifacts {
    fn missing_inputs(&self, _task: &TaskId) -> Vec<String> {
        Vec::new()
    }
}

struct NoDecompose;
impl TaskDecomposer for NoDecompose {
    fn decompose(&self, _task: &TaskInfo) -> Option<Vec<TaskInfo>> {
        None
    }
}

struct NoHostMetrics;
impl HostMetrics for NoHostMetrics {
    fn cpu_pct(&self) -> u8 {
        0
    }
    fn mem_pct(&self) -> u8 {
        0
    }
}

/// The injected capability set.
pub struct Collaborators {
    pub drift: Box<dyn DriftDetector>,
    pub cost: Box<dyn CostTracker>,
    pub artifacts: Box<dyn ArtifactRegistry>,
    pub decomposer: Box<dyn TaskDecomposer>,
    pub host: Box<dyn HostMetrics>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            drift: Box::new(NoDrift),
            cost: Box::new(NoCost),
            artifacts: Box::new(NoArtifacts),
            decomposer: Box::new(NoDecompose),
            host: Box::new(NoHostMetrics),
        }
    }
}
