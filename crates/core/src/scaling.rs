// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool autoscaling: a pure decision function over queue and resource state.
//!
//! The loop calls [`evaluate_scaling`] each evaluation interval and appends
//! every decision to the scaling-history log for audit.

use serde::{Deserialize, Serialize};

/// Observed pool state at decision time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Active non-PM agent sessions
    pub active: u32,
    /// Active agents without a live claim
    pub idle: u32,
    /// Ready, unclaimed, unblocked tasks
    pub pending_ready: u32,
    pub budget_remaining_pct: u8,
    pub cpu_pct: u8,
    pub mem_pct: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleUpPolicy {
    /// Scale up when pending / active reaches this ratio
    pub queue_ratio: f64,
    /// Keep this many idle agents around when high-priority work is queued
    pub priority_idle_threshold: u32,
    /// Horizon for deadline-driven scale-up decisions
    pub deadline_hours: u64,
}

impl Default for ScaleUpPolicy {
    fn default() -> Self {
        Self {
            queue_ratio: 2.0,
            priority_idle_threshold: 1,
            deadline_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleDownPolicy {
    pub idle_cooldown_minutes: u64,
    pub budget_threshold_pct: u8,
    pub cpu_threshold_pct: u8,
    pub memory_threshold_pct: u8,
}

impl Default for ScaleDownPolicy {
    fn default() -> Self {
        Self {
            idle_cooldown_minutes: 10,
            budget_threshold_pct: 10,
            cpu_threshold_pct: 90,
            memory_threshold_pct: 90,
        }
    }
}

/// The `pool_scaling` policy section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPolicy {
    pub min: u32,
    pub max: u32,
    pub scale_up: ScaleUpPolicy,
    pub scale_down: ScaleDownPolicy,
    pub evaluation_interval_seconds: u64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            min: 0,
            max: 4,
            scale_up: ScaleUpPolicy::default(),
            scale_down: ScaleDownPolicy::default(),
            evaluation_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    Hold,
}

/// Audit record appended to the scaling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub ts: u64,
    pub action: ScalingAction,
    pub reason: String,
    pub target_count: u32,
    pub pool: PoolSnapshot,
}

/// Carried between evaluations for the idle-cooldown rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pending_at: Option<u64>,
}

/// Decide whether to scale the pool up, down, or hold.
///
/// Rules are evaluated in order; the first match wins, so exactly one action
/// results for any input. `target_count` is always within `[min, max]`.
pub fn evaluate_scaling(
    now_ms: u64,
    pool: PoolSnapshot,
    policy: &ScalingPolicy,
    state: &mut ScalerState,
) -> ScalingDecision {
    if pool.pending_ready > 0 {
        state.last_pending_at = Some(now_ms);
    }

    // Tolerate a policy with min > max rather than panicking on clamp
    let hi = policy.max.max(policy.min);
    let clamp = |n: u32| n.clamp(policy.min, hi);
    let one_less = clamp(pool.active.saturating_sub(1));
    let one_more = clamp(pool.active.saturating_add(1));
    let decide = |action, reason: String, target| ScalingDecision {
        ts: now_ms,
        action,
        reason,
        target_count: target,
        pool,
    };

    // 1. Bootstrap: work is waiting and nobody is running
    if pool.pending_ready > 0 && pool.active == 0 {
        return decide(
            ScalingAction::ScaleUp,
            "bootstrap: pending work with no active agents".to_string(),
            clamp(1),
        );
    }

    // 2. Budget floor
    if pool.budget_remaining_pct <= policy.scale_down.budget_threshold_pct {
        return decide(
            ScalingAction::ScaleDown,
            format!(
                "budget remaining {}% at or below threshold {}%",
                pool.budget_remaining_pct, policy.scale_down.budget_threshold_pct
            ),
            one_less,
        );
    }

    // 3. Resource ceilings
    if pool.cpu_pct >= policy.scale_down.cpu_threshold_pct
        || pool.mem_pct >= policy.scale_down.memory_threshold_pct
    {
        return decide(
            ScalingAction::ScaleDown,
            format!(
                "resource pressure: cpu {}%, mem {}%",
                pool.cpu_pct, pool.mem_pct
            ),
            one_less,
        );
    }

    // 4. Bounded at capacity
    if pool.active >= policy.max {
        return decide(
            ScalingAction::Hold,
            format!("at max capacity ({})", policy.max),
            clamp(pool.active),
        );
    }

    // 5. Queue pressure
    let ratio = f64::from(pool.pending_ready) / f64::from(pool.active.max(1));
    if ratio >= policy.scale_up.queue_ratio || (pool.pending_ready > 0 && pool.idle == 0) {
        return decide(
            ScalingAction::ScaleUp,
            format!(
                "queue pressure: {} pending / {} active",
                pool.pending_ready, pool.active
            ),
            one_more,
        );
    }

    // 6. Idle cooldown elapsed
    if pool.pending_ready == 0 {
        let cooldown_ms = policy.scale_down.idle_cooldown_minutes * 60_000;
        let cooled = match state.last_pending_at {
            Some(at) => now_ms.saturating_sub(at) >= cooldown_ms,
            None => true,
        };
        if cooled && pool.active > policy.min {
            return decide(
                ScalingAction::ScaleDown,
                format!(
                    "idle for {}+ minutes",
                    policy.scale_down.idle_cooldown_minutes
                ),
                one_less,
            );
        }
    }

    // 7. Nothing to do
    decide(
        ScalingAction::Hold,
        "steady state".to_string(),
        clamp(pool.active),
    )
}

#[cfg(test)]
#[path = "scaling_tests.rs"]
mod tests;
