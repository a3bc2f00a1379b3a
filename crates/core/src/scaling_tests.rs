// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn policy() -> ScalingPolicy {
    ScalingPolicy {
        min: 0,
        max: 4,
        ..Default::default()
    }
}

fn healthy(active: u32, idle: u32, pending: u32) -> PoolSnapshot {
    PoolSnapshot {
        active,
        idle,
        pending_ready: pending,
        budget_remaining_pct: 100,
        cpu_pct: 10,
        mem_pct: 10,
    }
}

fn eval(pool: PoolSnapshot, state: &mut ScalerState) -> ScalingDecision {
    evaluate_scaling(1_000_000, pool, &policy(), state)
}

#[test]
fn bootstrap_when_pending_and_nobody_active() {
    let d = eval(healthy(0, 0, 1), &mut ScalerState::default());
    assert_eq!(d.action, ScalingAction::ScaleUp);
    assert_eq!(d.target_count, 1);
    assert!(d.reason.contains("bootstrap"));
}

#[test]
fn budget_floor_beats_queue_pressure() {
    let pool = PoolSnapshot {
        budget_remaining_pct: 5,
        ..healthy(2, 0, 10)
    };
    let d = eval(pool, &mut ScalerState::default());
    assert_eq!(d.action, ScalingAction::ScaleDown);
    assert_eq!(d.target_count, 1);
}

#[test]
fn resource_ceiling_scales_down() {
    let pool = PoolSnapshot {
        cpu_pct: 95,
        ..healthy(3, 1, 1)
    };
    let d = eval(pool, &mut ScalerState::default());
    assert_eq!(d.action, ScalingAction::ScaleDown);
    assert_eq!(d.target_count, 2);
}

#[test]
fn hold_at_max_prevents_growth() {
    let d = eval(healthy(4, 0, 20), &mut ScalerState::default());
    assert_eq!(d.action, ScalingAction::Hold);
    assert_eq!(d.target_count, 4);
}

#[test]
fn queue_ratio_scales_up() {
    let d = eval(healthy(2, 1, 4), &mut ScalerState::default());
    assert_eq!(d.action, ScalingAction::ScaleUp);
    assert_eq!(d.target_count, 3);
}

#[test]
fn pending_with_no_idle_scales_up() {
    // Below the queue ratio but every agent is busy
    let d = eval(healthy(2, 0, 1), &mut ScalerState::default());
    assert_eq!(d.action, ScalingAction::ScaleUp);
}

#[test]
fn cooldown_prevents_scale_down_after_recent_pending() {
    let mut state = ScalerState::default();
    // Pending seen now
    let d = evaluate_scaling(1_000_000, healthy(1, 1, 1), &policy(), &mut state);
    assert_eq!(d.action, ScalingAction::Hold);

    // Queue drains; 5 minutes later the cooldown (10 min) has not elapsed
    let d = evaluate_scaling(1_300_000, healthy(1, 1, 0), &policy(), &mut state);
    assert_eq!(d.action, ScalingAction::Hold);

    // 11 minutes after pending was last seen
    let d = evaluate_scaling(1_660_000, healthy(1, 1, 0), &policy(), &mut state);
    assert_eq!(d.action, ScalingAction::ScaleDown);
    assert_eq!(d.target_count, 0);
}

#[test]
fn idle_at_min_holds() {
    let p = ScalingPolicy {
        min: 1,
        ..policy()
    };
    let mut state = ScalerState::default();
    let d = evaluate_scaling(1_000_000, healthy(1, 1, 0), &p, &mut state);
    assert_eq!(d.action, ScalingAction::Hold);
    assert_eq!(d.target_count, 1);
}

#[test]
fn every_input_yields_exactly_one_bounded_decision() {
    let p = policy();
    let mut state = ScalerState::default();
    for active in 0..6 {
        for idle in 0..3 {
            for pending in [0, 1, 8] {
                for budget in [0, 50, 100] {
                    let pool = PoolSnapshot {
                        active,
                        idle,
                        pending_ready: pending,
                        budget_remaining_pct: budget,
                        cpu_pct: 20,
                        mem_pct: 20,
                    };
                    let d = evaluate_scaling(2_000_000, pool, &p, &mut state);
                    assert!(d.target_count >= p.min && d.target_count <= p.max);
                }
            }
        }
    }
}
