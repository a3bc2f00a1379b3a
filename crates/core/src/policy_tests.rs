// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_document_yields_defaults() {
    let p = Policy::from_toml_str("").unwrap();
    assert_eq!(p, Policy::default());
    assert_eq!(p.autonomy.mode, AutonomyMode::Supervised);
    assert_eq!(p.checkpoint.pressure_threshold_pct, 70);
    assert_eq!(p.session.max_concurrent_sessions, 4);
    assert_eq!(p.overnight.error_budget.max_failures_per_task, 3);
    assert!(p.quality_gates.enabled);
}

#[test]
fn partial_sections_merge_with_defaults() {
    let p = Policy::from_toml_str(
        r#"
[autonomy]
mode = "full"

[overnight.error_budget]
max_total_failures = 5

[pool_scaling]
min = 1
max = 8

[pool_scaling.scale_down]
idle_cooldown_minutes = 20
"#,
    )
    .unwrap();
    assert_eq!(p.autonomy.mode, AutonomyMode::Full);
    assert_eq!(p.overnight.error_budget.max_total_failures, 5);
    assert_eq!(p.overnight.error_budget.max_failures_per_task, 3);
    assert_eq!(p.pool_scaling.min, 1);
    assert_eq!(p.pool_scaling.max, 8);
    assert_eq!(p.pool_scaling.scale_down.idle_cooldown_minutes, 20);
    // Untouched sibling keeps its default
    assert_eq!(p.pool_scaling.scale_down.budget_threshold_pct, 10);
}

#[test]
fn unknown_mode_is_an_error() {
    assert!(Policy::from_toml_str("[autonomy]\nmode = \"yolo\"").is_err());
}

#[test]
fn load_missing_file_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let p = Policy::load(dir.path()).unwrap();
    assert_eq!(p, Policy::default());
}

#[test]
fn load_corrupt_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pilot.toml"), "not [ toml").unwrap();
    assert!(Policy::load(dir.path()).is_err());
}

#[test]
fn load_reads_real_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("pilot.toml"),
        "[session]\nmax_concurrent_sessions = 2\n",
    )
    .unwrap();
    let p = Policy::load(dir.path()).unwrap();
    assert_eq!(p.session.max_concurrent_sessions, 2);
}
