// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn start_with_all_flags() {
    let cli = parse_args(&args(&[
        "start", "--once", "--dry-run", "--agents", "3", "--tick", "250", "--budget", "12.5",
        "--root", "/proj",
    ]))
    .unwrap();
    assert_eq!(cli.command, "start");
    assert!(cli.once);
    assert!(cli.dry_run);
    assert_eq!(cli.agents, Some(3));
    assert_eq!(cli.tick_ms, Some(250));
    assert_eq!(cli.budget_usd, Some(12.5));
    assert_eq!(cli.root, PathBuf::from("/proj"));
}

#[test]
fn defaults_without_flags() {
    let cli = parse_args(&args(&["status"])).unwrap();
    assert_eq!(cli.command, "status");
    assert!(!cli.once);
    assert!(!cli.dry_run);
    assert_eq!(cli.lines, 50);
}

#[test]
fn logs_lines_flag() {
    let cli = parse_args(&args(&["logs", "--lines", "7"])).unwrap();
    assert_eq!(cli.lines, 7);
}

#[yare::parameterized(
    no_command     = { &[] },
    bad_flag       = { &["start", "--what"] },
    missing_value  = { &["start", "--agents"] },
    bad_number     = { &["start", "--agents", "lots"] },
)]
fn rejects_bad_args(parts: &[&str]) {
    assert!(parse_args(&args(parts)).is_err());
}

#[test]
fn log_rotation_shifts_generations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pm-daemon.log");
    std::fs::write(&path, "x".repeat(MAX_LOG_SIZE as usize)).unwrap();
    std::fs::write(dir.path().join("pm-daemon.log.1"), "old1").unwrap();

    rotate_log_if_needed(&path);
    assert!(!path.exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("pm-daemon.log.2")).unwrap(),
        "old1"
    );
    assert!(dir.path().join("pm-daemon.log.1").exists());
}

#[test]
fn small_log_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pm-daemon.log");
    std::fs::write(&path, "tiny").unwrap();
    rotate_log_if_needed(&path);
    assert!(path.exists());
}

#[test]
fn startup_marker_appends_pid() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    write_startup_marker(&paths);
    let text = std::fs::read_to_string(paths.daemon_log_file()).unwrap();
    assert!(text.starts_with(STARTUP_MARKER_PREFIX));
    assert!(text.contains(&std::process::id().to_string()));
}
