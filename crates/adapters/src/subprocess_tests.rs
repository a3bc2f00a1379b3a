// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn captures_stdout_and_exit_code() {
    let out = run_with_timeout(&argv(&["echo", "hello"]), Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "hello");
    assert!(out.stderr.is_empty());
}

#[tokio::test]
async fn nonzero_exit_is_not_an_error() {
    let out = run_with_timeout(&argv(&["false"]), Duration::from_secs(5), "false")
        .await
        .unwrap();
    assert!(!out.success());
    assert_ne!(out.exit_code, 0);
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let err = run_with_timeout(
        &argv(&["definitely-not-a-real-binary-xyz"]),
        Duration::from_secs(5),
        "ghost",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { .. }));
    assert!(err.to_string().contains("ghost"));
}

#[tokio::test]
async fn timeout_kills_the_child() {
    let err = run_with_timeout(
        &argv(&["sleep", "30"]),
        Duration::from_millis(100),
        "sleeper",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SubprocessError::TimedOut { .. }));
}

#[tokio::test]
async fn empty_argv_is_rejected() {
    let err = run_with_timeout(&[], Duration::from_secs(1), "nothing")
        .await
        .unwrap_err();
    assert!(matches!(err, SubprocessError::EmptyArgv));
}
