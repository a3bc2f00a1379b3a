// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::TaskInfo;

#[test]
fn argv_is_an_array_not_a_shell_string() {
    let gw = CliTaskGateway::new("/proj");
    let argv = gw.argv(&["claim", "T1; rm -rf /", "--session", "S-1"]);
    assert_eq!(argv[0], "bd");
    assert_eq!(argv[1], "claim");
    // The hostile id stays a single argument
    assert_eq!(argv[2], "T1; rm -rf /");
    assert_eq!(argv[4], "S-1");
    assert_eq!(argv[argv.len() - 2], "--dir");
    assert_eq!(argv[argv.len() - 1], "/proj");
}

#[test]
fn parse_tasks_accepts_empty_and_arrays() {
    assert!(CliTaskGateway::parse_tasks("").unwrap().is_empty());
    assert!(CliTaskGateway::parse_tasks("  \n").unwrap().is_empty());

    let tasks = CliTaskGateway::parse_tasks(
        r#"[{"id":"T1","title":"fix","priority":2,"labels":["backend"]}]"#,
    )
    .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "T1");
    assert_eq!(tasks[0].priority, 2);

    assert!(CliTaskGateway::parse_tasks("not json").is_err());
}

#[tokio::test]
async fn tool_failure_surfaces_as_error_value() {
    let gw = CliTaskGateway::new("/tmp").with_bin("false");
    let err = gw.ready().await.unwrap_err();
    match err {
        TaskGatewayError::Tool { code, .. } => assert_ne!(code, 0),
        other => panic!("unexpected: {other}"),
    }
}

#[tokio::test]
async fn missing_tool_is_a_subprocess_error() {
    let gw = CliTaskGateway::new("/tmp").with_bin("no-such-task-cli-zzz");
    assert!(matches!(
        gw.ready().await.unwrap_err(),
        TaskGatewayError::Subprocess(_)
    ));
}

#[tokio::test]
async fn fake_gateway_tracks_claims_and_closes() {
    let gw = fake::FakeTaskGateway::new();
    gw.push_ready(TaskInfo::new("T1", "one"));
    gw.push_ready(TaskInfo::new("T2", "two"));

    assert_eq!(gw.ready().await.unwrap().len(), 2);

    gw.claim(&TaskId::new("T1"), &SessionId::new("S-1"))
        .await
        .unwrap();
    gw.close(&TaskId::new("T1")).await.unwrap();

    // Closed tasks drop out of ready
    let ready = gw.ready().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, "T2");
    assert_eq!(gw.closed(), vec![TaskId::new("T1")]);
    assert_eq!(
        gw.claims().get(&TaskId::new("T1")),
        Some(&SessionId::new("S-1"))
    );
}

#[tokio::test]
async fn fake_gateway_scripted_failure() {
    let gw = fake::FakeTaskGateway::new();
    gw.fail_next("store offline");
    assert!(gw.ready().await.is_err());
    // One-shot: next call succeeds
    assert!(gw.ready().await.is_ok());
}
