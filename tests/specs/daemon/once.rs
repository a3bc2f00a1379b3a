use crate::prelude::*;

#[test]
fn once_mode_runs_a_single_tick_and_exits_cleanly() {
    let root = project();
    pilotd_in(&root, &["start", "--once", "--dry-run"])
        .assert()
        .success();

    // One tick ran, nothing was spawned
    let pm_state: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(root.path().join("state/orchestrator/pm-state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(pm_state["tick_count"], serde_json::json!(1));
    assert_eq!(pm_state["agents_spawned"], serde_json::json!(0));

    // Pid file removed on teardown
    assert!(!root
        .path()
        .join("state/orchestrator/pm-daemon.pid")
        .exists());

    // The startup marker landed in the daemon log
    let log = std::fs::read_to_string(root.path().join("logs/pm-daemon.log")).unwrap();
    assert!(log.contains("--- pilotd: starting (pid:"));
}

#[test]
fn once_mode_ends_its_own_pm_session() {
    let root = project();
    pilotd_in(&root, &["start", "--once", "--dry-run"])
        .assert()
        .success();

    let sessions_dir = root.path().join("state/sessions");
    let session_files: Vec<_> = std::fs::read_dir(&sessions_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.ends_with(".json") && !name.ends_with(".pressure.json")
        })
        .collect();
    assert_eq!(session_files.len(), 1);

    let session: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(session_files[0].path()).unwrap(),
    )
    .unwrap();
    assert_eq!(session["role"], serde_json::json!("pm"));
    assert_eq!(session["status"], serde_json::json!("ended"));
    assert_eq!(session["exit_reason"], serde_json::json!("shutdown"));
}

#[test]
fn second_start_refuses_while_pid_is_recorded_alive() {
    let root = project();
    // Forge a pid file pointing at this very test process
    let orch = root.path().join("state/orchestrator");
    std::fs::create_dir_all(&orch).unwrap();
    std::fs::write(
        orch.join("pm-daemon.pid"),
        serde_json::json!({
            "pid": std::process::id(),
            "started_at": 1,
            "project_root": root.path(),
        })
        .to_string(),
    )
    .unwrap();

    pilotd_in(&root, &["start", "--once"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("already running"));
}
