// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::FakeProcessLauncher;
use super::*;
use pilot_core::FakeClock;
use tempfile::TempDir;

struct Rig {
    _dir: TempDir,
    paths: StatePaths,
    clock: FakeClock,
    launcher: FakeProcessLauncher,
    spawner: AgentSpawner<FakeProcessLauncher, FakeClock>,
}

fn rig() -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let clock = FakeClock::new(1_000_000);
    let launcher = FakeProcessLauncher::new();
    let spawner = AgentSpawner::new(paths.clone(), clock.clone(), launcher.clone())
        .with_cooldown(Duration::from_secs(10))
        .with_timeout(Duration::from_secs(600))
        .with_grace(Duration::from_secs(10));
    Rig {
        _dir: dir,
        paths,
        clock,
        launcher,
        spawner,
    }
}

fn request(task: &str) -> SpawnRequest {
    SpawnRequest {
        task_id: TaskId::new(task),
        role: SessionRole::General,
        prompt: "do the thing".to_string(),
        program: "agent-bin".to_string(),
        args: vec!["-p".to_string()],
        env: vec![("PILOT_DAEMON_SPAWNED".to_string(), "1".to_string())],
        cwd: PathBuf::from("/tmp"),
    }
}

#[tokio::test]
async fn spawn_tracks_and_persists() {
    let rig = rig();
    let pid = rig.spawner.spawn(request("T1")).await.unwrap();

    let tracked = rig.spawner.tracked();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].pid, pid);
    assert!(tracked[0].is_running());
    assert_eq!(tracked[0].spawned_at, 1_000_000);

    // Persisted for crash recovery
    let rows: Vec<TrackedAgent> = read_json(&rig.paths.spawned_file()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].task_id, TaskId::new("T1"));

    // Log path was handed to the launcher
    let launched = rig.launcher.launched();
    assert!(launched[0].2.ends_with("logs/agent-T1.log"));
}

#[tokio::test]
async fn cooldown_allows_one_spawn_per_window() {
    let rig = rig();
    rig.spawner.spawn(request("T1")).await.unwrap();

    let err = rig.spawner.spawn(request("T2")).await.unwrap_err();
    match err {
        SpawnError::Cooldown { remaining_ms } => assert!(remaining_ms <= 10_000),
        other => panic!("unexpected: {other}"),
    }
    assert_eq!(rig.launcher.launch_count(), 1);

    rig.clock.advance(10_000);
    rig.spawner.spawn(request("T2")).await.unwrap();
    assert_eq!(rig.launcher.launch_count(), 2);
}

#[tokio::test]
async fn probe_discovers_death_with_minus_one() {
    let rig = rig();
    let pid = rig.spawner.spawn(request("T1")).await.unwrap();
    assert_eq!(rig.spawner.count_alive(), 1);

    rig.launcher.set_stderr(pid, "panicked at main.rs");
    rig.launcher.mark_dead(pid);
    rig.clock.advance(1_000);

    assert_eq!(rig.spawner.count_alive(), 0);
    let agent = rig.spawner.get(pid).unwrap();
    assert_eq!(agent.exit_code, Some(EXIT_DISCOVERED_DEAD));
    assert_eq!(agent.exited_at, Some(1_001_000));
    assert!(agent.last_stderr.contains("panicked"));
}

#[tokio::test]
async fn timeout_escalates_term_then_records_minus_two() {
    let rig = rig();
    let pid = rig.spawner.spawn(request("T1")).await.unwrap();

    // Before the timeout nothing happens
    rig.clock.advance(599_000);
    assert!(rig.spawner.check_timeouts().is_empty());

    // Past the timeout: SIGTERM; the fake dies on SIGTERM
    rig.clock.advance(2_000);
    assert_eq!(rig.spawner.check_timeouts(), vec![pid]);
    assert_eq!(rig.launcher.terminated(), vec![pid]);

    // The sweep discovers the death within the grace window as a timeout kill
    rig.spawner.count_alive();
    let agent = rig.spawner.get(pid).unwrap();
    assert_eq!(agent.exit_code, Some(EXIT_TIMED_OUT));
    assert_eq!(agent.exit_signal, Some(15));
}

#[tokio::test]
async fn stubborn_child_gets_sigkill_after_grace() {
    let rig = rig();
    let pid = rig.spawner.spawn(request("T1")).await.unwrap();
    rig.launcher.make_stubborn(pid);

    rig.clock.advance(601_000);
    rig.spawner.check_timeouts(); // SIGTERM, ignored
    assert_eq!(rig.spawner.count_alive(), 1, "still alive after SIGTERM");

    rig.clock.advance(10_000);
    rig.spawner.check_timeouts(); // grace elapsed → SIGKILL
    assert_eq!(rig.launcher.killed(), vec![pid]);
    let agent = rig.spawner.get(pid).unwrap();
    assert_eq!(agent.exit_code, Some(EXIT_TIMED_OUT));
    assert_eq!(agent.exit_signal, Some(9));
}

#[tokio::test]
async fn reap_drops_old_exits_only() {
    let rig = rig();
    let pid = rig.spawner.spawn(request("T1")).await.unwrap();
    rig.launcher.mark_dead(pid);
    rig.spawner.count_alive();

    rig.spawner.reap();
    assert!(rig.spawner.get(pid).is_some(), "within reap grace");

    rig.clock.advance(31_000);
    rig.spawner.reap();
    assert!(rig.spawner.get(pid).is_none());

    // The persisted table shrank too
    let rows: Vec<TrackedAgent> = read_json(&rig.paths.spawned_file()).unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn running_for_task_finds_live_agent() {
    let rig = rig();
    let pid = rig.spawner.spawn(request("T1")).await.unwrap();
    assert!(rig.spawner.running_for_task(&TaskId::new("T1")).is_some());
    assert!(rig.spawner.running_for_task(&TaskId::new("T2")).is_none());

    rig.launcher.mark_dead(pid);
    rig.spawner.count_alive();
    assert!(rig.spawner.running_for_task(&TaskId::new("T1")).is_none());
}

#[tokio::test]
async fn restart_recovers_orphans_by_probing() {
    let rig = rig();
    let pid_alive = rig.spawner.spawn(request("T1")).await.unwrap();
    rig.clock.advance(10_000);
    let pid_dead = rig.spawner.spawn(request("T2")).await.unwrap();
    rig.launcher.mark_dead(pid_dead);

    // "Restart": a new spawner over the same state dir and launcher
    let restarted =
        AgentSpawner::new(rig.paths.clone(), rig.clock.clone(), rig.launcher.clone());
    let tracked = restarted.tracked();
    assert_eq!(tracked.len(), 2);

    let alive = restarted.get(pid_alive).unwrap();
    assert!(alive.is_running());
    let dead = restarted.get(pid_dead).unwrap();
    assert_eq!(dead.exit_code, Some(EXIT_DISCOVERED_DEAD));
}

#[tokio::test]
async fn launch_failure_propagates_and_leaves_no_row() {
    let rig = rig();
    rig.launcher.fail_next_launch();
    let err = rig.spawner.spawn(request("T1")).await.unwrap_err();
    assert!(matches!(err, SpawnError::Launch(_)));
    assert!(rig.spawner.tracked().is_empty());

    // A failed launch does not burn the cooldown
    rig.spawner.spawn(request("T1")).await.unwrap();
}
