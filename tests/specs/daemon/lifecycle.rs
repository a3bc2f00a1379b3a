use crate::prelude::*;
use predicates::prelude::*;

#[test]
fn status_without_daemon_is_an_operational_failure() {
    let root = project();
    pilotd_in(&root, &["status"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("no running daemon"));
}

#[test]
fn stop_without_daemon_is_an_operational_failure() {
    let root = project();
    pilotd_in(&root, &["stop"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("no running daemon"));
}

#[test]
fn logs_without_log_file_fails() {
    let root = project();
    pilotd_in(&root, &["logs"]).assert().failure();
}

#[test]
fn logs_tails_the_daemon_log() {
    let root = project();
    let logs_dir = root.path().join("logs");
    std::fs::create_dir_all(&logs_dir).unwrap();
    std::fs::write(logs_dir.join("pm-daemon.log"), "alpha\nbeta\ngamma\n").unwrap();

    pilotd_in(&root, &["logs", "--lines", "2"])
        .assert()
        .success()
        .stdout(predicates::str::contains("beta"))
        .stdout(predicates::str::contains("gamma"))
        .stdout(predicates::str::contains("alpha").not());
}

#[test]
fn corrupt_policy_file_refuses_start() {
    let root = project();
    std::fs::write(root.path().join("pilot.toml"), "not [ valid").unwrap();
    pilotd_in(&root, &["start", "--once"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("policy"));
}
