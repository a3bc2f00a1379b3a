use crate::prelude::*;

#[test]
fn help_lists_commands() {
    pilotd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("USAGE"))
        .stdout(predicates::str::contains("start"))
        .stdout(predicates::str::contains("--once"));
}

#[test]
fn version_prints_and_exits_zero() {
    pilotd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("pilotd"));
}

#[test]
fn unknown_command_fails_with_usage() {
    pilotd()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicates::str::contains("unknown command"));
}

#[test]
fn missing_command_fails() {
    pilotd().assert().failure();
}
