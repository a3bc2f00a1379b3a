//! Shared helpers for CLI specs.

use assert_cmd::Command;
use tempfile::TempDir;

pub fn pilotd() -> Command {
    Command::cargo_bin("pilotd").expect("pilotd binary")
}

/// A pilotd command with `--root` pointing at the temp project.
pub fn pilotd_in(root: &TempDir, args: &[&str]) -> Command {
    let mut cmd = pilotd();
    cmd.args(args).arg("--root").arg(root.path());
    cmd
}

pub fn project() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}
