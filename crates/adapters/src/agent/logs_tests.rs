// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn append_creates_dirs_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let writer = AgentLogWriter::new(dir.path().join("logs/agent-T1.log"));
    writer.append_line("hello").unwrap();
    writer.append_line("world").unwrap();
    let text = std::fs::read_to_string(writer.path()).unwrap();
    assert_eq!(text, "hello\nworld\n");
}

#[test]
fn small_files_do_not_rotate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent-T1.log");
    std::fs::write(&path, "short").unwrap();
    rotate_if_needed(&path);
    assert!(path.exists());
    assert!(!dir.path().join("agent-T1.log.1").exists());
}

#[test]
fn rotation_shifts_generations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent-T1.log");
    let big = "x".repeat(MAX_AGENT_LOG_BYTES as usize);

    std::fs::write(&path, &big).unwrap();
    std::fs::write(dir.path().join("agent-T1.log.1"), "gen1").unwrap();
    std::fs::write(dir.path().join("agent-T1.log.2"), "gen2").unwrap();

    rotate_if_needed(&path);

    assert!(!path.exists());
    // Old .1 preserved as .2, old .2 preserved as .3
    assert_eq!(
        std::fs::read_to_string(dir.path().join("agent-T1.log.2")).unwrap(),
        "gen1"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("agent-T1.log.3")).unwrap(),
        "gen2"
    );
    // Current became .1
    assert_eq!(
        std::fs::read_to_string(dir.path().join("agent-T1.log.1"))
            .unwrap()
            .len(),
        big.len()
    );
}

#[test]
fn oldest_generation_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent-T1.log");
    let big = "x".repeat(MAX_AGENT_LOG_BYTES as usize);
    std::fs::write(&path, &big).unwrap();
    for i in 1..=MAX_ROTATED_LOGS {
        std::fs::write(dir.path().join(format!("agent-T1.log.{i}")), format!("gen{i}")).unwrap();
    }
    rotate_if_needed(&path);
    // gen3 fell off the end; gen2 is now .3
    assert_eq!(
        std::fs::read_to_string(dir.path().join("agent-T1.log.3")).unwrap(),
        "gen2"
    );
}

#[test]
fn writer_rotates_when_threshold_crossed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent-T1.log");
    let writer = AgentLogWriter::new(&path);
    std::fs::write(&path, "y".repeat(MAX_AGENT_LOG_BYTES as usize)).unwrap();

    writer.append_line("after rotation").unwrap();
    assert!(dir.path().join("agent-T1.log.1").exists());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "after rotation\n"
    );
}
