// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    clean      = { "T-123", "T-123" },
    slashes    = { "../etc/passwd", "..-etc-passwd" },
    spaces     = { "fix login page", "fix-login-page" },
    empty      = { "", "unnamed" },
    unicode    = { "täsk", "t-sk" },
)]
fn sanitizes_ids(input: &str, expected: &str) {
    assert_eq!(sanitize_id(input), expected);
}

#[test]
fn layout_matches_contract() {
    let paths = StatePaths::new("/proj");
    let sid = SessionId::new("S-1-ab");
    let tid = TaskId::new("T1");

    assert_eq!(
        paths.session_file(&sid),
        PathBuf::from("/proj/state/sessions/S-1-ab.json")
    );
    assert_eq!(
        paths.pressure_file(&sid),
        PathBuf::from("/proj/state/sessions/S-1-ab.pressure.json")
    );
    assert_eq!(
        paths.pm_state_file(),
        PathBuf::from("/proj/state/orchestrator/pm-state.json")
    );
    assert_eq!(
        paths.pid_file(),
        PathBuf::from("/proj/state/orchestrator/pm-daemon.pid")
    );
    assert_eq!(
        paths.checkpoints_dir(&sid),
        PathBuf::from("/proj/state/checkpoints/S-1-ab")
    );
    assert_eq!(
        paths.overnight_error_file(&tid),
        PathBuf::from("/proj/state/overnight/errors/T1.json")
    );
    assert_eq!(paths.bus_file(), PathBuf::from("/proj/messages/bus.jsonl"));
    assert_eq!(
        paths.offset_file("pm"),
        PathBuf::from("/proj/messages/offsets/pm.json")
    );
    assert_eq!(
        paths.agent_log_file(&TaskId::new("a/b c")),
        PathBuf::from("/proj/logs/agent-a-b-c.log")
    );
}
