// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{FakeClock, OvernightStatus};
use tempfile::TempDir;

fn store() -> (TempDir, OvernightStore<FakeClock>) {
    let dir = tempfile::tempdir().unwrap();
    let store = OvernightStore::new(StatePaths::new(dir.path()), FakeClock::new(1_000));
    (dir, store)
}

fn run(store: &OvernightStore<FakeClock>) -> OvernightRun {
    let run = OvernightRun::new(
        "nightly sweep",
        vec![TaskId::new("T1"), TaskId::new("T2")],
        1_000,
    );
    store.save_run(&run).unwrap();
    run
}

#[test]
fn active_run_is_found() {
    let (_dir, store) = store();
    assert!(store.active_run().is_none());
    let r = run(&store);
    assert_eq!(store.active_run().unwrap().run_id, r.run_id);
}

#[test]
fn ended_run_is_not_active() {
    let (_dir, store) = store();
    let mut r = run(&store);
    r.end(OvernightStatus::Stopped, 2_000);
    store.save_run(&r).unwrap();
    assert!(store.active_run().is_none());
    assert_eq!(
        store.load_run(&r.run_id).unwrap().status,
        OvernightStatus::Stopped
    );
}

#[test]
fn failures_accumulate_per_task() {
    let (_dir, store) = store();
    let t = TaskId::new("T1");
    assert_eq!(store.task_failure_count(&t), 0);

    store.record_failure(&t, "tests failed").unwrap();
    let tally = store.record_failure(&t, "tests failed again").unwrap();
    assert_eq!(tally.count, 2);
    assert_eq!(tally.errors.len(), 2);
    assert_eq!(store.task_failure_count(&t), 2);
    assert_eq!(store.task_failure_count(&TaskId::new("T2")), 0);
}

#[test]
fn report_files_are_written() {
    let (_dir, store) = store();
    let mut r = run(&store);
    r.mark_completed(&TaskId::new("T1"));
    r.mark_failed(&TaskId::new("T2"));
    store.record_failure(&TaskId::new("T2"), "boom").unwrap();
    r.total_errors = 1;
    r.end(OvernightStatus::Stopped, 9_000);

    let (json_path, md_path) = store.write_report(&r).unwrap();
    assert!(json_path.exists());
    assert!(md_path.exists());

    let report: OvernightRun = read_json(&json_path).unwrap();
    assert_eq!(report.run_id, r.run_id);

    let md = std::fs::read_to_string(&md_path).unwrap();
    assert!(md.contains(&r.run_id));
    assert!(md.contains("### Completed"));
    assert!(md.contains("### Failed"));
    assert!(md.contains("T2 (1 failures)"));
}
