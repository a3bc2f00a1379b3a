// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overnight run persistence: run files, per-task error records, and the
//! terminal report (JSON + markdown).

use crate::atomic::{ensure_dir, read_json, write_json_atomic, StoreError};
use crate::paths::StatePaths;
use chrono::{TimeZone, Utc};
use pilot_core::{Clock, OvernightRun, SystemClock, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Accumulated failures for one task within a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskErrors {
    pub task_id: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub errors: Vec<TaskErrorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskErrorEntry {
    pub ts: u64,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct OvernightStore<C: Clock = SystemClock> {
    paths: StatePaths,
    clock: C,
}

impl<C: Clock> OvernightStore<C> {
    pub fn new(paths: StatePaths, clock: C) -> Self {
        Self { paths, clock }
    }

    /// Every run on disk, oldest first.
    pub fn runs(&self) -> Vec<OvernightRun> {
        let Ok(entries) = std::fs::read_dir(self.paths.overnight_dir()) else {
            return Vec::new();
        };
        let mut runs: Vec<OvernightRun> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|e| read_json::<OvernightRun>(&e.path()))
            .collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    /// The single active run, if any.
    pub fn active_run(&self) -> Option<OvernightRun> {
        self.runs().into_iter().find(OvernightRun::is_active)
    }

    pub fn save_run(&self, run: &OvernightRun) -> Result<(), StoreError> {
        write_json_atomic(&self.paths.overnight_run_file(&run.run_id), run)
    }

    pub fn load_run(&self, run_id: &str) -> Option<OvernightRun> {
        read_json(&self.paths.overnight_run_file(run_id))
    }

    /// Record one failure against a task; returns the updated tally.
    pub fn record_failure(
        &self,
        task: &TaskId,
        message: &str,
    ) -> Result<TaskErrors, StoreError> {
        let path = self.paths.overnight_error_file(task);
        let mut tally: TaskErrors = read_json(&path).unwrap_or_else(|| TaskErrors {
            task_id: task.to_string(),
            ..Default::default()
        });
        tally.count += 1;
        tally.errors.push(TaskErrorEntry {
            ts: self.clock.epoch_ms(),
            message: message.to_string(),
        });
        write_json_atomic(&path, &tally)?;
        Ok(tally)
    }

    pub fn task_failure_count(&self, task: &TaskId) -> u32 {
        read_json::<TaskErrors>(&self.paths.overnight_error_file(task))
            .map(|t| t.count)
            .unwrap_or(0)
    }

    /// Write the terminal report; returns `(json_path, md_path)`.
    pub fn write_report(&self, run: &OvernightRun) -> Result<(PathBuf, PathBuf), StoreError> {
        let reports = self.paths.overnight_reports_dir();
        ensure_dir(&reports)?;

        let json_path = reports.join(format!("{}.json", run.run_id));
        write_json_atomic(&json_path, run)?;

        let md_path = reports.join(format!("{}.md", run.run_id));
        std::fs::write(&md_path, self.render_report_md(run))?;
        Ok((json_path, md_path))
    }

    fn render_report_md(&self, run: &OvernightRun) -> String {
        let fmt_ts = |ms: u64| {
            Utc.timestamp_millis_opt(ms as i64)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| ms.to_string())
        };

        let mut out = String::new();
        let _ = writeln!(out, "# Overnight run {}", run.run_id);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", run.description);
        let _ = writeln!(out);
        let _ = writeln!(out, "- status: {:?}", run.status);
        let _ = writeln!(out, "- started: {}", fmt_ts(run.started_at));
        if let Some(ended) = run.ended_at {
            let _ = writeln!(out, "- ended: {}", fmt_ts(ended));
        }
        let _ = writeln!(out, "- total errors: {}", run.total_errors);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "## Tasks ({} total)",
            run.task_ids.len()
        );
        for (heading, list) in [
            ("Completed", &run.tasks_completed),
            ("Failed", &run.tasks_failed),
            ("Still in progress", &run.tasks_in_progress),
        ] {
            if list.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n### {heading}");
            for task in list {
                let failures = self.task_failure_count(task);
                if failures > 0 {
                    let _ = writeln!(out, "- {task} ({failures} failures)");
                } else {
                    let _ = writeln!(out, "- {task}");
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "overnight_tests.rs"]
mod tests;
