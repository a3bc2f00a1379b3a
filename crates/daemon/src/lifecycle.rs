// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, single-instance pid file, teardown
//! helpers, and the `stop`/`status`/`logs` command backends.

use pilot_core::{Clock, Policy, PolicyError, SessionId};
use pilot_storage::{read_json, write_json_atomic, AuditLogs, PmStateStore, StatePaths, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("pilotd is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },
    #[error("no running daemon found")]
    NoDaemon,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runtime configuration assembled from CLI flags and `pilot.toml`.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub policy: Policy,
    pub tick: Duration,
    /// Total session slots including PM (CLI `--agents`)
    pub max_agents: u32,
    pub budget_usd: Option<f64>,
    pub dry_run: bool,
    /// Agent binary and fixed leading arguments; the capsule prompt is
    /// appended as the final argument
    pub agent_program: String,
    pub agent_args: Vec<String>,
}

/// Default tick interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(5);

impl Config {
    pub fn load(project_root: impl Into<PathBuf>) -> Result<Self, LifecycleError> {
        let project_root = project_root.into();
        let policy = Policy::load(&project_root)?;
        Ok(Self {
            max_agents: policy.session.max_concurrent_sessions,
            project_root,
            policy,
            tick: crate::env::tick_override().unwrap_or(DEFAULT_TICK),
            budget_usd: None,
            dry_run: false,
            agent_program: "claude".to_string(),
            agent_args: vec!["-p".to_string()],
        })
    }

    pub fn paths(&self) -> StatePaths {
        StatePaths::new(&self.project_root)
    }
}

/// Content of `state/orchestrator/pm-daemon.pid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidFile {
    pub pid: u32,
    pub started_at: u64,
    pub project_root: PathBuf,
}

/// Signal-0 probe.
pub fn pid_alive(pid: u32) -> bool {
    let target = nix::unistd::Pid::from_raw(pid as i32);
    match nix::sys::signal::kill(target, None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

pub fn read_pid_file(paths: &StatePaths) -> Option<PidFile> {
    read_json(&paths.pid_file())
}

/// Single-instance discipline: refuse to start while the recorded pid is
/// alive; a stale pid file is overwritten with a warning.
pub fn acquire_pid_file<C: Clock>(paths: &StatePaths, clock: &C) -> Result<(), LifecycleError> {
    if let Some(existing) = read_pid_file(paths) {
        if pid_alive(existing.pid) {
            return Err(LifecycleError::AlreadyRunning { pid: existing.pid });
        }
        warn!(pid = existing.pid, "stale pid file found, taking over");
    }
    write_json_atomic(
        &paths.pid_file(),
        &PidFile {
            pid: std::process::id(),
            started_at: clock.epoch_ms(),
            project_root: paths.root().to_path_buf(),
        },
    )?;
    Ok(())
}

pub fn release_pid_file(paths: &StatePaths) {
    let _ = std::fs::remove_file(paths.pid_file());
}

/// `pilotd stop`: SIGTERM the recorded daemon. Returns the signalled pid.
pub fn stop_daemon(paths: &StatePaths) -> Result<u32, LifecycleError> {
    let pid_file = read_pid_file(paths).ok_or(LifecycleError::NoDaemon)?;
    if !pid_alive(pid_file.pid) {
        release_pid_file(paths);
        return Err(LifecycleError::NoDaemon);
    }
    let target = nix::unistd::Pid::from_raw(pid_file.pid as i32);
    nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGTERM)
        .map_err(|e| LifecycleError::Io(std::io::Error::other(e)))?;
    Ok(pid_file.pid)
}

/// `pilotd status`: render the persisted PmState plus open escalations.
pub fn status_report<C: Clock>(paths: &StatePaths, clock: &C) -> Result<String, LifecycleError> {
    let pid_file = read_pid_file(paths);
    let running = pid_file.as_ref().is_some_and(|p| pid_alive(p.pid));
    if pid_file.is_none() {
        return Err(LifecycleError::NoDaemon);
    }

    let state = PmStateStore::new(paths.clone()).load();
    let mut out = String::new();
    if let Some(pid_file) = &pid_file {
        let _ = writeln!(
            out,
            "pilotd {} (pid {})",
            if running { "running" } else { "not running" },
            pid_file.pid
        );
        let _ = writeln!(out, "  root: {}", pid_file.project_root.display());
    }
    let _ = writeln!(out, "  ticks: {}", state.tick_count);
    let _ = writeln!(out, "  events processed: {}", state.events_processed);
    let _ = writeln!(out, "  agents spawned: {}", state.agents_spawned);
    let _ = writeln!(
        out,
        "  tasks reviewed/closed: {}/{}",
        state.tasks_auto_reviewed, state.tasks_auto_closed
    );
    let _ = writeln!(out, "  errors: {}", state.errors);
    if let Some(last_error) = &state.last_error {
        let _ = writeln!(out, "  last error: {last_error}");
    }

    let escalations = AuditLogs::new(paths.clone(), clock.clone()).escalations();
    if !escalations.is_empty() {
        let _ = writeln!(out, "\nhuman escalations ({}):", escalations.len());
        for escalation in escalations.iter().rev().take(10) {
            let _ = writeln!(out, "  - {}", escalation.reason);
        }
    }
    Ok(out)
}

/// `pilotd logs --lines N`: tail of the daemon log.
pub fn tail_logs(paths: &StatePaths, lines: usize) -> Result<String, LifecycleError> {
    let path = paths.daemon_log_file();
    let text = std::fs::read_to_string(&path)?;
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].join("\n"))
}

/// Mint the PM's own session id for this daemon run.
pub fn pm_session_id<C: Clock>(clock: &C) -> SessionId {
    pilot_core::generate_session_id(clock.epoch_ms())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
