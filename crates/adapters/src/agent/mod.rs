// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent process lifecycle: spawn, track, time out, and reap child agents.
//!
//! The spawner owns a tracking table keyed by pid, persisted to
//! `state/orchestrator/spawned.json` on every mutation so a restarted
//! daemon can rediscover orphaned children by probing pids. Liveness is
//! signal-0; a wall-clock timeout escalates SIGTERM → SIGKILL. The spawner
//! never retries on its own.

pub mod fake;
pub mod logs;

use crate::agent::logs::AgentLogWriter;
use async_trait::async_trait;
use parking_lot::Mutex;
use pilot_core::{Clock, SessionRole, SystemClock, TaskId};
use pilot_storage::{read_json, write_json_atomic, StatePaths, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Minimum spacing between spawns (prevents spawn storms).
pub const SPAWN_COOLDOWN: Duration = Duration::from_secs(10);

/// Wall-clock limit per agent before SIGTERM.
pub const AGENT_TIMEOUT: Duration = Duration::from_secs(600);

/// Grace between SIGTERM and SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_secs(10);

/// Exited entries older than this are dropped from the table.
pub const REAP_AFTER: Duration = Duration::from_secs(30);

/// Exit code recorded when death was discovered by liveness probe.
pub const EXIT_DISCOVERED_DEAD: i32 = -1;

/// Exit code recorded when the agent was killed for exceeding its timeout.
pub const EXIT_TIMED_OUT: i32 = -2;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("spawn cooldown active ({remaining_ms}ms remaining)")]
    Cooldown { remaining_ms: u64 },
    #[error("failed to launch agent: {0}")]
    Launch(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything needed to launch one agent.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub task_id: TaskId,
    pub role: SessionRole,
    /// Rendered context capsule, injected as a launch argument
    pub prompt: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
}

/// One row of the tracking table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedAgent {
    pub pid: u32,
    pub task_id: TaskId,
    pub role: SessionRole,
    pub spawned_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_signal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_sent_at: Option<u64>,
    #[serde(default)]
    pub last_stderr: String,
}

impl TrackedAgent {
    pub fn is_running(&self) -> bool {
        self.exit_code.is_none()
    }
}

/// OS-level process operations, abstracted for tests.
#[async_trait]
pub trait ProcessLauncher: Clone + Send + Sync + 'static {
    /// Launch a detached child, streaming its stdout+stderr into `log_path`.
    async fn launch(&self, req: &SpawnRequest, log_path: &Path) -> Result<u32, SpawnError>;

    /// Signal-0 liveness probe.
    fn is_alive(&self, pid: u32) -> bool;

    fn terminate(&self, pid: u32);

    fn kill(&self, pid: u32);

    /// Bounded tail of the child's stderr, if any was captured.
    fn last_stderr(&self, pid: u32) -> Option<String>;
}

const STDERR_TAIL_BYTES: usize = 2048;

/// Real launcher using `tokio::process` and POSIX signals.
#[derive(Clone, Default)]
pub struct OsProcessLauncher {
    stderr_tails: std::sync::Arc<Mutex<HashMap<u32, String>>>,
}

impl OsProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_signal(pid: u32, signal: nix::sys::signal::Signal) {
        let target = nix::unistd::Pid::from_raw(pid as i32);
        if let Err(e) = nix::sys::signal::kill(target, signal) {
            warn!(pid, signal = %signal, error = %e, "failed to signal agent");
        }
    }

    fn record_stderr(tails: &Mutex<HashMap<u32, String>>, pid: u32, line: &str) {
        let mut map = tails.lock();
        let tail = map.entry(pid).or_default();
        tail.push_str(line);
        tail.push('\n');
        if tail.len() > STDERR_TAIL_BYTES {
            let cut = tail.len() - STDERR_TAIL_BYTES;
            tail.drain(..cut);
        }
    }
}

#[async_trait]
impl ProcessLauncher for OsProcessLauncher {
    async fn launch(&self, req: &SpawnRequest, log_path: &Path) -> Result<u32, SpawnError> {
        use tokio::io::{AsyncBufReadExt, BufReader};

        let mut cmd = tokio::process::Command::new(&req.program);
        cmd.args(&req.args)
            .arg(&req.prompt)
            .current_dir(&req.cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        for (key, value) in &req.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| SpawnError::Launch(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| SpawnError::Launch("child exited before pid was known".to_string()))?;

        let writer = AgentLogWriter::new(log_path);

        if let Some(stdout) = child.stdout.take() {
            let writer = writer.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = writer.append_line(&line);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let writer = writer.clone();
            let tails = std::sync::Arc::clone(&self.stderr_tails);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    Self::record_stderr(&tails, pid, &line);
                    let _ = writer.append_line(&line);
                }
            });
        }

        // Reap the OS zombie; exit status bookkeeping happens via the
        // spawner's signal-0 sweep, not here.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        let target = nix::unistd::Pid::from_raw(pid as i32);
        match nix::sys::signal::kill(target, None) {
            Ok(()) => true,
            Err(nix::errno::Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate(&self, pid: u32) {
        Self::send_signal(pid, nix::sys::signal::Signal::SIGTERM);
    }

    fn kill(&self, pid: u32) {
        Self::send_signal(pid, nix::sys::signal::Signal::SIGKILL);
    }

    fn last_stderr(&self, pid: u32) -> Option<String> {
        self.stderr_tails.lock().get(&pid).cloned()
    }
}

/// Spawns and supervises agent children.
pub struct AgentSpawner<L: ProcessLauncher = OsProcessLauncher, C: Clock = SystemClock> {
    launcher: L,
    clock: C,
    paths: StatePaths,
    agents: Mutex<HashMap<u32, TrackedAgent>>,
    last_spawn_at: Mutex<Option<u64>>,
    cooldown: Duration,
    timeout: Duration,
    grace: Duration,
    reap_after: Duration,
}

impl<L: ProcessLauncher, C: Clock> AgentSpawner<L, C> {
    pub fn new(paths: StatePaths, clock: C, launcher: L) -> Self {
        let spawner = Self {
            launcher,
            clock,
            paths,
            agents: Mutex::new(HashMap::new()),
            last_spawn_at: Mutex::new(None),
            cooldown: SPAWN_COOLDOWN,
            timeout: AGENT_TIMEOUT,
            grace: KILL_GRACE,
            reap_after: REAP_AFTER,
        };
        spawner.recover_table();
        spawner
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Rediscover children from the persisted table after a restart.
    fn recover_table(&self) {
        let Some(rows) = read_json::<Vec<TrackedAgent>>(&self.paths.spawned_file()) else {
            return;
        };
        let now = self.clock.epoch_ms();
        let mut agents = self.agents.lock();
        for mut row in rows {
            if row.is_running() && !self.launcher.is_alive(row.pid) {
                row.exit_code = Some(EXIT_DISCOVERED_DEAD);
                row.exited_at = Some(now);
            }
            agents.insert(row.pid, row);
        }
        info!(count = agents.len(), "recovered agent tracking table");
    }

    fn persist_locked(&self, agents: &HashMap<u32, TrackedAgent>) {
        let mut rows: Vec<&TrackedAgent> = agents.values().collect();
        rows.sort_by_key(|a| a.spawned_at);
        if let Err(e) = write_json_atomic(&self.paths.spawned_file(), &rows) {
            warn!(error = %e, "failed to persist agent tracking table");
        }
    }

    /// Launch an agent for a task. At most one spawn per cooldown window.
    pub async fn spawn(&self, req: SpawnRequest) -> Result<u32, SpawnError> {
        let now = self.clock.epoch_ms();
        let cooldown_ms = self.cooldown.as_millis() as u64;
        {
            let last = self.last_spawn_at.lock();
            if let Some(at) = *last {
                let elapsed = now.saturating_sub(at);
                if elapsed < cooldown_ms {
                    return Err(SpawnError::Cooldown {
                        remaining_ms: cooldown_ms - elapsed,
                    });
                }
            }
        }

        let log_path = self.paths.agent_log_file(&req.task_id);
        logs::rotate_if_needed(&log_path);

        let pid = self.launcher.launch(&req, &log_path).await?;
        *self.last_spawn_at.lock() = Some(now);

        let mut agents = self.agents.lock();
        agents.insert(
            pid,
            TrackedAgent {
                pid,
                task_id: req.task_id.clone(),
                role: req.role,
                spawned_at: now,
                exit_code: None,
                exit_signal: None,
                exited_at: None,
                term_sent_at: None,
                last_stderr: String::new(),
            },
        );
        self.persist_locked(&agents);
        info!(pid, task_id = %req.task_id, "agent spawned");
        Ok(pid)
    }

    /// Probe every running entry; record discovered deaths. Returns the
    /// number still alive.
    pub fn count_alive(&self) -> usize {
        let now = self.clock.epoch_ms();
        let mut agents = self.agents.lock();
        let mut changed = false;
        let mut alive = 0;
        for agent in agents.values_mut() {
            if !agent.is_running() {
                continue;
            }
            if self.launcher.is_alive(agent.pid) {
                alive += 1;
                continue;
            }
            // Death discovered by probe; timed-out children get the
            // timeout code
            agent.exit_code = Some(if agent.term_sent_at.is_some() {
                EXIT_TIMED_OUT
            } else {
                EXIT_DISCOVERED_DEAD
            });
            agent.exit_signal = agent.term_sent_at.map(|_| 15);
            agent.exited_at = Some(now);
            if let Some(tail) = self.launcher.last_stderr(agent.pid) {
                agent.last_stderr = tail;
            }
            changed = true;
        }
        if changed {
            self.persist_locked(&agents);
        }
        alive
    }

    /// Enforce the wall-clock timeout: SIGTERM overdue agents, SIGKILL the
    /// ones that ignored SIGTERM past the grace window. Returns pids acted on.
    pub fn check_timeouts(&self) -> Vec<u32> {
        let now = self.clock.epoch_ms();
        let timeout_ms = self.timeout.as_millis() as u64;
        let grace_ms = self.grace.as_millis() as u64;
        let mut acted = Vec::new();
        let mut agents = self.agents.lock();
        let mut changed = false;

        for agent in agents.values_mut() {
            if !agent.is_running() {
                continue;
            }
            match agent.term_sent_at {
                None => {
                    if now.saturating_sub(agent.spawned_at) > timeout_ms {
                        warn!(pid = agent.pid, task_id = %agent.task_id, "agent timed out, sending SIGTERM");
                        self.launcher.terminate(agent.pid);
                        agent.term_sent_at = Some(now);
                        acted.push(agent.pid);
                        changed = true;
                    }
                }
                Some(sent) => {
                    if now.saturating_sub(sent) >= grace_ms {
                        warn!(pid = agent.pid, task_id = %agent.task_id, "grace elapsed, sending SIGKILL");
                        self.launcher.kill(agent.pid);
                        agent.exit_code = Some(EXIT_TIMED_OUT);
                        agent.exit_signal = Some(9);
                        agent.exited_at = Some(now);
                        if let Some(tail) = self.launcher.last_stderr(agent.pid) {
                            agent.last_stderr = tail;
                        }
                        acted.push(agent.pid);
                        changed = true;
                    }
                }
            }
        }
        if changed {
            self.persist_locked(&agents);
        }
        acted
    }

    /// Drop exited entries older than the reap grace period.
    pub fn reap(&self) {
        let now = self.clock.epoch_ms();
        let reap_ms = self.reap_after.as_millis() as u64;
        let mut agents = self.agents.lock();
        let before = agents.len();
        agents.retain(|_, a| match a.exited_at {
            Some(at) => now.saturating_sub(at) < reap_ms,
            None => true,
        });
        if agents.len() != before {
            self.persist_locked(&agents);
        }
    }

    pub fn tracked(&self) -> Vec<TrackedAgent> {
        let mut rows: Vec<TrackedAgent> = self.agents.lock().values().cloned().collect();
        rows.sort_by_key(|a| a.spawned_at);
        rows
    }

    pub fn get(&self, pid: u32) -> Option<TrackedAgent> {
        self.agents.lock().get(&pid).cloned()
    }

    /// A still-running agent working the given task, if any.
    pub fn running_for_task(&self, task_id: &TaskId) -> Option<TrackedAgent> {
        self.agents
            .lock()
            .values()
            .find(|a| a.is_running() && a.task_id == *task_id)
            .cloned()
    }

    /// SIGTERM one agent now (escalation decision, not timeout).
    pub fn terminate(&self, pid: u32) {
        let mut agents = self.agents.lock();
        if let Some(agent) = agents.get_mut(&pid) {
            self.launcher.terminate(pid);
            agent.term_sent_at = Some(self.clock.epoch_ms());
            self.persist_locked(&agents);
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
