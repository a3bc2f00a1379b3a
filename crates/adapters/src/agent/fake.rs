// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process launcher for deterministic spawner tests.

use super::{ProcessLauncher, SpawnError, SpawnRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct FakeState {
    next_pid: u32,
    alive: HashSet<u32>,
    launched: Vec<(u32, SpawnRequest, PathBuf)>,
    terminated: Vec<u32>,
    killed: Vec<u32>,
    stderr: HashMap<u32, String>,
    /// Pids that ignore SIGTERM (require SIGKILL)
    stubborn: HashSet<u32>,
    fail_next: bool,
}

/// Launcher that fabricates pids and lets tests drive liveness.
#[derive(Clone, Default)]
pub struct FakeProcessLauncher {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessLauncher {
    pub fn new() -> Self {
        let launcher = Self::default();
        launcher.state.lock().next_pid = 1000;
        launcher
    }

    pub fn launched(&self) -> Vec<(u32, SpawnRequest, PathBuf)> {
        self.state.lock().launched.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().launched.len()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.state.lock().terminated.clone()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.state.lock().killed.clone()
    }

    /// Simulate the process exiting on its own.
    pub fn mark_dead(&self, pid: u32) {
        self.state.lock().alive.remove(&pid);
    }

    /// Make a pid survive SIGTERM until SIGKILL.
    pub fn make_stubborn(&self, pid: u32) {
        self.state.lock().stubborn.insert(pid);
    }

    pub fn set_stderr(&self, pid: u32, tail: impl Into<String>) {
        self.state.lock().stderr.insert(pid, tail.into());
    }

    pub fn fail_next_launch(&self) {
        self.state.lock().fail_next = true;
    }
}

#[async_trait]
impl ProcessLauncher for FakeProcessLauncher {
    async fn launch(&self, req: &SpawnRequest, log_path: &Path) -> Result<u32, SpawnError> {
        let mut state = self.state.lock();
        if state.fail_next {
            state.fail_next = false;
            return Err(SpawnError::Launch("scripted launch failure".to_string()));
        }
        state.next_pid += 1;
        let pid = state.next_pid;
        state.alive.insert(pid);
        state
            .launched
            .push((pid, req.clone(), log_path.to_path_buf()));
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().alive.contains(&pid)
    }

    fn terminate(&self, pid: u32) {
        let mut state = self.state.lock();
        state.terminated.push(pid);
        if !state.stubborn.contains(&pid) {
            state.alive.remove(&pid);
        }
    }

    fn kill(&self, pid: u32) {
        let mut state = self.state.lock();
        state.killed.push(pid);
        state.alive.remove(&pid);
    }

    fn last_stderr(&self, pid: u32) -> Option<String> {
        self.state.lock().stderr.get(&pid).cloned()
    }
}
