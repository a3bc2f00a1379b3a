// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task agent log files with size-based rotation.
//!
//! One file per task id (`logs/agent-<id>.log`); on reaching the size
//! threshold the file shifts `foo.log` → `foo.log.1` → … up to a small
//! retention, dropping the oldest.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Rotation threshold (1 MiB).
pub const MAX_AGENT_LOG_BYTES: u64 = 1024 * 1024;

/// Rotated generations kept (`.1` .. `.3`).
pub const MAX_ROTATED_LOGS: u32 = 3;

/// Shift rotations if the file exceeds the threshold.
///
/// Best-effort: rotation failures must never block agent output.
pub fn rotate_if_needed(path: &Path) {
    let size = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_AGENT_LOG_BYTES {
        return;
    }

    let base = path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{base}.{i}");
        let to = format!("{base}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(path, format!("{base}.1"));
}

/// Appending writer that checks rotation before each write.
#[derive(Debug, Clone)]
pub struct AgentLogWriter {
    path: PathBuf,
}

impl AgentLogWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line, rotating first if the file has grown past the cap.
    pub fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        rotate_if_needed(&self.path);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
