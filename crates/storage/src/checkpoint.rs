// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned checkpoint store.
//!
//! The live checkpoint for a session is `checkpoints/<sid>/v<N>.json`;
//! saving moves the previous version into `archive/`, which is pruned to
//! [`ARCHIVE_KEEP`] entries. The store also owns the restoration-prompt
//! template embedded into respawn prompts.

use crate::atomic::{ensure_dir, read_json, write_json_atomic, StoreError};
use crate::paths::StatePaths;
use pilot_core::{Checkpoint, Clock, SessionId, SystemClock};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Maximum archived prior versions kept per session.
pub const ARCHIVE_KEEP: usize = 10;

#[derive(Debug, Clone)]
pub struct CheckpointStore<C: Clock = SystemClock> {
    paths: StatePaths,
    clock: C,
}

impl<C: Clock> CheckpointStore<C> {
    pub fn new(paths: StatePaths, clock: C) -> Self {
        Self { paths, clock }
    }

    fn version_path(&self, session: &SessionId, version: u32) -> PathBuf {
        self.paths
            .checkpoints_dir(session)
            .join(format!("v{version}.json"))
    }

    fn archive_dir(&self, session: &SessionId) -> PathBuf {
        self.paths.checkpoints_dir(session).join("archive")
    }

    /// Parse `v<n>.json` names into versions.
    fn versions_in(dir: &Path) -> Vec<u32> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut versions: Vec<u32> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_prefix('v')?
                    .strip_suffix(".json")?
                    .parse::<u32>()
                    .ok()
            })
            .collect();
        versions.sort_unstable();
        versions
    }

    fn latest_version(&self, session: &SessionId) -> Option<u32> {
        Self::versions_in(&self.paths.checkpoints_dir(session))
            .into_iter()
            .last()
    }

    /// Save the next version, archiving the previous one.
    pub fn save(&self, session: &SessionId, mut data: Checkpoint) -> Result<Checkpoint, StoreError> {
        let previous = self.latest_version(session);
        let version = previous.map_or(1, |v| v + 1);
        data.version = version;
        data.saved_at = self.clock.epoch_ms();

        if let Some(prev) = previous {
            let archive = self.archive_dir(session);
            ensure_dir(&archive)?;
            let from = self.version_path(session, prev);
            let to = archive.join(format!("v{prev}.json"));
            std::fs::rename(&from, &to)?;
            self.prune_archive(session)?;
        }

        write_json_atomic(&self.version_path(session, version), &data)?;
        Ok(data)
    }

    fn prune_archive(&self, session: &SessionId) -> Result<(), StoreError> {
        let archive = self.archive_dir(session);
        let versions = Self::versions_in(&archive);
        if versions.len() <= ARCHIVE_KEEP {
            return Ok(());
        }
        for v in &versions[..versions.len() - ARCHIVE_KEEP] {
            std::fs::remove_file(archive.join(format!("v{v}.json")))?;
        }
        Ok(())
    }

    /// The latest checkpoint, if any.
    pub fn load(&self, session: &SessionId) -> Option<Checkpoint> {
        let version = self.latest_version(session)?;
        read_json(&self.version_path(session, version))
    }

    /// Archived versions, newest first.
    pub fn list_history(&self, session: &SessionId) -> Vec<Checkpoint> {
        let archive = self.archive_dir(session);
        Self::versions_in(&archive)
            .into_iter()
            .rev()
            .filter_map(|v| read_json(&archive.join(format!("v{v}.json"))))
            .collect()
    }

    /// Render the markdown block embedded into a respawn prompt.
    pub fn build_restoration_prompt(checkpoint: &Checkpoint) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Resuming task {}", checkpoint.task_id);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "You are picking up **{}** from a previous session's checkpoint (v{}).",
            checkpoint.task_title, checkpoint.version
        );
        let _ = writeln!(
            out,
            "Plan progress: step {} of {}.",
            checkpoint.plan_step, checkpoint.total_steps
        );
        if !checkpoint.completed_steps.is_empty() {
            let _ = writeln!(out, "\n### Completed steps");
            for step in &checkpoint.completed_steps {
                let _ = writeln!(out, "- [{}] {} — {}", step.step, step.description, step.result);
            }
        }
        if !checkpoint.key_decisions.is_empty() {
            let _ = writeln!(out, "\n### Key decisions");
            for decision in &checkpoint.key_decisions {
                let _ = writeln!(out, "- {decision}");
            }
        }
        if !checkpoint.files_modified.is_empty() {
            let _ = writeln!(out, "\n### Files modified so far");
            for file in &checkpoint.files_modified {
                let _ = writeln!(out, "- `{file}`");
            }
        }
        if !checkpoint.important_findings.is_empty() {
            let _ = writeln!(out, "\n### Findings");
            for finding in &checkpoint.important_findings {
                let _ = writeln!(out, "- {finding}");
            }
        }
        if !checkpoint.current_context.is_empty() {
            let _ = writeln!(out, "\n### Where things stand");
            let _ = writeln!(out, "{}", checkpoint.current_context);
        }
        let _ = writeln!(
            out,
            "\nContinue from step {}; do not redo completed work.",
            checkpoint.plan_step
        );
        out
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
