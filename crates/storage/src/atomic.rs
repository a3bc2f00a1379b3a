// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file primitives.
//!
//! Writes go to `<path>.tmp.<pid>` then rename over the target, so readers
//! never observe a torn document. JSONL appends are single `O_APPEND`
//! writes; readers must tolerate a partial trailing line (crash during
//! append) and corrupt documents read as "no value" rather than failing
//! the caller.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Create a directory (and parents) if missing.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let pid = std::process::id();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!("{name}.tmp.{pid}"))
}

/// Serialize `value` and atomically replace `path` via temp-rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_path(path);
    let json = serde_json::to_vec_pretty(value)?;
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&json)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a JSON document; missing or corrupt files read as `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt JSON document, ignoring");
            None
        }
    }
}

/// Append one JSON line to a JSONL file with a single write.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

/// Read all parseable lines of a JSONL file, skipping corrupt or partial ones.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str(l) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping corrupt JSONL line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
