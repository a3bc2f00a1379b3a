// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed message bus.
//!
//! Events are appended to `messages/bus.jsonl` as single JSON lines; every
//! participant appends, nobody rewrites. Each consumer tracks its own byte
//! offset in `messages/offsets/<consumer>.json` and resumes there after a
//! restart. Delivery is at-least-once; handlers must be idempotent keyed on
//! event id.

use crate::atomic::{append_jsonl, read_json, write_json_atomic, StoreError};
use crate::paths::StatePaths;
use pilot_core::{BusEvent, Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use tracing::warn;

/// Lines longer than this are dropped with a warning.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConsumerOffset {
    offset: u64,
}

#[derive(Debug, Clone)]
pub struct MessageBus<C: Clock = SystemClock> {
    paths: StatePaths,
    clock: C,
}

impl<C: Clock> MessageBus<C> {
    pub fn new(paths: StatePaths, clock: C) -> Self {
        Self { paths, clock }
    }

    /// Append an event to the bus.
    pub fn publish(&self, event: &BusEvent) -> Result<(), StoreError> {
        append_jsonl(&self.paths.bus_file(), event)
    }

    /// The persisted offset for a consumer (0 if none).
    pub fn offset(&self, consumer: &str) -> u64 {
        read_json::<ConsumerOffset>(&self.paths.offset_file(consumer))
            .map(|o| o.offset)
            .unwrap_or(0)
    }

    /// Read events addressed to `consumer` appended since its offset, then
    /// persist the new offset.
    ///
    /// Skips (while still advancing past) expired events, overlong lines,
    /// corrupt lines, and events addressed elsewhere. A partial trailing
    /// line — a crash mid-append — is left for the next poll: the offset
    /// never advances past it.
    pub fn read_new(&self, consumer: &str) -> Result<Vec<BusEvent>, StoreError> {
        let bus_path = self.paths.bus_file();
        let file = match std::fs::File::open(&bus_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let start = self.offset(consumer);
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(start))?;

        let now = self.clock.epoch_ms();
        let mut offset = start;
        let mut events = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    // Non-UTF8 garbage: stop here and retry next poll
                    warn!(offset, "undecodable bus data, deferring");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            if !line.ends_with('\n') {
                // Torn trailing append; retry next poll
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                offset += bytes_read as u64;
                continue;
            }
            if trimmed.len() > MAX_LINE_BYTES {
                warn!(offset, len = trimmed.len(), "oversized bus line dropped");
                offset += bytes_read as u64;
                continue;
            }

            match serde_json::from_str::<BusEvent>(trimmed) {
                Ok(event) => {
                    offset += bytes_read as u64;
                    if event.is_expired(now) {
                        continue;
                    }
                    if event.is_for(consumer) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    warn!(offset, error = %e, "corrupt bus line dropped");
                    offset += bytes_read as u64;
                }
            }
        }

        if offset != start {
            write_json_atomic(&self.paths.offset_file(consumer), &ConsumerOffset { offset })?;
        }
        Ok(events)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
