// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escalation policy engine.
//!
//! Each `(event-kind, session, task)` signal carries a monotonic level that
//! maps to the next response action. Levels decay once the underlying
//! condition stops repeating, so a recovered agent climbs back down instead
//! of being killed for last week's failures.

use pilot_core::{SessionId, TaskId};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default silence before a level steps down.
pub const DECAY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    Noop,
    Notify,
    Reassign,
    Kill,
    HumanEscalate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SignalKey {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl SignalKey {
    pub fn new(
        kind: impl Into<String>,
        session_id: Option<SessionId>,
        task_id: Option<TaskId>,
    ) -> Self {
        Self {
            kind: kind.into(),
            session_id,
            task_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SignalLevel {
    pub count: u32,
    pub last_at: u64,
}

/// Maps (signal, repetition) → action with decay.
pub struct PolicyEngine {
    levels: HashMap<SignalKey, SignalLevel>,
    decay_after_ms: u64,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(DECAY_AFTER)
    }
}

impl PolicyEngine {
    pub fn new(decay_after: Duration) -> Self {
        Self {
            levels: HashMap::new(),
            decay_after_ms: decay_after.as_millis() as u64,
        }
    }

    fn action_for(count: u32) -> EscalationAction {
        match count {
            0 => EscalationAction::Noop,
            1 | 2 => EscalationAction::Notify,
            3 => EscalationAction::Reassign,
            4 => EscalationAction::Kill,
            _ => EscalationAction::HumanEscalate,
        }
    }

    /// Record one occurrence and return the action for the new level.
    pub fn record(&mut self, key: SignalKey, now_ms: u64) -> EscalationAction {
        let level = self.levels.entry(key).or_insert(SignalLevel {
            count: 0,
            last_at: now_ms,
        });
        level.count += 1;
        level.last_at = now_ms;
        Self::action_for(level.count)
    }

    /// The condition cleared: drop the signal entirely.
    pub fn clear(&mut self, key: &SignalKey) {
        self.levels.remove(key);
    }

    /// Drop every signal attached to a session (it ended or was replaced).
    pub fn clear_session(&mut self, session: &SessionId) {
        self.levels
            .retain(|k, _| k.session_id.as_ref() != Some(session));
    }

    /// Step quiet signals down one level; returns keys that fully cleared.
    pub fn decay(&mut self, now_ms: u64) -> Vec<SignalKey> {
        let mut cleared = Vec::new();
        for (key, level) in self.levels.iter_mut() {
            if now_ms.saturating_sub(level.last_at) >= self.decay_after_ms {
                level.count = level.count.saturating_sub(1);
                level.last_at = now_ms;
                if level.count == 0 {
                    cleared.push(key.clone());
                }
            }
        }
        for key in &cleared {
            self.levels.remove(key);
        }
        cleared
    }

    pub fn level(&self, key: &SignalKey) -> u32 {
        self.levels.get(key).map(|l| l.count).unwrap_or(0)
    }

    /// Sum of failure counts attributed to a session (scheduler penalty).
    pub fn failure_count(&self, session: &SessionId) -> u32 {
        self.levels
            .iter()
            .filter(|(k, _)| k.session_id.as_ref() == Some(session))
            .map(|(_, l)| l.count)
            .sum()
    }

    pub fn active(&self) -> Vec<(SignalKey, SignalLevel)> {
        let mut out: Vec<(SignalKey, SignalLevel)> = self
            .levels
            .iter()
            .map(|(k, l)| (k.clone(), *l))
            .collect();
        out.sort_by(|a, b| b.1.count.cmp(&a.1.count));
        out
    }
}

#[cfg(test)]
#[path = "escalation_tests.rs"]
mod tests;
