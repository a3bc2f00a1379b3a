// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus event schema and topic classification.
//!
//! Events travel as single JSON lines on the append-only bus. Topics are an
//! open dotted namespace rather than a closed enum; the classifier below is
//! the single authority for mapping topics to PM actions, and unknown topics
//! are classified [`EventAction::LogOnly`] so they surface in the action log
//! instead of disappearing.

use crate::id::sortable_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reserved recipient consumed only by the PM daemon.
pub const PM: &str = "PM";

/// The broadcast recipient observed by every subscriber.
pub const BROADCAST: &str = "*";

/// Event delivery type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Notify,
    Request,
    Response,
    Broadcast,
}

/// Event priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A single event on the message bus.
///
/// Append-only: an event is never edited after publication. Consumers track
/// their own byte offset and must treat delivery as at-least-once, keying
/// idempotency on `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: String,
    /// Epoch milliseconds at publication
    pub ts: u64,
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Sender session id (or "PM")
    pub from: String,
    /// Recipient: a session id, "PM", or "*"
    pub to: String,
    /// Dotted topic path, e.g. `task.complete`
    pub topic: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub payload: Value,
}

impl BusEvent {
    pub fn new(
        ts: u64,
        kind: EventType,
        from: impl Into<String>,
        to: impl Into<String>,
        topic: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: sortable_id("E", ts),
            ts,
            kind,
            from: from.into(),
            to: to.into(),
            topic: topic.into(),
            priority: Priority::Normal,
            ttl_ms: None,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// An event with a ttl older than `now - ttl_ms` is skipped by readers.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now_ms.saturating_sub(self.ts) > ttl,
            None => false,
        }
    }

    /// Routing: point-to-point by recipient id, `"*"` observed by everyone.
    pub fn is_for(&self, consumer: &str) -> bool {
        self.to == consumer || self.to == BROADCAST
    }

    /// Topic-specific discriminator carried as `payload.action`.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }

    /// Structured payload data carried as `payload.data`.
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data")
    }
}

/// What the PM loop should do with an observed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    AssignNext,
    TrackClaim,
    RespondToAgent,
    HandleError,
    GreetAgent,
    CleanupSession,
    ReviewMerge,
    TrackProgress,
    ProcessHealth,
    LogOnly,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::AssignNext => "assign_next",
            EventAction::TrackClaim => "track_claim",
            EventAction::RespondToAgent => "respond_to_agent",
            EventAction::HandleError => "handle_error",
            EventAction::GreetAgent => "greet_agent",
            EventAction::CleanupSession => "cleanup_session",
            EventAction::ReviewMerge => "review_merge",
            EventAction::TrackProgress => "track_progress",
            EventAction::ProcessHealth => "process_health",
            EventAction::LogOnly => "log_only",
        }
    }
}

/// Map a topic to the PM action.
///
/// Unknown topics are deliberately not dropped: they classify as `LogOnly`
/// and are recorded for review.
pub fn classify_topic(topic: &str) -> EventAction {
    match topic {
        "task.complete" => EventAction::AssignNext,
        "task.claimed" => EventAction::TrackClaim,
        "session.start" => EventAction::GreetAgent,
        "session.end" => EventAction::CleanupSession,
        "merge.request" => EventAction::ReviewMerge,
        "step.complete" => EventAction::TrackProgress,
        "health.report" => EventAction::ProcessHealth,
        t if t == "agent.question" || t.ends_with(".help") => EventAction::RespondToAgent,
        t if t == "agent.error" || t.contains("test_failure") => EventAction::HandleError,
        _ => EventAction::LogOnly,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
