// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch scheduler: pure matching of ready tasks to idle agents.
//!
//! The scheduler only plans; the scan loop issues the actual assignments.
//! At most one assignment per idle agent per batch.

use crate::session::{SessionId, SessionRole};
use crate::task::TaskInfo;
use serde::{Deserialize, Serialize};

/// An idle agent eligible for work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSlot {
    pub session_id: SessionId,
    pub role: SessionRole,
    /// Tasks currently in flight on this session (0 for truly idle agents)
    #[serde(default)]
    pub active_task_count: u32,
    #[serde(default)]
    pub recent_failures: u32,
    /// 0–100, how much of the session's budget remains
    #[serde(default)]
    pub budget_headroom_pct: u8,
}

impl AgentSlot {
    pub fn new(session_id: impl Into<SessionId>, role: SessionRole) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            active_task_count: 0,
            recent_failures: 0,
            budget_headroom_pct: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task: TaskInfo,
    pub session_id: SessionId,
    pub score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unassigned {
    pub task: TaskInfo,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub assignments: Vec<Assignment>,
    pub unassigned: Vec<Unassigned>,
}

/// Score a (task, agent) pairing. Higher is better.
///
/// Role match and load dominate; failures and budget temper; dependency
/// openness (how many tasks this one unblocks) nudges hub tasks forward.
fn score_pair(task: &TaskInfo, agent: &AgentSlot) -> (f64, String) {
    let mut score = 0.0;
    let mut parts: Vec<String> = Vec::new();

    match task.role_hint() {
        Some(role) if role == agent.role => {
            score += 3.0;
            parts.push(format!("role match ({})", role.as_str()));
        }
        Some(_) if agent.role == SessionRole::General => {
            score += 1.0;
            parts.push("generalist fallback".to_string());
        }
        Some(_) => {
            parts.push("role mismatch".to_string());
        }
        None => {
            score += 1.0;
            parts.push("no role requirement".to_string());
        }
    }

    if agent.active_task_count > 0 {
        let penalty = 2.0 * f64::from(agent.active_task_count);
        score -= penalty;
        parts.push(format!("load penalty -{penalty:.1}"));
    }
    if agent.recent_failures > 0 {
        let penalty = f64::from(agent.recent_failures);
        score -= penalty;
        parts.push(format!("recent failures -{penalty:.1}"));
    }

    score += f64::from(agent.budget_headroom_pct) / 100.0;

    if !task.blocks.is_empty() {
        let openness = (task.blocks.len() as f64 * 0.25).min(1.0);
        score += openness;
        parts.push(format!("unblocks {} tasks", task.blocks.len()));
    }

    (score, parts.join(", "))
}

/// Plan at most one assignment per idle agent.
///
/// Tasks are considered in priority order (then oldest first); each picks
/// its best-scoring remaining agent. Tasks that outnumber the agents, or
/// that only have negative-scoring pairings, land in `unassigned`.
pub fn plan_assignments(ready: &[TaskInfo], idle: &[AgentSlot]) -> SchedulePlan {
    let mut plan = SchedulePlan::default();
    let mut free: Vec<&AgentSlot> = idle.iter().collect();

    let mut ordered: Vec<&TaskInfo> = ready.iter().collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
    });

    for task in ordered {
        if free.is_empty() {
            plan.unassigned.push(Unassigned {
                task: task.clone(),
                reason: "no idle agents".to_string(),
            });
            continue;
        }

        let mut best: Option<(usize, f64, String)> = None;
        for (i, agent) in free.iter().enumerate() {
            let (score, rationale) = score_pair(task, agent);
            if best.as_ref().is_none_or(|(_, s, _)| score > *s) {
                best = Some((i, score, rationale));
            }
        }

        match best {
            Some((i, score, rationale)) if score > 0.0 => {
                let agent = free.remove(i);
                plan.assignments.push(Assignment {
                    task: task.clone(),
                    session_id: agent.session_id.clone(),
                    score,
                    rationale,
                });
            }
            _ => {
                plan.unassigned.push(Unassigned {
                    task: task.clone(),
                    reason: "no suitable agent (all scores non-positive)".to_string(),
                });
            }
        }
    }

    plan
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
