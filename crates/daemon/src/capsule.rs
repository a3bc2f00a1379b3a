// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context capsule: the prompt assembled for a spawned or assigned agent.

use pilot_core::TaskInfo;
use std::fmt::Write as _;

/// Everything an agent gets to know at launch.
#[derive(Debug, Clone, Default)]
pub struct ContextCapsule {
    pub task: Option<TaskInfo>,
    /// Checkpoint restoration block for resumed work
    pub resume: Option<String>,
    /// Approved plan, if one exists
    pub plan: Option<String>,
    pub research_notes: Vec<String>,
    pub decisions: Vec<String>,
    /// Input artifacts already available
    pub artifacts: Vec<String>,
}

impl ContextCapsule {
    pub fn for_task(task: TaskInfo) -> Self {
        Self {
            task: Some(task),
            ..Default::default()
        }
    }

    pub fn with_resume(mut self, resume: impl Into<String>) -> Self {
        self.resume = Some(resume.into());
        self
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Render to the plain-text prompt injected as a launch argument.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(task) = &self.task {
            let _ = writeln!(out, "# Task {}: {}", task.id, task.title);
            if !task.description.is_empty() {
                let _ = writeln!(out, "\n{}", task.description);
            }
            if !task.labels.is_empty() {
                let _ = writeln!(out, "\nLabels: {}", task.labels.join(", "));
            }
        }
        if let Some(resume) = &self.resume {
            let _ = writeln!(out, "\n{resume}");
        }
        if let Some(plan) = &self.plan {
            let _ = writeln!(out, "\n## Approved plan\n\n{plan}");
        }
        if !self.research_notes.is_empty() {
            let _ = writeln!(out, "\n## Research notes");
            for note in &self.research_notes {
                let _ = writeln!(out, "- {note}");
            }
        }
        if !self.decisions.is_empty() {
            let _ = writeln!(out, "\n## Decisions so far");
            for decision in &self.decisions {
                let _ = writeln!(out, "- {decision}");
            }
        }
        if !self.artifacts.is_empty() {
            let _ = writeln!(out, "\n## Available input artifacts");
            for artifact in &self.artifacts {
                let _ = writeln!(out, "- {artifact}");
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "capsule_tests.rs"]
mod tests;
