// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The PM loop: one cooperative tick owning event handling, periodic scans,
//! autoscaling advice, and PmState persistence.
//!
//! Handlers never throw out of the tick: every error becomes an action-log
//! entry and a bump of `PmState.errors`, and the tick continues.

use crate::collab::Collaborators;
use crate::escalation::PolicyEngine;
use crate::handlers;
use crate::lifecycle::Config;
use crate::scans::{self, Scan, ScanResult};
use crate::watcher::{ClassifiedEvent, EventWatcher, MAX_ACTIONS_PER_CYCLE};
use pilot_adapters::{
    AgentSpawner, ProcessLauncher, SpawnError, TaskGateway, TaskGatewayError,
};
use pilot_core::{
    evaluate_scaling, AgentSlot, Clock, PmState, PoolSnapshot, ScalerState, ScalingAction,
    SessionId, SessionRole, SessionState, TaskId,
};
use pilot_storage::{
    ActionKind, AuditLogs, CheckpointStore, MessageBus, OvernightStore, PmStateStore,
    PressureTracker, RegistryError, SessionRegistry, StoreError,
};
use pilot_core::{BusEvent, EventType, Priority, PM};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::{error, warn};

/// Any failure a handler or scan can surface into the tick wrapper.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Gateway(#[from] TaskGatewayError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// Everything the handlers and scans operate on.
pub struct LoopDeps<G: TaskGateway, L: ProcessLauncher, C: Clock> {
    pub cfg: Config,
    pub clock: C,
    pub registry: SessionRegistry<C>,
    pub bus: MessageBus<C>,
    pub gateway: G,
    pub spawner: AgentSpawner<L, C>,
    pub pressure: PressureTracker<C>,
    pub checkpoints: CheckpointStore<C>,
    pub overnight: OvernightStore<C>,
    pub audit: AuditLogs<C>,
    pub pm_store: PmStateStore,
    pub collab: Collaborators,
    pub engine: PolicyEngine,
    pub state: PmState,
    pub pm_session_id: SessionId,
    pub scaler_state: ScalerState,
    pub last_scale_eval_ms: u64,
    /// Latest autoscaler advice, consulted by the task scan
    pub scaling: ScalingAction,
    pub last_pool: PoolSnapshot,
    /// Event ids handled this run (at-least-once guard)
    pub seen_events: HashSet<String>,
}

impl<G: TaskGateway, L: ProcessLauncher, C: Clock> LoopDeps<G, L, C> {
    /// Publish an event authored by PM.
    pub fn publish_from_pm(
        &self,
        kind: EventType,
        to: &str,
        topic: &str,
        payload: Value,
    ) -> Result<(), StoreError> {
        let event = BusEvent::new(self.clock.epoch_ms(), kind, PM, to, topic, payload)
            .with_priority(Priority::Normal);
        self.bus.publish(&event)
    }

    /// Active sessions excluding PM itself.
    pub fn active_agents(&self) -> Vec<SessionState> {
        self.registry
            .active_sessions()
            .into_iter()
            .filter(|s| s.role != SessionRole::Pm)
            .collect()
    }

    /// Idle agents as scheduler slots.
    pub fn idle_slots(&self, now_ms: u64) -> Vec<AgentSlot> {
        self.active_agents()
            .into_iter()
            .filter(|s| !s.claim_is_live(now_ms))
            .map(|s| AgentSlot {
                recent_failures: self.engine.failure_count(&s.id),
                session_id: s.id,
                role: s.role,
                active_task_count: 0,
                budget_headroom_pct: 100,
            })
            .collect()
    }

    /// Tasks excluded from scheduling by overnight bookkeeping: everything
    /// from stopped runs, plus unstarted tasks of a draining run.
    pub fn overnight_excluded(&self) -> HashSet<TaskId> {
        let mut excluded = HashSet::new();
        for run in self.overnight.runs() {
            match run.status {
                pilot_core::OvernightStatus::Stopped => excluded.extend(run.task_ids),
                pilot_core::OvernightStatus::Active if run.drain_requested => {
                    for task in &run.task_ids {
                        if !run.tasks_in_progress.contains(task) {
                            excluded.insert(task.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        excluded
    }

    fn record_action_quiet(&self, source: &str, kind: ActionKind, action: &str, detail: Value) {
        if let Err(e) = self.audit.record_action(source, kind, action, detail) {
            warn!(error = %e, "failed to append action log");
        }
    }

    fn record_tick_error(&mut self, source: &str, err: &TickError) {
        error!(source, error = %err, "tick step failed");
        self.state.record_error(format!("{source}: {err}"));
        self.record_action_quiet(source, ActionKind::Mechanical, "error", json!(err.to_string()));
    }
}

struct ScanSlot<G: TaskGateway, L: ProcessLauncher, C: Clock> {
    scan: Box<dyn Scan<G, L, C>>,
    next_due_ms: u64,
}

/// The tick driver.
pub struct PmLoop<G: TaskGateway, L: ProcessLauncher, C: Clock> {
    pub deps: LoopDeps<G, L, C>,
    scans: Vec<ScanSlot<G, L, C>>,
    watcher: Option<EventWatcher>,
    pending: VecDeque<ClassifiedEvent>,
}

impl<G: TaskGateway + 'static, L: ProcessLauncher, C: Clock> PmLoop<G, L, C> {
    /// Build the loop with the fixed scan order:
    /// health → task → drift → pressure → cost → recovery → escalation →
    /// progress → overnight → analytics.
    pub fn new(deps: LoopDeps<G, L, C>, watcher: Option<EventWatcher>) -> Self {
        let scans = scans::default_scans()
            .into_iter()
            .map(|scan| ScanSlot {
                scan,
                next_due_ms: 0,
            })
            .collect();
        Self {
            deps,
            scans,
            watcher,
            pending: VecDeque::new(),
        }
    }

    pub fn stop_watcher(&mut self) {
        if let Some(watcher) = &mut self.watcher {
            watcher.stop();
        }
    }

    /// One tick: drain events through handlers, then run due scans.
    pub async fn tick(&mut self) {
        let now = self.deps.clock.epoch_ms();
        self.deps.state.tick_count += 1;

        // Pull new events (watcher channel, or the bus directly in
        // once-mode and tests)
        match &mut self.watcher {
            Some(watcher) => self.pending.extend(watcher.try_drain(1024)),
            None => match self.deps.bus.read_new(PM) {
                Ok(events) => self
                    .pending
                    .extend(events.into_iter().map(ClassifiedEvent::classify)),
                Err(e) => {
                    let err = TickError::Store(e);
                    self.deps.record_tick_error("watcher", &err);
                }
            },
        }

        // Drain handlers under the per-cycle cap
        let mut handled = 0;
        while handled < MAX_ACTIONS_PER_CYCLE {
            let Some(classified) = self.pending.pop_front() else {
                break;
            };
            if !self.deps.seen_events.insert(classified.event.id.clone()) {
                continue;
            }
            if let Err(e) = handlers::handle_event(&mut self.deps, now, &classified).await {
                self.deps.record_tick_error(classified.action.as_str(), &e);
            }
            self.deps.state.events_processed += 1;
            handled += 1;
        }
        if !self.pending.is_empty() {
            self.deps.record_action_quiet(
                "watcher",
                ActionKind::Mechanical,
                "throttled",
                json!({ "deferred": self.pending.len() }),
            );
        }

        // Spawner maintenance and PM heartbeat
        self.deps.spawner.check_timeouts();
        self.deps.spawner.count_alive();
        self.deps.spawner.reap();
        if let Err(e) = self.deps.registry.heartbeat(&self.deps.pm_session_id) {
            self.deps.record_tick_error("heartbeat", &TickError::Registry(e));
        }

        // Autoscaler advice
        if let Err(e) = self.maybe_autoscale(now).await {
            self.deps.record_tick_error("autoscaler", &e);
        }

        // Periodic scans in fixed order
        for slot in &mut self.scans {
            if now < slot.next_due_ms {
                continue;
            }
            slot.next_due_ms = now + slot.scan.interval().as_millis() as u64;
            let name = slot.scan.name();
            let kind = slot.scan.kind();
            match slot.scan.run(now, &mut self.deps).await {
                Ok(results) => {
                    for ScanResult { action, detail } in results {
                        self.deps.record_action_quiet(name, kind, &action, detail);
                    }
                }
                Err(e) => self.deps.record_tick_error(name, &e),
            }
        }

        // Persist PmState
        self.deps.state.last_tick_at = now;
        if let Err(e) = self.deps.pm_store.save(&self.deps.state) {
            error!(error = %e, "failed to persist pm-state");
        }
    }

    /// Evaluate scaling on its own interval; the decision persists as
    /// advice for every tick in between.
    async fn maybe_autoscale(&mut self, now_ms: u64) -> Result<(), TickError> {
        let policy = self.deps.cfg.policy.pool_scaling.clone();
        let interval_ms = policy.evaluation_interval_seconds * 1_000;
        if self.deps.last_scale_eval_ms != 0
            && now_ms.saturating_sub(self.deps.last_scale_eval_ms) < interval_ms
        {
            return Ok(());
        }
        self.deps.last_scale_eval_ms = now_ms;

        let ready = self.deps.gateway.ready().await?;
        let claimed = self.deps.registry.claimed_task_ids(None);
        let excluded = self.deps.overnight_excluded();
        let pending_ready = ready
            .iter()
            .filter(|t| !claimed.contains(&t.id) && !excluded.contains(&t.id))
            .count() as u32;

        let agents = self.deps.active_agents();
        let active = agents.len() as u32;
        let idle = agents.iter().filter(|s| !s.claim_is_live(now_ms)).count() as u32;

        let budget_remaining_pct = match self.deps.cfg.budget_usd {
            Some(budget) if budget > 0.0 => {
                let spent = self.deps.collab.cost.total_cost_usd();
                (((budget - spent) / budget) * 100.0).clamp(0.0, 100.0) as u8
            }
            _ => 100,
        };

        let pool = PoolSnapshot {
            active,
            idle,
            pending_ready,
            budget_remaining_pct,
            cpu_pct: self.deps.collab.host.cpu_pct(),
            mem_pct: self.deps.collab.host.mem_pct(),
        };

        let decision = evaluate_scaling(now_ms, pool, &policy, &mut self.deps.scaler_state);
        self.deps.scaling = decision.action;
        self.deps.last_pool = pool;
        self.deps.audit.record_scaling(&decision)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "pm_loop_tests/mod.rs"]
mod tests;
