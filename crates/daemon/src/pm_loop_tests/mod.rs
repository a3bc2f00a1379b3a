// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process loop tests over the fake gateway, launcher, and clock.

use super::*;
use crate::lifecycle::Config;
use pilot_adapters::{AgentSpawner, FakeProcessLauncher, FakeTaskGateway};
use pilot_core::{
    generate_session_id, BusEvent, EventType, FakeClock, Policy, SessionId, SessionRole, TaskInfo,
};
use pilot_storage::{
    CheckpointStore, MessageBus, OvernightStore, PmStateStore, PressureTracker, SessionRegistry,
    StatePaths,
};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

mod scans;
mod scenarios;

pub(crate) struct Rig {
    _dir: TempDir,
    pub paths: StatePaths,
    pub clock: FakeClock,
    pub gateway: FakeTaskGateway,
    pub launcher: FakeProcessLauncher,
    pub registry: SessionRegistry<FakeClock>,
    pub bus: MessageBus<FakeClock>,
    pub pm_session_id: SessionId,
    pub pm_loop: PmLoop<FakeTaskGateway, FakeProcessLauncher, FakeClock>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_policy(Policy::default())
    }

    pub fn with_policy(policy: Policy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = StatePaths::new(dir.path());
        let clock = FakeClock::new(1_000_000);
        let gateway = FakeTaskGateway::new();
        let launcher = FakeProcessLauncher::new();
        let registry = SessionRegistry::new(paths.clone(), clock.clone());
        let bus = MessageBus::new(paths.clone(), clock.clone());

        let pm_session_id = generate_session_id(clock.epoch_ms());
        registry
            .record_start(&pm_session_id, std::process::id(), 1, SessionRole::Pm)
            .unwrap();

        let cfg = Config {
            project_root: dir.path().to_path_buf(),
            policy,
            tick: Duration::from_secs(5),
            max_agents: 4,
            budget_usd: None,
            dry_run: false,
            agent_program: "fake-agent".to_string(),
            agent_args: Vec::new(),
        };

        let spawner = AgentSpawner::new(paths.clone(), clock.clone(), launcher.clone())
            .with_cooldown(Duration::from_secs(10));

        let deps = LoopDeps {
            cfg,
            clock: clock.clone(),
            registry: registry.clone(),
            bus: bus.clone(),
            gateway: gateway.clone(),
            spawner,
            pressure: PressureTracker::new(paths.clone(), clock.clone()),
            checkpoints: CheckpointStore::new(paths.clone(), clock.clone()),
            overnight: OvernightStore::new(paths.clone(), clock.clone()),
            audit: AuditLogs::new(paths.clone(), clock.clone()),
            pm_store: PmStateStore::new(paths.clone()),
            collab: Collaborators::default(),
            engine: PolicyEngine::default(),
            state: PmState {
                pm_session_id: Some(pm_session_id.clone()),
                started_at: clock.epoch_ms(),
                ..Default::default()
            },
            pm_session_id: pm_session_id.clone(),
            scaler_state: ScalerState::default(),
            last_scale_eval_ms: 0,
            scaling: ScalingAction::Hold,
            last_pool: PoolSnapshot::default(),
            seen_events: HashSet::new(),
        };

        Rig {
            _dir: dir,
            paths,
            clock,
            gateway,
            launcher,
            registry,
            bus,
            pm_session_id,
            pm_loop: PmLoop::new(deps, None),
        }
    }

    pub async fn tick(&mut self) {
        self.pm_loop.tick().await;
    }

    pub fn advance(&self, ms: u64) {
        self.clock.advance(ms);
    }

    /// Register an agent session as a started child would.
    pub fn agent_session(&self, name: &str, role: SessionRole) -> SessionId {
        let id = SessionId::new(name);
        self.registry.record_start(&id, 4242, 1, role).unwrap();
        id
    }

    /// Publish an agent-authored event to PM.
    pub fn publish(&self, from: &SessionId, topic: &str, payload: serde_json::Value) {
        let event = BusEvent::new(
            self.clock.epoch_ms(),
            EventType::Notify,
            from.as_str(),
            pilot_core::PM,
            topic,
            payload,
        );
        self.bus.publish(&event).unwrap();
    }

    /// All events a given consumer would observe, replayed from the start
    /// of the bus file (no offsets consumed).
    pub fn events_for(&self, consumer: &str) -> Vec<BusEvent> {
        let Ok(text) = std::fs::read_to_string(self.paths.bus_file()) else {
            return Vec::new();
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str::<BusEvent>(l).ok())
            .filter(|e| e.is_for(consumer))
            .collect()
    }

    pub fn state(&self) -> &PmState {
        &self.pm_loop.deps.state
    }
}

pub(crate) fn task(id: &str, title: &str) -> TaskInfo {
    TaskInfo::new(id, title)
}

pub(crate) fn task_payload(task_id: &str) -> serde_json::Value {
    json!({ "data": { "task_id": task_id } })
}
