// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pilot-daemon: the PM daemon (`pilotd`).
//!
//! One cooperative tick-driven loop owns the event watcher drain, the
//! periodic scans, autoscaling advice, and all PmState writes. Agent
//! children run as parallel OS processes and talk back only through the
//! bus and state files.

pub mod capsule;
pub mod collab;
pub mod dispatch;
pub mod env;
pub mod escalation;
pub mod handlers;
pub mod lifecycle;
pub mod pm_loop;
pub mod scans;
pub mod watcher;

pub use capsule::ContextCapsule;
pub use collab::Collaborators;
pub use escalation::{EscalationAction, PolicyEngine, SignalKey};
pub use lifecycle::{Config, LifecycleError, PidFile};
pub use pm_loop::{LoopDeps, PmLoop};
pub use watcher::{ClassifiedEvent, EventWatcher, MAX_ACTIONS_PER_CYCLE};
