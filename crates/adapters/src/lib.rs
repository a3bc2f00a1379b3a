// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pilot-adapters: boundaries to the outside world — subprocesses, the
//! external task store, and agent child processes.

pub mod agent;
pub mod subprocess;
pub mod tasks;

pub use agent::{
    AgentSpawner, OsProcessLauncher, ProcessLauncher, SpawnError, SpawnRequest, TrackedAgent,
};
pub use subprocess::{run_with_timeout, CmdOutput, SubprocessError, TASK_CLI_TIMEOUT};
pub use tasks::{CliTaskGateway, TaskDeps, TaskGateway, TaskGatewayError};

#[cfg(any(test, feature = "test-support"))]
pub use agent::fake::FakeProcessLauncher;
#[cfg(any(test, feature = "test-support"))]
pub use tasks::fake::FakeTaskGateway;
