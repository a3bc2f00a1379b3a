// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pilot PM daemon (`pilotd`).
//!
//! `pilotd start` runs the tick loop (long-running `watch` mode, or a
//! single tick with `--once` for cron). `stop`, `status`, and `logs` act
//! on a running daemon through the pid file and persisted state.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use pilot_adapters::{AgentSpawner, CliTaskGateway, OsProcessLauncher};
use pilot_core::{Clock, PmState, ScalerState, ScalingAction, SessionRole, SystemClock};
use pilot_daemon::collab::Collaborators;
use pilot_daemon::escalation::PolicyEngine;
use pilot_daemon::lifecycle::{self, Config, LifecycleError};
use pilot_daemon::watcher::{start_watcher, POLL_INTERVAL};
use pilot_daemon::{LoopDeps, PmLoop};
use pilot_storage::{
    AuditLogs, CheckpointStore, MessageBus, OvernightStore, PmStateStore, PressureTracker,
    SessionRegistry, StatePaths,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

const USAGE: &str = "\
pilotd - Pilot PM daemon

USAGE:
    pilotd start [--once] [--dry-run] [--agents N] [--tick MS] [--budget USD] [--root PATH]
    pilotd stop [--root PATH]
    pilotd status [--root PATH]
    pilotd logs [--lines N] [--root PATH]

OPTIONS:
    --once        Run a single tick and exit (for cron)
    --dry-run     Plan everything, spawn nothing
    --agents N    Total session slots including PM
    --tick MS     Tick interval in milliseconds
    --budget USD  Spend ceiling fed to the autoscaler
    --root PATH   Project root (default: current directory)
    --lines N     Lines of log tail to print (default 50)
";

struct Cli {
    command: String,
    root: PathBuf,
    once: bool,
    dry_run: bool,
    agents: Option<u32>,
    tick_ms: Option<u64>,
    budget_usd: Option<f64>,
    lines: usize,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let Some(command) = args.first() else {
        return Err("missing command".to_string());
    };
    let mut cli = Cli {
        command: command.clone(),
        root: std::env::current_dir().map_err(|e| e.to_string())?,
        once: false,
        dry_run: false,
        agents: None,
        tick_ms: None,
        budget_usd: None,
        lines: 50,
    };

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next()
                .map(|v| v.to_string())
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--once" => cli.once = true,
            "--dry-run" => cli.dry_run = true,
            "--agents" => {
                cli.agents = Some(value_for("--agents")?.parse().map_err(|_| "--agents expects a number".to_string())?)
            }
            "--tick" => {
                cli.tick_ms = Some(value_for("--tick")?.parse().map_err(|_| "--tick expects milliseconds".to_string())?)
            }
            "--budget" => {
                cli.budget_usd = Some(value_for("--budget")?.parse().map_err(|_| "--budget expects a number".to_string())?)
            }
            "--root" => cli.root = PathBuf::from(value_for("--root")?),
            "--lines" => {
                cli.lines = value_for("--lines")?.parse().map_err(|_| "--lines expects a number".to_string())?
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }
    Ok(cli)
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(first) = args.first() {
        match first.as_str() {
            "--help" | "-h" | "help" => {
                println!("pilotd {}", env!("CARGO_PKG_VERSION"));
                print!("{USAGE}");
                return;
            }
            "--version" | "-V" | "-v" => {
                println!("pilotd {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            _ => {}
        }
    }

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("error: {message}");
            eprint!("{USAGE}");
            std::process::exit(1);
        }
    };

    let paths = StatePaths::new(&cli.root);
    let command = cli.command.clone();
    let exit_code = match command.as_str() {
        "start" => cmd_start(cli).await,
        "stop" => cmd_stop(&paths),
        "status" => cmd_status(&paths),
        "logs" => cmd_logs(&paths, cli.lines),
        other => {
            eprintln!("error: unknown command '{other}'");
            eprint!("{USAGE}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn cmd_stop(paths: &StatePaths) -> i32 {
    match lifecycle::stop_daemon(paths) {
        Ok(pid) => {
            println!("sent SIGTERM to pilotd (pid {pid})");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn cmd_status(paths: &StatePaths) -> i32 {
    match lifecycle::status_report(paths, &SystemClock) {
        Ok(report) => {
            print!("{report}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn cmd_logs(paths: &StatePaths, lines: usize) -> i32 {
    match lifecycle::tail_logs(paths, lines) {
        Ok(tail) => {
            println!("{tail}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

async fn cmd_start(cli: Cli) -> i32 {
    let mut config = match Config::load(&cli.root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    if let Some(agents) = cli.agents {
        config.max_agents = agents;
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.tick = Duration::from_millis(tick_ms);
    }
    config.budget_usd = cli.budget_usd;
    config.dry_run = cli.dry_run;

    let paths = config.paths();

    // Rotate the daemon log and leave a marker the CLI can find, before
    // the tracing appender takes over the file
    rotate_log_if_needed(&paths.daemon_log_file());
    write_startup_marker(&paths);

    let _log_guard = match setup_logging(&paths) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: failed to set up logging: {e}");
            return 1;
        }
    };

    match lifecycle::acquire_pid_file(&paths, &SystemClock) {
        Ok(()) => {}
        Err(LifecycleError::AlreadyRunning { pid }) => {
            eprintln!("pilotd is already running");
            eprintln!("  pid: {pid}");
            return 1;
        }
        Err(e) => {
            write_startup_error(&paths, &e);
            error!("failed to start daemon: {e}");
            return 1;
        }
    }

    let code = match run_daemon(config, cli.once).await {
        Ok(()) => 0,
        Err(e) => {
            // Uncaught error path: log and still tear down
            write_startup_error(&paths, &e);
            error!("daemon failed: {e}");
            1
        }
    };
    lifecycle::release_pid_file(&paths);
    info!("daemon stopped");
    code
}

async fn run_daemon(config: Config, once: bool) -> Result<(), LifecycleError> {
    let clock = SystemClock;
    let paths = config.paths();
    let registry = SessionRegistry::new(paths.clone(), clock);

    let pm_session_id = lifecycle::pm_session_id(&clock);
    registry.record_start(
        &pm_session_id,
        std::process::id(),
        std::os::unix::process::parent_id(),
        SessionRole::Pm,
    )?;
    info!(session = %pm_session_id, once, "PM daemon starting");

    let bus = MessageBus::new(paths.clone(), clock);
    let gateway = CliTaskGateway::new(&config.project_root);
    let spawner = AgentSpawner::new(paths.clone(), clock, OsProcessLauncher::new());

    let deps = LoopDeps {
        registry: registry.clone(),
        bus: bus.clone(),
        gateway,
        spawner,
        pressure: PressureTracker::new(paths.clone(), clock),
        checkpoints: CheckpointStore::new(paths.clone(), clock),
        overnight: OvernightStore::new(paths.clone(), clock),
        audit: AuditLogs::new(paths.clone(), clock),
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
        last_pool: Default::default(),
        seen_events: Default::default(),
        clock,
        cfg: config.clone(),
    };

    // In once mode the watcher task is not started; the tick reads the bus
    // inline from the persisted offset
    let watcher = if once {
        None
    } else {
        Some(start_watcher(bus, POLL_INTERVAL))
    };
    let mut pm_loop = PmLoop::new(deps, watcher);

    if once {
        pm_loop.tick().await;
    } else {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let mut tick = tokio::time::interval(config.tick);

        loop {
            tokio::select! {
                _ = tick.tick() => pm_loop.tick().await,
                _ = sigterm.recv() => { info!("received SIGTERM, shutting down"); break; }
                _ = sigint.recv() => { info!("received SIGINT, shutting down"); break; }
                _ = sighup.recv() => { info!("received SIGHUP, shutting down"); break; }
            }
        }
    }

    // Teardown: stop the watcher, persist final state, end the PM session
    pm_loop.stop_watcher();
    let final_state = pm_loop.deps.state.clone();
    if let Err(e) = pm_loop.deps.pm_store.save(&final_state) {
        error!(error = %e, "failed to write final pm-state");
    }
    registry.end(&pm_session_id, "shutdown")?;
    Ok(())
}

/// Maximum daemon log size before startup rotation (10 MiB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated daemon logs kept (`.1` .. `.3`).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log at startup if it has grown too large.
/// Best-effort: failures never block startup.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let base = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let _ = std::fs::rename(format!("{base}.{i}"), format!("{base}.{}", i + 1));
    }
    let _ = std::fs::rename(log_path, format!("{base}.1"));
}

/// Startup marker prefix; the CLI scans for this to find the current run.
const STARTUP_MARKER_PREFIX: &str = "--- pilotd: starting (pid: ";

fn write_startup_marker(paths: &StatePaths) {
    use std::io::Write;
    let path = paths.daemon_log_file();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id());
    }
}

/// Write a startup error synchronously so the CLI sees it even if the
/// process exits before the tracing appender flushes.
fn write_startup_error(paths: &StatePaths, error: &LifecycleError) {
    use std::io::Write;
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.daemon_log_file())
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(
    paths: &StatePaths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = paths.daemon_log_file();
    std::fs::create_dir_all(paths.logs_dir())?;
    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pm-daemon.log".to_string());

    let file_appender = tracing_appender::rolling::never(paths.logs_dir(), file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
