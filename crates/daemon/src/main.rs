// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wharfd — the background process that owns a single repo's tick loop.
//!
//! `wharfd` is typically started by the `wharf` CLI and should not be
//! invoked directly. It holds the repo's process lock, drives the
//! dispatcher on an interval, and serves the operator control surface
//! (status/stop/unblock/poll/shutdown) on a Unix domain socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

use wharf_adapters::TmuxAdapter;
use wharf_core::{Clock, SystemClock};
use wharf_daemon::{Dispatcher, EventEmitter};
use wharf_engine::bus::{bridges_from_config, RegisteredBridge};
use wharf_engine::{HookEngine, LocalReviewProvider, PlatformReviewProvider, ReviewProviderRegistry};
use wharf_storage::{Config, ProcessLock, RepoLayout, State, DEFAULT_LOCAL_DIR_NAME};

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Startup marker prefix written to the log before anything else, so the
/// CLI can find where the current startup attempt begins.
const STARTUP_MARKER_PREFIX: &str = "--- wharfd: starting (pid: ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("wharfd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("wharfd {}", env!("CARGO_PKG_VERSION"));
                println!("wharf's daemon - drives one repo's plans through the tick loop");
                println!();
                println!("USAGE:");
                println!("    wharfd <repo-root>");
                println!();
                println!("wharfd is typically started by the `wharf` CLI and should not be");
                println!("invoked directly. It listens on a Unix socket under <repo-root>/wharf");
                println!("for commands from `wharf`.");
                return Ok(());
            }
            _ => {}
        }
    }

    let repo_root = repo_root_arg()?;
    let layout = RepoLayout::new(repo_root);
    std::fs::create_dir_all(layout.local_root())?;

    rotate_log_if_needed(&layout.log_path());
    write_startup_marker(&layout)?;
    let log_guard = setup_logging(&layout)?;

    info!(repo = %layout.repo_root.display(), "starting wharfd");

    let lock = match ProcessLock::acquire(&layout.lock_path(), SystemClock.epoch_ms()) {
        Ok(lock) => lock,
        Err(err) => {
            write_startup_error(&layout, &err);
            error!(error = %err, "another wharfd is already running for this repo");
            drop(log_guard);
            std::process::exit(1);
        }
    };
    std::fs::write(layout.pid_path(), std::process::id().to_string())?;

    let config = Config::load(&layout.config_path())?;
    let state = State::load(&layout.state_path())?;
    let tick_interval = Duration::from_millis(config.bus.tick_interval_ms);

    let bridges = match bridges_from_config(&config.bridges) {
        Ok(bridges) => bridges,
        Err(err) => {
            error!(error = %err, "failed to build bus bridges from config");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let mut reviews = ReviewProviderRegistry::new("local");
    reviews.register(Arc::new(LocalReviewProvider::new(DEFAULT_LOCAL_DIR_NAME)));
    if let Some(platform_bridge) = config
        .review
        .github
        .as_ref()
        .and_then(|settings| settings.get("bridge"))
        .and_then(|name| name.as_str())
        .and_then(|name| bridges.get(name))
        .and_then(RegisteredBridge::as_inbound)
    {
        reviews.register(Arc::new(PlatformReviewProvider::new(platform_bridge.clone())));
    }

    let dispatcher = Dispatcher::new(
        layout.clone(),
        config,
        state,
        SystemClock,
        TmuxAdapter::new(),
        bridges,
        HookEngine::new(),
        reviews,
        EventEmitter::default(),
    );
    let dispatcher = Arc::new(Mutex::new(dispatcher));

    let listener = wharf_daemon::bind(&layout.socket_path())?;
    let shutdown = Arc::new(Notify::new());

    let control_dispatcher = Arc::clone(&dispatcher);
    let control_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        wharf_daemon::serve(listener, control_dispatcher, control_shutdown).await;
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut tick_timer = tokio::time::interval(tick_interval);

    info!(socket = %layout.socket_path().display(), "wharfd ready");
    println!("READY");

    loop {
        tokio::select! {
            _ = tick_timer.tick() => {
                let mut d = dispatcher.lock().await;
                if let Err(err) = d.tick().await {
                    error!(error = %err, "tick failed");
                }
            }
            _ = shutdown.notified() => {
                info!("shutdown requested via control socket");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(layout.socket_path());
    let _ = std::fs::remove_file(layout.pid_path());
    lock.release();
    info!("wharfd stopped");
    Ok(())
}

fn repo_root_arg() -> Result<PathBuf, std::io::Error> {
    match std::env::args().nth(1) {
        Some(arg) => Ok(PathBuf::from(arg)),
        None => std::env::current_dir(),
    }
}

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`]. Shifts
/// `daemon.log` -> `daemon.log.1` -> `daemon.log.2` -> `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn write_startup_marker(layout: &RepoLayout) -> std::io::Result<()> {
    use std::io::Write;

    if let Some(parent) = layout.log_path().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(layout.log_path())?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())
}

fn write_startup_error(layout: &RepoLayout, error: &wharf_storage::LockError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(layout.log_path())
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start wharfd: {error}");
}

fn setup_logging(
    layout: &RepoLayout,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = layout.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().expect("log path always has a parent"),
        log_path.file_name().expect("log path always has a file name"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
