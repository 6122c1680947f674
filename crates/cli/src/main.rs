// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wharf — a thin CLI over wharfd's control socket.
//!
//! This is deliberately not a UI onto plan state (that's `wharf/state.json`
//! and the bus files, meant to be read directly or through the CLIs of the
//! assistants wharf drives). It only carries the handful of operator
//! directives the daemon exposes: status, stop, unblock, poll once, and
//! daemon lifecycle management.

mod client;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use client::DaemonClient;
use wharf_storage::RepoLayout;

#[derive(Parser)]
#[command(name = "wharf", version, about = "Operator control for the wharf dispatcher")]
struct Cli {
    /// Repo root to operate on (defaults to the current directory).
    #[arg(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every plan wharfd is tracking.
    Status,
    /// Stop a plan's running session and mark it blocked.
    Stop { query: String },
    /// Clear a blocked plan's blocked flag and retry counter.
    Unblock { query: String },
    /// Run one extra tick for a plan even if it would otherwise be skipped.
    Poll { query: String },
    /// Manage the wharfd process for this repo.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

#[derive(Subcommand)]
enum DaemonCommand {
    /// Start wharfd for this repo if it is not already running.
    Start,
    /// Ask a running wharfd to shut down.
    Stop,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let repo_root = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let layout = RepoLayout::new(repo_root);

    match cli.command {
        Commands::Status => {
            let client = DaemonClient::connect(&layout)?;
            let plans = client.status().await?;
            print_status(&plans);
        }
        Commands::Stop { query } => {
            let client = DaemonClient::connect(&layout)?;
            client.stop(&query).await?;
            println!("stopped {query}");
        }
        Commands::Unblock { query } => {
            let client = DaemonClient::connect(&layout)?;
            client.unblock(&query).await?;
            println!("unblocked {query}");
        }
        Commands::Poll { query } => {
            let client = DaemonClient::connect(&layout)?;
            client.poll_once(&query).await?;
            println!("queued one extra tick for {query}");
        }
        Commands::Daemon { command } => match command {
            DaemonCommand::Start => {
                let client = DaemonClient::connect_or_start(&layout).await?;
                client.status().await?;
                println!("wharfd running for {}", layout.repo_root.display());
            }
            DaemonCommand::Stop => {
                let client = DaemonClient::connect(&layout)?;
                client.shutdown().await?;
                println!("wharfd stopping for {}", layout.repo_root.display());
            }
        },
    }

    Ok(())
}

fn print_status(plans: &[wharf_daemon::PlanSummary]) {
    if plans.is_empty() {
        println!("no plans tracked");
        return;
    }
    for plan in plans {
        let blocked = if plan.blocked { " blocked" } else { "" };
        match &plan.last_error {
            Some(err) => println!("{}\t{}{}\t{}", plan.plan_id, plan.status, blocked, err),
            None => println!("{}\t{}{}", plan.plan_id, plan.status, blocked),
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
