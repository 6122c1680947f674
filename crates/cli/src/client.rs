// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin client over wharfd's control socket. The CLI is intentionally
//! not a UI onto the dispatcher's state — it only carries the operator
//! directives (status/stop/unblock/poll/shutdown) the protocol exposes.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;

use wharf_daemon::{protocol, PlanSummary, ProtocolError, Request, Response};
use wharf_storage::RepoLayout;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for a single request/response round trip.
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("WHARF_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for a freshly spawned daemon to start accepting.
pub fn timeout_connect() -> Duration {
    parse_duration_ms("WHARF_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Polling interval while waiting for the daemon's socket to appear.
pub fn poll_interval() -> Duration {
    parse_duration_ms("WHARF_CONNECT_POLL_MS").unwrap_or(Duration::from_millis(50))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("wharfd is not running for this repo (no socket at {0})")]
    DaemonNotRunning(PathBuf),
    #[error("failed to start wharfd: {0}")]
    DaemonStartFailed(String),
    #[error("timed out waiting for wharfd to start")]
    DaemonStartTimeout,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("wharfd rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected response from wharfd")]
    UnexpectedResponse,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an already-running daemon; error if there isn't one.
    pub fn connect(layout: &RepoLayout) -> Result<Self, ClientError> {
        let socket_path = layout.socket_path();
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self { socket_path })
    }

    /// Connect, spawning `wharfd <repo-root>` in the background and waiting
    /// for its socket to appear if one is not already running.
    pub async fn connect_or_start(layout: &RepoLayout) -> Result<Self, ClientError> {
        match Self::connect(layout) {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning(_)) => {
                let child = start_daemon_background(&layout.repo_root)?;
                Self::connect_with_retry(layout, timeout_connect(), child).await
            }
            Err(e) => Err(e),
        }
    }

    async fn connect_with_retry(
        layout: &RepoLayout,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(ClientError::DaemonStartFailed(format!(
                    "wharfd exited with {status}"
                )));
            }
            match Self::connect(layout) {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning(_)) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(ClientError::DaemonStartTimeout)
    }

    async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        tokio::time::timeout(timeout_ipc(), protocol::write_message(&mut write_half, request))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        let response = tokio::time::timeout(timeout_ipc(), protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        Ok(response)
    }

    pub async fn status(&self) -> Result<Vec<PlanSummary>, ClientError> {
        match self.send(&Request::Status).await? {
            Response::Status { plans } => Ok(plans),
            other => Self::reject(other),
        }
    }

    pub async fn stop(&self, query: &str) -> Result<(), ClientError> {
        self.send_simple(&Request::Stop {
            query: query.to_string(),
        })
        .await
    }

    pub async fn unblock(&self, query: &str) -> Result<(), ClientError> {
        self.send_simple(&Request::Unblock {
            query: query.to_string(),
        })
        .await
    }

    pub async fn poll_once(&self, query: &str) -> Result<(), ClientError> {
        self.send_simple(&Request::Poll {
            query: query.to_string(),
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send_simple(&Request::Shutdown).await
    }

    async fn send_simple(&self, request: &Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn reject<T>(response: Response) -> Result<T, ClientError> {
        match response {
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Spawn `wharfd <repo-root>` detached from the CLI's own stdio, so it
/// survives the CLI process exiting.
fn start_daemon_background(repo_root: &std::path::Path) -> Result<std::process::Child, ClientError> {
    let exe = std::env::current_exe()?
        .parent()
        .map(|dir| dir.join("wharfd"))
        .unwrap_or_else(|| PathBuf::from("wharfd"));

    std::process::Command::new(exe)
        .arg(repo_root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
