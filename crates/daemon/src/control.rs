// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Unix-socket control listener: accepts one connection at a time,
//! serializes access to the shared [`Dispatcher`] behind a `tokio::sync::Mutex`
//! so a request is handled between ticks rather than racing one.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use wharf_adapters::SessionAdapter;
use wharf_core::Clock;

use crate::dispatcher::Dispatcher;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("io error binding control socket {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the control socket, removing a stale file left by a prior crash
/// first (a fresh `bind` on an existing path always fails).
pub fn bind(socket_path: &Path) -> Result<UnixListener, ControlError> {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    UnixListener::bind(socket_path).map_err(|source| ControlError::Bind {
        path: socket_path.display().to_string(),
        source,
    })
}

/// Accept loop for the control socket. Runs until `shutdown` is notified,
/// at which point it stops accepting new connections; in-flight requests
/// already being handled are left to finish.
pub async fn serve<S, C>(
    listener: UnixListener,
    dispatcher: Arc<Mutex<Dispatcher<S, C>>>,
    shutdown: Arc<Notify>,
) where
    S: SessionAdapter,
    C: Clock,
{
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        let shutdown = Arc::clone(&shutdown);
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, dispatcher, shutdown).await {
                                warn!(error = %err, "control connection failed");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "failed to accept control connection"),
                }
            }
            _ = shutdown.notified() => {
                info!("control listener stopping");
                break;
            }
        }
    }
}

async fn handle_connection<S, C>(
    stream: UnixStream,
    dispatcher: Arc<Mutex<Dispatcher<S, C>>>,
    shutdown: Arc<Notify>,
) -> Result<(), protocol::ProtocolError>
where
    S: SessionAdapter,
    C: Clock,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    let request: Request =
        tokio::time::timeout(DEFAULT_TIMEOUT, protocol::read_message(&mut reader))
            .await
            .map_err(|_| protocol::ProtocolError::Timeout)??;

    let response = handle_request(request, &dispatcher, &shutdown).await;

    tokio::time::timeout(
        DEFAULT_TIMEOUT,
        protocol::write_message(&mut write_half, &response),
    )
    .await
    .map_err(|_| protocol::ProtocolError::Timeout)??;
    Ok(())
}

async fn handle_request<S, C>(
    request: Request,
    dispatcher: &Arc<Mutex<Dispatcher<S, C>>>,
    shutdown: &Arc<Notify>,
) -> Response
where
    S: SessionAdapter,
    C: Clock,
{
    match request {
        Request::Status => {
            let dispatcher = dispatcher.lock().await;
            Response::Status {
                plans: dispatcher.status_snapshot(),
            }
        }
        Request::Stop { query } => {
            let mut dispatcher = dispatcher.lock().await;
            match dispatcher.stop_plan(&query).await {
                Ok(()) => Response::Ok,
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::Unblock { query } => {
            let mut dispatcher = dispatcher.lock().await;
            match dispatcher.unblock_plan(&query) {
                Ok(()) => Response::Ok,
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::Poll { query } => {
            let mut dispatcher = dispatcher.lock().await;
            match dispatcher.request_poll_once(&query) {
                Ok(()) => Response::Ok,
                Err(err) => Response::error(err.to_string()),
            }
        }
        Request::Shutdown => {
            shutdown.notify_waiters();
            Response::Ok
        }
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
