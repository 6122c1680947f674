// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operator control wire format: one JSON object per line over a Unix
//! domain socket. No length prefix and no binary framing — a request is a
//! single newline-terminated JSON value, and so is its response, so the
//! protocol stays readable with nothing fancier than `nc -U`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::dispatcher::PlanSummary;

/// Default timeout for a single request/response round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed before a complete message was received")]
    ConnectionClosed,
    #[error("timed out waiting for a message")]
    Timeout,
}

/// A request sent from `wharf` to `wharfd` over the control socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    /// A snapshot of every tracked plan.
    Status,
    /// Stop a plan's running session/subprocess and mark it blocked.
    Stop { query: String },
    /// Clear a blocked plan's `blocked` flag and retry counter.
    Unblock { query: String },
    /// Run one extra tick for a single plan even if it is otherwise idle.
    Poll { query: String },
    /// Ask the daemon to exit its tick loop after the current tick.
    Shutdown,
}

/// The matching response to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Response {
    Status { plans: Vec<PlanSummary> },
    Ok,
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

/// Write `value` as one JSON line, followed by `\n`, then flush.
pub async fn write_message<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one `\n`-terminated JSON line and decode it. An empty read (EOF
/// before any bytes arrived) is a closed connection, not a parse error.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncBufRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
