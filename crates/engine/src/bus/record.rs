// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The append-only bus record envelope: one JSON object per line in
//! `events.jsonl` / `actions.jsonl`, plus the byte-offset cursor reader.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wharf_core::{Action, Clock, Event};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("io error on bus file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed bus record in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BusRecord {
    Event {
        ts: String,
        #[serde(rename = "schemaVersion")]
        schema_version: u32,
        data: Event,
    },
    Action {
        ts: String,
        #[serde(rename = "schemaVersion")]
        schema_version: u32,
        data: Action,
    },
}

impl BusRecord {
    pub fn event(clock: &impl Clock, data: Event) -> Self {
        BusRecord::Event {
            ts: wharf_core::epoch_ms_to_rfc3339(clock.epoch_ms()),
            schema_version: SCHEMA_VERSION,
            data,
        }
    }

    pub fn action(clock: &impl Clock, data: Action) -> Self {
        BusRecord::Action {
            ts: wharf_core::epoch_ms_to_rfc3339(clock.epoch_ms()),
            schema_version: SCHEMA_VERSION,
            data,
        }
    }
}

/// Append one record to a bus file: open-append-close, one line, newline
/// terminated. Concurrent writers within a process are serialized by the
/// dispatcher's single-threaded tick loop, so no locking is needed here.
pub fn append(path: &Path, record: &BusRecord) -> Result<(), BusError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BusError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    let line = serde_json::to_string(record).map_err(|source| BusError::Json {
        path: path.display().to_string(),
        source,
    })?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| BusError::Io {
            path: path.display().to_string(),
            source,
        })?;
    writeln!(file, "{line}").map_err(|source| BusError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Result of a cursor read: the complete records found plus the offset to
/// resume from next time.
pub struct CursorRead {
    pub records: Vec<BusRecord>,
    pub new_offset: u64,
}

/// One line's parsed record (`None` if the line was malformed) plus the
/// byte length of the line (including the trailing newline), so a caller
/// that only partially consumes a batch (the action-routing
/// halt-on-retryable-failure case) can advance the cursor by exactly the
/// lines it handled — a malformed line still has a `len` to account for,
/// so the running offset always lands on a line boundary.
pub struct RecordLine {
    pub record: Option<BusRecord>,
    pub len: u64,
}

fn read_complete_tail(path: &Path, since_offset: u64) -> Result<Vec<u8>, BusError> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(BusError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    file.seek(SeekFrom::Start(since_offset))
        .map_err(|source| BusError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|source| BusError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match buf.iter().rposition(|&b| b == b'\n') {
        Some(last_newline) => {
            buf.truncate(last_newline + 1);
            Ok(buf)
        }
        None => Ok(Vec::new()),
    }
}

/// Read `path` from `since_offset` to EOF, parsing only the complete
/// (newline-terminated) lines in that slice. A partial write (a line still
/// being appended when this is called) is simply not returned yet; the
/// next call picks it up once the writer finishes it, since the offset
/// only ever advances past a line's trailing newline.
///
/// A malformed line is dropped rather than failing the whole read; the
/// offset still advances past it so a single corrupt line cannot wedge
/// the cursor forever.
pub fn read_since(path: &Path, since_offset: u64) -> Result<CursorRead, BusError> {
    let complete = read_complete_tail(path, since_offset)?;
    let mut records = Vec::new();
    for line in complete.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        if let Ok(record) = serde_json::from_slice::<BusRecord>(line) {
            records.push(record);
        }
    }
    Ok(CursorRead {
        records,
        new_offset: since_offset + complete.len() as u64,
    })
}

/// Like [`read_since`], but keeps each line's byte length so a caller can
/// advance the cursor past fewer than all of them. A malformed line is
/// still returned, as a `RecordLine` with `record: None`, so its byte span
/// is accounted for by whatever offset arithmetic the caller does over the
/// returned lines' `len` — dropping it outright would undercount and leave
/// the cursor permanently off the next line's boundary.
pub fn read_lines_since(path: &Path, since_offset: u64) -> Result<Vec<RecordLine>, BusError> {
    let complete = read_complete_tail(path, since_offset)?;
    let mut lines = Vec::new();
    for line in complete.split_inclusive(|&b| b == b'\n') {
        if line == [b'\n'] {
            continue;
        }
        lines.push(RecordLine {
            record: serde_json::from_slice::<BusRecord>(line).ok(),
            len: line.len() as u64,
        });
    }
    Ok(lines)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
