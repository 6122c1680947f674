// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The repo-local process lock (§4.1, §5 "Mutual exclusion"). Prevents two
//! dispatcher processes from running against the same repository.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another wharf dispatcher (pid {pid}) is already running against this repository")]
    HeldByLivePid { pid: u32 },
    #[error("lock file {path} is held by another process")]
    Contended { path: PathBuf },
    #[error("io error accessing lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An acquired process lock. Held for the lifetime of the process; the OS
/// advisory lock and the file both release on drop.
pub struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl ProcessLock {
    /// Acquire the lock at `path`, creating the file if necessary.
    ///
    /// Checks the liveness of any pid recorded in an existing lock file
    /// first (fast, clear error message), then takes the OS-level advisory
    /// lock as the authoritative guard against races.
    pub fn acquire(path: &Path, started_at_ms: u64) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        if let Some(existing) = read_lock_content(path) {
            if pid_is_alive(existing.pid) {
                return Err(LockError::HeldByLivePid { pid: existing.pid });
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        file.try_lock_exclusive().map_err(|_| LockError::Contended {
            path: path.to_path_buf(),
        })?;

        let content = LockContent {
            pid: std::process::id(),
            started_at: started_at_ms,
        };
        let bytes = serde_json::to_vec(&content).unwrap_or_default();
        file.set_len(0).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        file.write_all(&bytes).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        file.sync_all().map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn release(self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_lock_content(path: &Path) -> Option<LockContent> {
    let mut file = File::open(path).ok()?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).ok()?;
    serde_json::from_str(&buf).ok()
}

fn pid_is_alive(pid: u32) -> bool {
    let system = System::new_all();
    system.process(Pid::from_u32(pid)).is_some()
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
