//! Test helpers for wharf's black-box CLI/daemon specifications.
//!
//! These tests invoke the real `wharf` and `wharfd` binaries against a
//! throwaway git repository and assert on stdout/stderr/exit codes plus
//! the on-disk state wharfd leaves behind.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

/// Returns the path to a binary, checking llvm-cov's target directory
/// first, then falling back to resolving relative to the test binary
/// itself when `CARGO_MANIFEST_DIR` is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn wharf_binary() -> PathBuf {
    binary_path("wharf")
}

pub fn wharfd_binary() -> PathBuf {
    binary_path("wharfd")
}

/// High-level CLI builder for fluent test assertions.
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
}

pub fn cli() -> CliBuilder {
    CliBuilder {
        args: Vec::new(),
        dir: None,
    }
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    pub fn command(self) -> Command {
        let mut cmd = Command::new(wharf_binary());
        cmd.args(&self.args);
        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("wharf should run");
        assert!(
            output.status.success(),
            "expected wharf to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("wharf should run");
        assert!(
            !output.status.success(),
            "expected wharf to fail, but it passed\nstdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain {expected:?}\nstdout: {stdout}"
        );
        self
    }
}

pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 3000;

/// Poll `condition` until it returns true or the timeout elapses.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .expect("git should run");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// A throwaway git repository wharf commands run against.
pub struct Project {
    dir: tempfile::TempDir,
}

impl Project {
    /// An initialized repo with one commit on `main`, ready for wharf to
    /// manage (activation needs at least one commit to branch from).
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]);
        git(dir.path(), &["config", "user.email", "wharf-tests@example.com"]);
        git(dir.path(), &["config", "user.name", "wharf tests"]);
        std::fs::write(dir.path().join("README.md"), "test repo\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "initial commit"]);
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn wharf(&self) -> CliBuilder {
        cli().pwd(self.path())
    }

    pub fn wharf_dir(&self) -> PathBuf {
        self.path().join("wharf")
    }

    pub fn state_json(&self) -> String {
        std::fs::read_to_string(self.wharf_dir().join("state.json"))
            .unwrap_or_else(|_| "(no state.json)".to_string())
    }

    /// Write a plan directly into the inbox, as something external to
    /// wharf (a human, another tool) would.
    pub fn seed_inbox_plan(&self, plan_id: &str, markdown: &str, agent: &str) {
        let inbox_dir = self.wharf_dir().join("inbox");
        std::fs::create_dir_all(&inbox_dir).unwrap();
        std::fs::write(inbox_dir.join(format!("{plan_id}.md")), markdown).unwrap();
        let meta = serde_json::json!({
            "status": "queued",
            "metadata": { "agent": agent },
        });
        std::fs::write(
            inbox_dir.join(format!("{plan_id}.json")),
            serde_json::to_string_pretty(&meta).unwrap(),
        )
        .unwrap();
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let mut cmd = self.wharf().args(&["daemon", "stop"]).command();
        cmd.stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        let _ = cmd.status();
    }
}
