use super::*;
use crate::session::FakeSessionAdapter;

#[tokio::test]
async fn execute_with_tmux_writes_prompt_and_records_a_recording_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = AssistantAdapter::new(FakeSessionAdapter::new());
    let req = ExecuteRequest::new(dir.path(), "do the thing").with_tmux("plan-1");

    let handle = adapter.execute(AgentKind::Codex, req).await.unwrap();

    assert!(handle.tmux_session.is_some());
    assert!(handle.pid.is_none());
    assert_eq!(
        tokio::fs::read_to_string(&handle.prompt_path).await.unwrap(),
        "do the thing"
    );
}

#[tokio::test]
async fn execute_claude_includes_pregenerated_session_id_flag() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = FakeSessionAdapter::new();
    let adapter = AssistantAdapter::new(sessions.clone());
    let req = ExecuteRequest::new(dir.path(), "hi")
        .with_tmux("plan-2")
        .with_session_id("11111111-1111-1111-1111-111111111111");

    adapter.execute(AgentKind::Claude, req).await.unwrap();

    let calls = sessions.calls();
    let cmd = calls
        .iter()
        .find_map(|c| match c {
            crate::session::SessionCall::Spawn { cmd, .. } => Some(cmd.clone()),
            _ => None,
        })
        .unwrap();
    assert!(cmd.contains("--session-id 11111111-1111-1111-1111-111111111111"));
}

#[tokio::test]
async fn execute_codex_does_not_include_session_id_flag() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = FakeSessionAdapter::new();
    let adapter = AssistantAdapter::new(sessions.clone());
    let req = ExecuteRequest::new(dir.path(), "hi")
        .with_tmux("plan-3")
        .with_session_id("should-not-appear");

    adapter.execute(AgentKind::Codex, req).await.unwrap();

    let calls = sessions.calls();
    let cmd = calls
        .iter()
        .find_map(|c| match c {
            crate::session::SessionCall::Spawn { cmd, .. } => Some(cmd.clone()),
            _ => None,
        })
        .unwrap();
    assert!(!cmd.contains("--session-id"));
}

#[tokio::test]
async fn execute_manual_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = AssistantAdapter::new(FakeSessionAdapter::new());
    let req = ExecuteRequest::new(dir.path(), "hi");
    let err = adapter.execute(AgentKind::Manual, req).await.unwrap_err();
    assert!(matches!(err, AdapterError::ManualNotExecutable));
}

#[tokio::test]
async fn resume_uses_the_per_assistant_resume_syntax() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = FakeSessionAdapter::new();
    let adapter = AssistantAdapter::new(sessions.clone());
    let req = ExecuteRequest::new(dir.path(), "continue").with_tmux("plan-4");

    adapter
        .resume(AgentKind::Opencode, "sess-1", req)
        .await
        .unwrap();

    let calls = sessions.calls();
    let cmd = calls
        .iter()
        .find_map(|c| match c {
            crate::session::SessionCall::Spawn { cmd, .. } => Some(cmd.clone()),
            _ => None,
        })
        .unwrap();
    assert!(cmd.starts_with("opencode --session sess-1"));
}

#[tokio::test]
async fn detached_execute_spawns_a_process_and_eventually_records_an_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = AssistantAdapter::new(FakeSessionAdapter::new());
    // No `codex` binary need exist: `sh -c` still runs and the wrapped
    // command line fails with "command not found", which is enough to
    // exercise the pid-tracking and exit-code-writing path end to end.
    let req = ExecuteRequest::new(dir.path(), "hi");
    let handle = adapter.execute(AgentKind::Codex, req).await.unwrap();

    assert!(handle.tmux_session.is_none());
    assert!(handle.pid.is_some());

    for _ in 0..50 {
        if tokio::fs::try_exists(&handle.exitcode_path).await.unwrap() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(tokio::fs::try_exists(&handle.exitcode_path).await.unwrap());
}

#[tokio::test]
async fn poll_completion_reports_found_once_exitcode_file_appears() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = FakeSessionAdapter::new();
    let exitcode_path = dir.path().join("worker.exitcode");
    tokio::fs::write(&exitcode_path, "0\n").await.unwrap();

    let handle = ExecutionHandle {
        tmux_session: None,
        pid: Some(1234),
        prompt_path: dir.path().join("worker.prompt"),
        log_path: dir.path().join("worker.log"),
        exitcode_path,
    };

    let outcome = poll_completion(&sessions, &handle, Duration::from_secs(5)).await;
    assert_eq!(outcome, CompletionOutcome::Found);
}

#[tokio::test]
async fn poll_completion_reports_session_died_when_tmux_session_vanishes() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = FakeSessionAdapter::new();
    sessions.add_session("wharf-plan-5", false);

    let handle = ExecutionHandle {
        tmux_session: Some("wharf-plan-5".to_string()),
        pid: None,
        prompt_path: dir.path().join("worker.prompt"),
        log_path: dir.path().join("worker.log"),
        exitcode_path: dir.path().join("worker.exitcode"),
    };

    let outcome = poll_completion(&sessions, &handle, Duration::from_secs(5)).await;
    assert_eq!(outcome, CompletionOutcome::SessionDied);
}

#[tokio::test]
async fn poll_completion_times_out_when_nothing_ever_appears() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = FakeSessionAdapter::new();
    sessions.add_session("wharf-plan-6", true);

    let handle = ExecutionHandle {
        tmux_session: Some("wharf-plan-6".to_string()),
        pid: None,
        prompt_path: dir.path().join("worker.prompt"),
        log_path: dir.path().join("worker.log"),
        exitcode_path: dir.path().join("worker.exitcode"),
    };

    let outcome = poll_completion(&sessions, &handle, Duration::from_millis(1200)).await;
    assert_eq!(outcome, CompletionOutcome::TimedOut);
}
