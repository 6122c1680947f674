use crate::prelude::{wait_for, Project, SPEC_WAIT_MAX_MS};

#[test]
fn daemon_start_creates_the_control_socket_and_status_reports_no_plans() {
    let project = Project::new();

    project.wharf().args(&["daemon", "start"]).passes();

    let socket = project.wharf_dir().join("control.sock");
    assert!(socket.exists(), "control.sock was not created: {}", project.state_json());

    project
        .wharf()
        .args(&["status"])
        .passes()
        .stdout_has("no plans tracked");
}

#[test]
fn daemon_start_is_idempotent() {
    let project = Project::new();

    project.wharf().args(&["daemon", "start"]).passes();
    // A second start against the same repo should reuse the running
    // daemon rather than failing to bind an already-claimed lock/socket.
    project.wharf().args(&["daemon", "start"]).passes();
}

#[test]
fn daemon_stop_removes_the_control_socket() {
    let project = Project::new();
    project.wharf().args(&["daemon", "start"]).passes();

    project.wharf().args(&["daemon", "stop"]).passes();

    let socket = project.wharf_dir().join("control.sock");
    let gone = wait_for(SPEC_WAIT_MAX_MS, || !socket.exists());
    assert!(gone, "control.sock still present after daemon stop");
}

#[test]
fn a_queued_manual_plan_is_activated_by_the_tick_loop() {
    let project = Project::new();
    project.seed_inbox_plan(
        "plan-1",
        "# Plan 1\n\n## TODO\n\n- [ ] do the thing\n",
        "manual",
    );

    project.wharf().args(&["daemon", "start"]).passes();

    let activated = wait_for(SPEC_WAIT_MAX_MS, || {
        project
            .wharf()
            .args(&["status"])
            .passes()
            .stdout()
            .contains("plan-1")
    });
    assert!(activated, "plan-1 never appeared in status: {}", project.state_json());

    let status_output = project.wharf().args(&["status"]).passes().stdout();
    assert!(
        status_output.contains("active") || status_output.contains("Active"),
        "expected plan-1 to be active, got: {status_output}"
    );
}

#[test]
fn stop_blocks_an_active_plan() {
    let project = Project::new();
    project.seed_inbox_plan(
        "plan-2",
        "# Plan 2\n\n## TODO\n\n- [ ] do the thing\n",
        "manual",
    );
    project.wharf().args(&["daemon", "start"]).passes();

    wait_for(SPEC_WAIT_MAX_MS, || {
        project
            .wharf()
            .args(&["status"])
            .passes()
            .stdout()
            .contains("plan-2")
    });

    project.wharf().args(&["stop", "plan-2"]).passes();

    let status_output = project.wharf().args(&["status"]).passes().stdout();
    assert!(
        status_output.contains("blocked"),
        "expected plan-2 to be blocked after stop, got: {status_output}"
    );
}

#[test]
fn unblock_clears_a_stopped_plans_blocked_flag() {
    let project = Project::new();
    project.seed_inbox_plan(
        "plan-3",
        "# Plan 3\n\n## TODO\n\n- [ ] do the thing\n",
        "manual",
    );
    project.wharf().args(&["daemon", "start"]).passes();
    wait_for(SPEC_WAIT_MAX_MS, || {
        project
            .wharf()
            .args(&["status"])
            .passes()
            .stdout()
            .contains("plan-3")
    });
    project.wharf().args(&["stop", "plan-3"]).passes();

    project.wharf().args(&["unblock", "plan-3"]).passes();

    let status_output = project.wharf().args(&["status"]).passes().stdout();
    let plan_line = status_output
        .lines()
        .find(|line| line.contains("plan-3"))
        .unwrap_or_default();
    assert!(
        !plan_line.contains("blocked"),
        "expected plan-3 to no longer be blocked, got: {plan_line}"
    );
}
