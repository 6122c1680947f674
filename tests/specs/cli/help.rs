use crate::prelude::cli;

#[test]
fn version_flag_prints_the_crate_version() {
    cli()
        .args(&["--version"])
        .passes()
        .stdout_has(env!("CARGO_PKG_VERSION"));
}

#[test]
fn help_flag_lists_the_control_subcommands() {
    let run = cli().args(&["--help"]).passes();
    let stdout = run.stdout();
    for name in ["status", "stop", "unblock", "poll", "daemon"] {
        assert!(stdout.contains(name), "--help output missing `{name}`:\n{stdout}");
    }
}

#[test]
fn missing_subcommand_fails_with_usage() {
    cli().fails();
}

#[test]
fn unknown_subcommand_fails() {
    cli().args(&["frobnicate"]).fails();
}
