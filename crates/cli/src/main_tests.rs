use clap::Parser;

use super::*;

#[test]
fn status_parses_with_no_extra_arguments() {
    let cli = Cli::parse_from(["wharf", "status"]);
    assert!(matches!(cli.command, Commands::Status));
}

#[test]
fn directory_flag_is_captured_before_the_subcommand() {
    let cli = Cli::parse_from(["wharf", "-C", "/tmp/repo", "status"]);
    assert_eq!(cli.directory, Some(PathBuf::from("/tmp/repo")));
}

#[test]
fn stop_requires_a_query_argument() {
    let cli = Cli::parse_from(["wharf", "stop", "plan-1"]);
    match cli.command {
        Commands::Stop { query } => assert_eq!(query, "plan-1"),
        _ => panic!("expected Stop"),
    }
}

#[test]
fn unblock_and_poll_both_take_a_query() {
    let unblock = Cli::parse_from(["wharf", "unblock", "plan-2"]);
    match unblock.command {
        Commands::Unblock { query } => assert_eq!(query, "plan-2"),
        _ => panic!("expected Unblock"),
    }

    let poll = Cli::parse_from(["wharf", "poll", "plan-3"]);
    match poll.command {
        Commands::Poll { query } => assert_eq!(query, "plan-3"),
        _ => panic!("expected Poll"),
    }
}

#[test]
fn daemon_start_and_stop_parse_as_nested_subcommands() {
    let start = Cli::parse_from(["wharf", "daemon", "start"]);
    assert!(matches!(
        start.command,
        Commands::Daemon {
            command: DaemonCommand::Start
        }
    ));

    let stop = Cli::parse_from(["wharf", "daemon", "stop"]);
    assert!(matches!(
        stop.command,
        Commands::Daemon {
            command: DaemonCommand::Stop
        }
    ));
}

#[test]
fn missing_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["wharf"]).is_err());
}

#[test]
fn print_status_reports_no_plans_tracked_when_empty() {
    // print_status only writes to stdout; this just confirms it does not
    // panic on the empty case callers hit for a freshly-initialized repo.
    print_status(&[]);
}
