use std::path::PathBuf;

use clap::Parser;
use courier_archive::{ChannelRef, Requester};
use tracing::level_filters::LevelFilter;

use super::{parse_channel_ref, Cli, CliCommand};
use crate::normalize_legacy_archive_flags;

fn parse(values: &[&str]) -> Cli {
    let args = values.iter().map(|value| value.to_string()).collect::<Vec<_>>();
    Cli::try_parse_from(normalize_legacy_archive_flags(args)).expect("parse cli")
}

#[test]
fn unit_parse_channel_ref_distinguishes_ids_from_names() {
    assert_eq!(
        parse_channel_ref("#general").expect("name"),
        ChannelRef::Name("general".to_string())
    );
    assert_eq!(
        parse_channel_ref("C0123ABCD").expect("id"),
        ChannelRef::Id("C0123ABCD".to_string())
    );
    assert_eq!(
        parse_channel_ref("cats").expect("short name"),
        ChannelRef::Name("cats".to_string())
    );
    assert!(parse_channel_ref("  # ").is_err());
}

#[test]
fn functional_archive_command_builds_job_from_flags() {
    let cli = parse(&[
        "virtual-courier",
        "--bot-token",
        "xoxb-test",
        "archive",
        "general",
        "--output",
        "out",
        "--post",
        "--requested-by",
        "Ops",
    ]);
    let CliCommand::Archive(args) = cli.command else {
        panic!("expected archive command");
    };
    let job = args.to_job();
    assert_eq!(job.channel, ChannelRef::Name("general".to_string()));
    assert_eq!(job.output_dir, PathBuf::from("out"));
    assert!(job.post_to_channel);
    assert!(!job.keep_images);
    assert!(job.embed_images);
    assert_eq!(job.requested_by, Some(Requester::Local("Ops".to_string())));

    let config = cli.slack.archive_config(None);
    assert_eq!(config.credentials.bot_token, "xoxb-test");
    assert_eq!(config.request_timeout_ms, 180_000);
    assert_eq!(config.retry_max_attempts, 3);
}

#[test]
fn functional_legacy_single_dash_flags_parse_like_current_ones() {
    let cli = parse(&[
        "virtual-courier",
        "archive",
        "general",
        "-output",
        "legacy-out",
        "-post",
        "-keep",
    ]);
    let CliCommand::Archive(args) = cli.command else {
        panic!("expected archive command");
    };
    assert_eq!(args.output, PathBuf::from("legacy-out"));
    assert!(args.post);
    assert!(args.keep);
}

#[test]
fn functional_listen_command_builds_listener_config() {
    let cli = parse(&[
        "virtual-courier",
        "listen",
        "--state-dir",
        "state",
        "--reconnect-delay-ms",
        "250",
        "--bot-token",
        "xoxb-test",
        "--connect-token",
        "xapp-test",
    ]);
    let CliCommand::Listen(args) = &cli.command else {
        panic!("expected listen command");
    };
    let config = args.listener_config(&cli.slack);
    assert_eq!(config.state_dir, PathBuf::from("state"));
    assert_eq!(config.ledger_path(), PathBuf::from("state/archive-jobs.jsonl"));
    assert_eq!(config.reconnect_delay.as_millis(), 250);
    assert_eq!(config.archive.credentials.connect_token, "xapp-test");
}

#[test]
fn regression_zero_retry_attempts_are_rejected() {
    let args = ["virtual-courier", "--retry-max-attempts", "0", "archive", "general"]
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>();
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn unit_log_level_defaults_to_info_and_accepts_overrides() {
    assert_eq!(parse(&["virtual-courier", "archive", "general"]).log_level, LevelFilter::INFO);
    let cli = parse(&["virtual-courier", "archive", "general", "--log-level", "debug"]);
    assert_eq!(cli.log_level, LevelFilter::DEBUG);
    assert!(Cli::try_parse_from(["virtual-courier", "--log-level", "loud", "archive", "general"]).is_err());
}
