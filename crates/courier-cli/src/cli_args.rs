use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use courier_archive::{
    ArchiveConfig, ArchiveJob, ChannelRef, ListenerConfig, Requester, SlackCredentials,
};
use courier_slack_runtime::DEFAULT_SLACK_API_BASE;
use tracing::level_filters::LevelFilter;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_log_level(value: &str) -> Result<LevelFilter, String> {
    value
        .trim()
        .parse::<LevelFilter>()
        .map_err(|error| format!("invalid log level `{value}`: {error}"))
}

/// Channel IDs are upper-case (`C0123ABCD`); channel names never are.
pub fn parse_channel_ref(value: &str) -> Result<ChannelRef, String> {
    let trimmed = value.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        return Err("channel must not be empty".to_string());
    }
    let looks_like_id = trimmed.len() >= 9
        && matches!(trimmed.as_bytes()[0], b'C' | b'G')
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit());
    if looks_like_id {
        Ok(ChannelRef::Id(trimmed.to_string()))
    } else {
        Ok(ChannelRef::Name(trimmed.to_string()))
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "virtual-courier",
    about = "Archive Slack channel history to CSV and PDF",
    version
)]
pub struct Cli {
    #[arg(
        long = "log-level",
        env = "VC_LOG_LEVEL",
        default_value = "info",
        value_parser = parse_log_level,
        global = true,
        help = "Default log level when RUST_LOG is unset (error, warn, info, debug, trace, off)"
    )]
    pub log_level: LevelFilter,

    #[command(flatten)]
    pub slack: SlackArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Archive one channel and exit.
    Archive(ArchiveArgs),
    /// Serve mention and invitation triggers over Socket Mode until Ctrl-C.
    Listen(ListenArgs),
}

/// Slack connection settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct SlackArgs {
    #[arg(
        long = "bot-token",
        env = "VC_BOT_TOKEN",
        hide_env_values = true,
        global = true,
        help = "Slack bot token for Web API calls (xoxb-...)"
    )]
    pub bot_token: Option<String>,

    #[arg(
        long = "connect-token",
        env = "VC_CONNECT_TOKEN",
        hide_env_values = true,
        global = true,
        help = "Slack app-level token for Socket Mode (xapp-...)"
    )]
    pub connect_token: Option<String>,

    #[arg(
        long = "slack-api-base",
        env = "VC_SLACK_API_BASE",
        default_value = DEFAULT_SLACK_API_BASE,
        global = true,
        help = "Base URL for Slack Web API calls"
    )]
    pub api_base: String,

    #[arg(
        long = "request-timeout-ms",
        env = "VC_REQUEST_TIMEOUT_MS",
        default_value_t = 180_000,
        value_parser = parse_positive_u64,
        global = true,
        help = "Per-request timeout for Slack calls"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "VC_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        global = true,
        help = "Attempts per Slack call before rate limits or server errors become fatal"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "VC_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        global = true,
        help = "Base delay for exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,
}

impl SlackArgs {
    pub fn archive_config(&self, ledger_path: Option<PathBuf>) -> ArchiveConfig {
        ArchiveConfig {
            credentials: SlackCredentials::new(
                self.bot_token.clone().unwrap_or_default(),
                self.connect_token.clone().unwrap_or_default(),
            ),
            api_base: self.api_base.trim_end_matches('/').to_string(),
            request_timeout_ms: self.request_timeout_ms,
            retry_max_attempts: self.retry_max_attempts,
            retry_base_delay_ms: self.retry_base_delay_ms,
            ledger_path,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ArchiveArgs {
    #[arg(value_parser = parse_channel_ref, help = "Channel name (or channel ID) to archive")]
    pub channel: ChannelRef,

    #[arg(
        long,
        env = "VC_OUTPUT_DIR",
        default_value = ".",
        help = "Directory that receives the `<Channel> Archive` folder"
    )]
    pub output: PathBuf,

    #[arg(long, default_value_t = false, help = "Upload the CSV and PDF back to the channel")]
    pub post: bool,

    #[arg(long, default_value_t = false, help = "Keep downloaded images after rendering")]
    pub keep: bool,

    #[arg(
        long = "no-images",
        default_value_t = false,
        help = "Link image attachments instead of downloading and embedding them"
    )]
    pub no_images: bool,

    #[arg(long = "requested-by", help = "Name shown as the requester in the PDF header")]
    pub requested_by: Option<String>,

    #[arg(long = "job-ledger", help = "Append the job outcome to this JSONL file")]
    pub job_ledger: Option<PathBuf>,
}

impl ArchiveArgs {
    pub fn to_job(&self) -> ArchiveJob {
        ArchiveJob {
            post_to_channel: self.post,
            keep_images: self.keep,
            embed_images: !self.no_images,
            requested_by: self
                .requested_by
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| Requester::Local(name.to_string())),
            ..ArchiveJob::new(self.channel.clone(), self.output.clone())
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListenArgs {
    #[arg(
        long,
        env = "VC_OUTPUT_DIR",
        default_value = ".",
        help = "Directory that receives archive folders"
    )]
    pub output: PathBuf,

    #[arg(
        long = "state-dir",
        env = "VC_STATE_DIR",
        default_value = ".courier/slack",
        help = "Directory for processed-event state and the job ledger"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "processed-event-cap",
        default_value_t = 10_000,
        value_parser = parse_positive_usize,
        help = "Maximum processed event keys retained for duplicate detection"
    )]
    pub processed_event_cap: usize,

    #[arg(
        long = "max-event-age-seconds",
        default_value_t = 7_200,
        help = "Ignore events older than this many seconds (0 disables)"
    )]
    pub max_event_age_seconds: u64,

    #[arg(
        long = "reconnect-delay-ms",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Delay before reconnecting after a Socket Mode failure"
    )]
    pub reconnect_delay_ms: u64,
}

impl ListenArgs {
    pub fn listener_config(&self, slack: &SlackArgs) -> ListenerConfig {
        ListenerConfig {
            archive: slack.archive_config(None),
            output_dir: self.output.clone(),
            state_dir: self.state_dir.clone(),
            processed_event_cap: self.processed_event_cap,
            max_event_age_seconds: self.max_event_age_seconds,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests;
