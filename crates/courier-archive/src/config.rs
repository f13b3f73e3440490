//! Explicit configuration passed into every archive job.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use courier_slack_runtime::{SlackApiClient, SlackApiClientConfig, DEFAULT_SLACK_API_BASE};

use crate::ArchiveError;

/// The two Slack tokens the archiver authenticates with. `Debug` never prints them.
#[derive(Clone, Default)]
pub struct SlackCredentials {
    /// Bot token (`xoxb-...`) used for Web API calls.
    pub bot_token: String,
    /// App-level token (`xapp-...`) used to open Socket Mode connections.
    pub connect_token: String,
}

impl SlackCredentials {
    pub fn new(bot_token: impl Into<String>, connect_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            connect_token: connect_token.into(),
        }
    }

    pub fn require_bot_token(&self) -> Result<(), ArchiveError> {
        if self.bot_token.trim().is_empty() {
            return Err(ArchiveError::AuthenticationFailure(
                "missing bot token (set VC_BOT_TOKEN)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_connect_token(&self) -> Result<(), ArchiveError> {
        if self.connect_token.trim().is_empty() {
            return Err(ArchiveError::AuthenticationFailure(
                "missing app-level connect token (set VC_CONNECT_TOKEN)".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SlackCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |token: &str| if token.trim().is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("SlackCredentials")
            .field("bot_token", &mask(&self.bot_token))
            .field("connect_token", &mask(&self.connect_token))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub credentials: SlackCredentials,
    pub api_base: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    /// JSONL file receiving one line per finished job, when set.
    pub ledger_path: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            credentials: SlackCredentials::default(),
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            request_timeout_ms: 180_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
            ledger_path: None,
        }
    }
}

impl ArchiveConfig {
    pub fn slack_client_config(&self) -> SlackApiClientConfig {
        SlackApiClientConfig {
            api_base: self.api_base.clone(),
            app_token: self.credentials.connect_token.clone(),
            bot_token: self.credentials.bot_token.clone(),
            request_timeout_ms: self.request_timeout_ms,
            retry_max_attempts: self.retry_max_attempts,
            retry_base_delay_ms: self.retry_base_delay_ms,
        }
    }

    pub fn slack_client(&self) -> Result<SlackApiClient, ArchiveError> {
        SlackApiClient::new(&self.slack_client_config()).map_err(ArchiveError::Platform)
    }
}

/// How a job names its channel: by ID from an event, or by name from the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Name(String),
}

impl ChannelRef {
    pub fn label(&self) -> &str {
        match self {
            Self::Id(value) | Self::Name(value) => value.as_str(),
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "#{name}"),
        }
    }
}

/// Who asked for the archive; shown in the document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    /// A Slack user ID, resolved to a display name during normalization.
    SlackUser(String),
    /// A local operator name (CLI runs).
    Local(String),
}

impl Requester {
    pub fn label(&self) -> &str {
        match self {
            Self::SlackUser(value) | Self::Local(value) => value.as_str(),
        }
    }
}

/// One end-to-end archive request.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    pub channel: ChannelRef,
    pub output_dir: PathBuf,
    pub post_to_channel: bool,
    pub keep_images: bool,
    /// Download image attachments and embed them in the document.
    pub embed_images: bool,
    pub requested_by: Option<Requester>,
    pub requested_at: DateTime<Utc>,
}

impl ArchiveJob {
    pub fn new(channel: ChannelRef, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            channel,
            output_dir: output_dir.into(),
            post_to_channel: false,
            keep_images: false,
            embed_images: true,
            requested_by: None,
            requested_at: Utc::now(),
        }
    }
}
