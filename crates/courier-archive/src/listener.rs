//! Socket Mode entry point: mentions and bot invitations start archive jobs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_slack_runtime::{
    run_socket_mode, SlackEventHandler, SlackTriggerEvent, SocketModeConfig,
};
use tracing::{info, warn};

use crate::job::{record_job_outcome, run_archive_job_with_platform};
use crate::ledger::JobLedger;
use crate::{ArchiveConfig, ArchiveError, ArchiveJob, ArchivePlatform, ChannelRef, Requester};

pub const WORKING_NOTICE: &str = "Working on it! I'll send a CSV and PDF in a few minutes.";

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub archive: ArchiveConfig,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub processed_event_cap: usize,
    pub max_event_age_seconds: u64,
    pub reconnect_delay: Duration,
}

impl ListenerConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join("archive-jobs.jsonl")
    }
}

/// Human-readable failure text posted back into the channel.
pub fn failure_notice(error: &ArchiveError) -> String {
    match error {
        ArchiveError::NotAMember(_) => {
            "I can't read this channel's history yet. Invite me to the channel and mention me again."
                .to_string()
        }
        ArchiveError::RateLimited(_) => {
            "Slack is rate limiting me right now. Please try again in a few minutes.".to_string()
        }
        ArchiveError::AuthenticationFailure(_) => {
            "My Slack credentials were rejected. Ask an administrator to check the bot token."
                .to_string()
        }
        other => format!("Sorry, I couldn't archive this channel: {other}"),
    }
}

/// Runs one archive job per trigger, posting to the originating channel.
pub struct MentionArchiveHandler<P> {
    platform: P,
    output_dir: PathBuf,
    ledger: Option<JobLedger>,
}

impl<P> MentionArchiveHandler<P>
where
    P: ArchivePlatform,
{
    pub fn new(platform: P, output_dir: PathBuf, ledger: Option<JobLedger>) -> Self {
        Self {
            platform,
            output_dir,
            ledger,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    fn job_for(&self, event: &SlackTriggerEvent) -> ArchiveJob {
        let requested_at = i64::try_from(event.occurred_unix_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .filter(|_| event.occurred_unix_ms > 0)
            .unwrap_or_else(Utc::now);
        ArchiveJob {
            channel: ChannelRef::Id(event.channel_id.clone()),
            output_dir: self.output_dir.clone(),
            post_to_channel: true,
            keep_images: false,
            embed_images: true,
            requested_by: event.requested_by.clone().map(Requester::SlackUser),
            requested_at,
        }
    }
}

#[async_trait]
impl<P> SlackEventHandler for MentionArchiveHandler<P>
where
    P: ArchivePlatform,
{
    async fn handle_trigger(&mut self, event: SlackTriggerEvent) -> Result<()> {
        info!(
            kind = event.kind.as_str(),
            channel_id = event.channel_id.as_str(),
            event_key = event.key.as_str(),
            "archive requested"
        );
        if let Err(error) = self
            .platform
            .post_notice(&event.channel_id, WORKING_NOTICE)
            .await
        {
            warn!(error = %error, "failed to post working notice");
        }

        let job = self.job_for(&event);
        let result = run_archive_job_with_platform(&self.platform, &job).await;
        if let Some(ledger) = self.ledger.as_ref() {
            record_job_outcome(ledger, &job, &result);
        }

        match result {
            Ok(report) => {
                info!(
                    channel = report.channel.name.as_str(),
                    records = report.record_count,
                    "archive delivered"
                );
            }
            // Delivery already told the channel.
            Err(error @ ArchiveError::UploadFailure { .. }) => {
                warn!(error = %error, "archive saved locally but not delivered");
            }
            Err(error) => {
                if let Err(notice_error) = self
                    .platform
                    .post_notice(&event.channel_id, &failure_notice(&error))
                    .await
                {
                    warn!(error = %notice_error, "failed to post failure notice");
                }
            }
        }
        Ok(())
    }
}

/// Verifies both tokens, then serves archive triggers until Ctrl-C.
pub async fn run_listener(config: &ListenerConfig) -> Result<()> {
    config.archive.credentials.require_bot_token()?;
    config.archive.credentials.require_connect_token()?;
    let client = config.archive.slack_client()?;
    let identity = client
        .auth_test()
        .await
        .map_err(|error| ArchiveError::from_slack(error, "auth.test"))
        .context("failed to verify slack bot token")?;
    info!(
        bot_user_id = identity.user_id.as_str(),
        team = identity.team.as_deref().unwrap_or("unknown"),
        "slack bot authenticated"
    );

    let ledger = match JobLedger::open(config.ledger_path()) {
        Ok(ledger) => Some(ledger),
        Err(error) => {
            warn!("job ledger disabled: {error:#}");
            None
        }
    };
    let socket_config = SocketModeConfig {
        state_dir: config.state_dir.clone(),
        bot_user_id: Some(identity.user_id),
        processed_event_cap: config.processed_event_cap,
        max_event_age_seconds: config.max_event_age_seconds,
        reconnect_delay: config.reconnect_delay,
    };
    let mut handler = MentionArchiveHandler::new(client.clone(), config.output_dir.clone(), ledger);
    run_socket_mode(client, socket_config, &mut handler).await
}
