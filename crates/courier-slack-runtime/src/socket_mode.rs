//! Socket Mode listener that turns bot mentions and invitations into archive triggers.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use courier_core::current_unix_timestamp_ms;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{info, warn};

use crate::SlackApiClient;

mod socket_envelope;
mod socket_state_store;

use socket_envelope::{
    event_is_stale, normalize_socket_envelope, parse_socket_envelope, SlackSocketEnvelope,
};
use socket_state_store::ProcessedEventStore;

const SOCKET_STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlackTriggerKind {
    /// The bot was `@`-mentioned in a channel.
    AppMention,
    /// The bot itself joined (was invited to) a channel.
    BotJoinedChannel,
}

impl SlackTriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppMention => "app_mention",
            Self::BotJoinedChannel => "member_joined_channel",
        }
    }
}

/// A normalized event that should start an archive job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackTriggerEvent {
    pub key: String,
    pub kind: SlackTriggerKind,
    pub event_id: String,
    pub occurred_unix_ms: u64,
    pub channel_id: String,
    /// User who mentioned or invited the bot, when Slack reports one.
    pub requested_by: Option<String>,
    pub ts: String,
}

/// Receives archive triggers; the listener awaits each call before reading the next event.
#[async_trait]
pub trait SlackEventHandler: Send {
    async fn handle_trigger(&mut self, event: SlackTriggerEvent) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SocketModeConfig {
    pub state_dir: PathBuf,
    pub bot_user_id: Option<String>,
    pub processed_event_cap: usize,
    pub max_event_age_seconds: u64,
    pub reconnect_delay: Duration,
}

impl Default for SocketModeConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".courier/slack"),
            bot_user_id: None,
            processed_event_cap: 10_000,
            max_event_age_seconds: 7_200,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Runs the Socket Mode loop until Ctrl-C, reconnecting after transport failures.
pub async fn run_socket_mode<H: SlackEventHandler>(
    client: SlackApiClient,
    config: SocketModeConfig,
    handler: &mut H,
) -> Result<()> {
    let mut runtime = SocketModeRuntime::new(client, config).await?;
    runtime.run(handler).await
}

struct SocketModeRuntime {
    client: SlackApiClient,
    config: SocketModeConfig,
    state_store: ProcessedEventStore,
    bot_user_id: String,
}

enum SessionEnd {
    Shutdown,
    Reconnect,
}

impl SocketModeRuntime {
    async fn new(client: SlackApiClient, config: SocketModeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir)
            .with_context(|| format!("failed to create {}", config.state_dir.display()))?;

        let bot_user_id = match config.bot_user_id.clone() {
            Some(user_id) if !user_id.trim().is_empty() => user_id.trim().to_string(),
            _ => client.auth_test().await?.user_id,
        };
        let state_store = ProcessedEventStore::load(
            config.state_dir.join("state.json"),
            config.processed_event_cap,
        )?;

        Ok(Self {
            client,
            config,
            state_store,
            bot_user_id,
        })
    }

    async fn run<H: SlackEventHandler>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            match self.client.open_socket_connection().await {
                Ok(socket_url) => {
                    info!("slack socket connected");
                    match self.run_socket_session(&socket_url, handler).await {
                        Ok(SessionEnd::Shutdown) => {
                            info!("slack listener shutdown requested");
                            return Ok(());
                        }
                        Ok(SessionEnd::Reconnect) => {}
                        Err(error) => warn!("slack socket session error: {error:#}"),
                    }
                }
                Err(error) if error.is_auth_failure() => {
                    return Err(error).context("slack app token was rejected");
                }
                Err(error) => warn!("slack listener failed to open socket connection: {error}"),
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("slack listener shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    async fn run_socket_session<H: SlackEventHandler>(
        &mut self,
        socket_url: &str,
        handler: &mut H,
    ) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(SessionEnd::Shutdown);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Reconnect);
                    };
                    let message = message_result.context("failed reading slack websocket message")?;
                    let Some(envelope) = parse_socket_envelope(message)? else {
                        continue;
                    };
                    if !envelope.envelope_id.is_empty() {
                        ack_envelope(&mut sink, &envelope.envelope_id).await?;
                    }
                    if envelope.envelope_type == "disconnect" {
                        info!("slack requested socket refresh");
                        return Ok(SessionEnd::Reconnect);
                    }
                    self.handle_envelope(envelope, handler).await?;
                }
            }
        }
    }

    async fn handle_envelope<H: SlackEventHandler>(
        &mut self,
        envelope: SlackSocketEnvelope,
        handler: &mut H,
    ) -> Result<()> {
        let Some(event) = normalize_socket_envelope(&envelope, &self.bot_user_id)? else {
            return Ok(());
        };

        if self.state_store.contains(&event.key) {
            info!(key = %event.key, "skipping duplicate slack event");
            return Ok(());
        }
        let stale = event_is_stale(
            &event,
            self.config.max_event_age_seconds,
            current_unix_timestamp_ms(),
        );
        if self.state_store.mark_processed(&event.key) {
            self.state_store.save()?;
        }
        if stale {
            info!(key = %event.key, "skipping stale slack event");
            return Ok(());
        }

        info!(
            kind = event.kind.as_str(),
            channel = %event.channel_id,
            event_id = %event.event_id,
            "archive trigger received"
        );
        if let Err(error) = handler.handle_trigger(event).await {
            warn!("archive trigger handler failed: {error:#}");
        }
        Ok(())
    }
}

async fn ack_envelope<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id }).to_string();
    sink.send(WsMessage::Text(ack.into()))
        .await
        .context("failed to send slack socket ack")
}
