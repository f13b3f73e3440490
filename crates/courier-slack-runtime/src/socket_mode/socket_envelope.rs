//! Socket Mode envelope decoding and trigger normalization.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::{SlackTriggerEvent, SlackTriggerKind};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(super) struct SlackSocketEnvelope {
    #[serde(default)]
    pub(super) envelope_id: String,
    #[serde(rename = "type")]
    pub(super) envelope_type: String,
    #[serde(default)]
    pub(super) payload: Value,
}

#[derive(Debug, Deserialize)]
struct SlackEventCallbackEnvelope {
    #[serde(rename = "type")]
    callback_type: String,
    event_id: String,
    #[serde(default)]
    event_time: u64,
    event: SlackEventPayload,
}

#[derive(Debug, Deserialize)]
struct SlackEventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    inviter: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    event_ts: Option<String>,
}

/// Decodes one websocket frame; control frames yield `None`.
pub(super) fn parse_socket_envelope(message: WsMessage) -> Result<Option<SlackSocketEnvelope>> {
    let raw = match message {
        WsMessage::Text(text) => text.as_str().to_string(),
        WsMessage::Binary(bytes) => {
            String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
            return Ok(None)
        }
    };
    serde_json::from_str::<SlackSocketEnvelope>(&raw)
        .map(Some)
        .context("failed to parse slack socket envelope")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(super) fn normalize_socket_envelope(
    envelope: &SlackSocketEnvelope,
    bot_user_id: &str,
) -> Result<Option<SlackTriggerEvent>> {
    if envelope.envelope_type != "events_api" {
        return Ok(None);
    }

    let callback = serde_json::from_value::<SlackEventCallbackEnvelope>(envelope.payload.clone())
        .context("failed to decode slack event callback payload")?;
    if callback.callback_type != "event_callback" {
        return Ok(None);
    }

    let event = callback.event;
    if event.subtype.as_deref() == Some("bot_message") {
        return Ok(None);
    }
    let Some(channel_id) = non_empty(event.channel) else {
        return Ok(None);
    };
    let user_id = non_empty(event.user);

    let (kind, requested_by, ts) = match event.event_type.as_str() {
        "app_mention" => {
            let Some(user_id) = user_id else {
                return Ok(None);
            };
            if user_id == bot_user_id {
                return Ok(None);
            }
            let Some(ts) = non_empty(event.ts) else {
                return Ok(None);
            };
            (SlackTriggerKind::AppMention, Some(user_id), ts)
        }
        "member_joined_channel" => {
            if user_id.as_deref() != Some(bot_user_id) {
                return Ok(None);
            }
            let Some(ts) = non_empty(event.event_ts).or_else(|| non_empty(event.ts)) else {
                return Ok(None);
            };
            (
                SlackTriggerKind::BotJoinedChannel,
                non_empty(event.inviter),
                ts,
            )
        }
        _ => return Ok(None),
    };

    let key = format!("{}:{}:{}", callback.event_id, channel_id, ts);
    Ok(Some(SlackTriggerEvent {
        key,
        kind,
        event_id: callback.event_id,
        occurred_unix_ms: callback.event_time.saturating_mul(1000),
        channel_id,
        requested_by,
        ts,
    }))
}

pub(super) fn event_is_stale(
    event: &SlackTriggerEvent,
    max_event_age_seconds: u64,
    now_unix_ms: u64,
) -> bool {
    if max_event_age_seconds == 0 || event.occurred_unix_ms == 0 {
        return false;
    }
    let max_age_ms = max_event_age_seconds.saturating_mul(1000);
    now_unix_ms.saturating_sub(event.occurred_unix_ms) > max_age_ms
}
