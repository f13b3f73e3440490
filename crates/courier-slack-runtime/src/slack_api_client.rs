//! Slack Web API client used by archive jobs and the Socket Mode listener.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::slack_error::SlackApiError;
use crate::slack_helpers::{
    is_retryable_slack_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use crate::slack_types::{
    SlackAuthIdentity, SlackChannel, SlackHistoryPage, SlackMessage, SlackPostedMessage,
    SlackUploadedFile, SlackUser,
};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const RETRY_ATTEMPT_HEADER: &str = "x-courier-retry-attempt";
const CONVERSATION_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackOpenSocketResponse {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationInfoResponse {
    channel: SlackChannel,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationListResponse {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<SlackResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackHistoryResponse {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<SlackResponseMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackUserInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ts: Option<String>,
    channel: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackGetUploadUrlExternalResponse {
    upload_url: Option<String>,
    file_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackOkResponse {}

/// Connection settings for [`SlackApiClient`]. Token values never appear in `Debug` output.
#[derive(Clone)]
pub struct SlackApiClientConfig {
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for SlackApiClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
            app_token: String::new(),
            bot_token: String::new(),
            request_timeout_ms: 180_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl std::fmt::Debug for SlackApiClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApiClientConfig")
            .field("api_base", &self.api_base)
            .field("app_token", &redacted(&self.app_token))
            .field("bot_token", &redacted(&self.bot_token))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

fn redacted(token: &str) -> &'static str {
    if token.trim().is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    app_token: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl std::fmt::Debug for SlackApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApiClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl SlackApiClient {
    pub fn new(config: &SlackApiClientConfig) -> Result<Self, SlackApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("virtual-courier-archive"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|source| SlackApiError::Transport {
                method: "client setup".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            app_token: config.app_token.trim().to_string(),
            bot_token: config.bot_token.trim().to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Validates the bot token and returns the identity it belongs to.
    pub async fn auth_test(&self) -> Result<SlackAuthIdentity, SlackApiError> {
        self.require_bot_token("auth.test")?;
        let identity: SlackAuthIdentity = self
            .call_api("auth.test", || {
                self.http
                    .post(self.endpoint("auth.test"))
                    .bearer_auth(&self.bot_token)
            })
            .await?;
        if identity.user_id.trim().is_empty() {
            return Err(SlackApiError::MissingField {
                method: "auth.test".to_string(),
                field: "user_id",
            });
        }
        Ok(identity)
    }

    /// Requests a Socket Mode websocket URL using the app-level token.
    pub async fn open_socket_connection(&self) -> Result<String, SlackApiError> {
        if self.app_token.is_empty() {
            return Err(SlackApiError::Api {
                method: "apps.connections.open".to_string(),
                code: "not_authed".to_string(),
            });
        }
        let response: SlackOpenSocketResponse = self
            .call_api("apps.connections.open", || {
                self.http
                    .post(self.endpoint("apps.connections.open"))
                    .bearer_auth(&self.app_token)
            })
            .await?;
        response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SlackApiError::MissingField {
                method: "apps.connections.open".to_string(),
                field: "url",
            })
    }

    pub async fn conversation_info(&self, channel: &str) -> Result<SlackChannel, SlackApiError> {
        self.require_bot_token("conversations.info")?;
        let query = [("channel", channel.to_string())];
        let response: SlackConversationInfoResponse = self
            .call_api("conversations.info", || {
                self.http
                    .get(self.endpoint("conversations.info"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Ok(response.channel)
    }

    /// Fetches one page of public and private channels, archived ones included.
    pub async fn list_conversations_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<SlackChannel>, Option<String>), SlackApiError> {
        self.require_bot_token("conversations.list")?;
        let mut query = vec![
            ("types", "public_channel,private_channel".to_string()),
            ("exclude_archived", "false".to_string()),
            ("limit", CONVERSATION_PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor.map(str::trim).filter(|value| !value.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }
        let response: SlackConversationListResponse = self
            .call_api("conversations.list", || {
                self.http
                    .get(self.endpoint("conversations.list"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Ok((
            response.channels,
            next_cursor(response.response_metadata.as_ref()),
        ))
    }

    /// Walks `conversations.list` until a channel whose name matches case-insensitively.
    pub async fn find_channel_by_name(
        &self,
        name: &str,
    ) -> Result<Option<SlackChannel>, SlackApiError> {
        let wanted = name.trim().trim_start_matches('#').to_lowercase();
        let mut cursor: Option<String> = None;
        loop {
            let (channels, next) = self.list_conversations_page(cursor.as_deref()).await?;
            if let Some(channel) = channels
                .into_iter()
                .find(|channel| channel.name.to_lowercase() == wanted)
            {
                return Ok(Some(channel));
            }
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(None),
            }
        }
    }

    /// Fetches one `conversations.history` page; `next_cursor` is `None` on the last page.
    pub async fn history_page(
        &self,
        channel: &str,
        cursor: Option<&str>,
    ) -> Result<SlackHistoryPage, SlackApiError> {
        self.require_bot_token("conversations.history")?;
        let mut query = vec![
            ("channel", channel.to_string()),
            ("limit", CONVERSATION_PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor.map(str::trim).filter(|value| !value.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }
        let response: SlackHistoryResponse = self
            .call_api("conversations.history", || {
                self.http
                    .get(self.endpoint("conversations.history"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        let next_cursor = if response.has_more {
            next_cursor(response.response_metadata.as_ref())
        } else {
            None
        };
        debug!(
            channel,
            messages = response.messages.len(),
            has_more = next_cursor.is_some(),
            "fetched slack history page"
        );
        Ok(SlackHistoryPage {
            messages: response.messages,
            next_cursor,
        })
    }

    pub async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        self.require_bot_token("users.info")?;
        let query = [("user", user_id.to_string())];
        let response: SlackUserInfoResponse = self
            .call_api("users.info", || {
                self.http
                    .get(self.endpoint("users.info"))
                    .bearer_auth(&self.bot_token)
                    .query(&query)
            })
            .await?;
        Ok(response.user)
    }

    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostedMessage, SlackApiError> {
        self.require_bot_token("chat.postMessage")?;
        let mut payload = json!({
            "channel": channel,
            "text": text,
            "mrkdwn": false,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let response: SlackChatMessageResponse = self
            .call_api("chat.postMessage", || {
                self.http
                    .post(self.endpoint("chat.postMessage"))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;

        Ok(SlackPostedMessage {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts: response.ts.ok_or_else(|| SlackApiError::MissingField {
                method: "chat.postMessage".to_string(),
                field: "ts",
            })?,
        })
    }

    /// Uploads a file with the external-upload flow and shares it into `channel`.
    pub async fn upload_file_v2(
        &self,
        channel: &str,
        filename: &str,
        title: &str,
        bytes: &[u8],
        initial_comment: Option<&str>,
    ) -> Result<SlackUploadedFile, SlackApiError> {
        self.require_bot_token("files.getUploadURLExternal")?;
        if filename.trim().is_empty() {
            return Err(SlackApiError::InvalidRequest(
                "slack files upload requires non-empty filename".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(SlackApiError::InvalidRequest(
                "slack files upload requires non-empty payload".to_string(),
            ));
        }

        let length = bytes.len().to_string();
        let get_upload: SlackGetUploadUrlExternalResponse = self
            .call_api("files.getUploadURLExternal", || {
                self.http
                    .post(self.endpoint("files.getUploadURLExternal"))
                    .bearer_auth(&self.bot_token)
                    .form(&[("filename", filename), ("length", length.as_str())])
            })
            .await?;
        let upload_url = get_upload
            .upload_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SlackApiError::MissingField {
                method: "files.getUploadURLExternal".to_string(),
                field: "upload_url",
            })?;
        let file_id = get_upload
            .file_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SlackApiError::MissingField {
                method: "files.getUploadURLExternal".to_string(),
                field: "file_id",
            })?;

        self.send_with_retry("external file upload", || {
            self.http
                .post(upload_url.as_str())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.to_vec())
        })
        .await?;

        let title = if title.trim().is_empty() {
            filename
        } else {
            title
        };
        let mut complete_payload = json!({
            "files": [{ "id": file_id.clone(), "title": title }],
            "channel_id": channel,
        });
        if let Some(initial_comment) = initial_comment
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            complete_payload["initial_comment"] = Value::String(initial_comment.to_string());
        }

        let _: SlackOkResponse = self
            .call_api("files.completeUploadExternal", || {
                self.http
                    .post(self.endpoint("files.completeUploadExternal"))
                    .bearer_auth(&self.bot_token)
                    .json(&complete_payload)
            })
            .await?;

        Ok(SlackUploadedFile { file_id })
    }

    /// Downloads a `url_private_download` file with bot-token auth.
    pub async fn download_file(&self, url: &str) -> Result<Vec<u8>, SlackApiError> {
        let response = self
            .send_with_retry("file download", || {
                self.http.get(url).bearer_auth(&self.bot_token)
            })
            .await?;
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_start().starts_with("text/html"))
            .unwrap_or(false);
        if is_html {
            return Err(SlackApiError::Decode {
                method: "file download".to_string(),
                message: "slack returned an HTML page instead of file content; check the files:read scope".to_string(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|source| SlackApiError::Transport {
                method: "file download".to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }

    fn require_bot_token(&self, method: &str) -> Result<(), SlackApiError> {
        if self.bot_token.is_empty() {
            return Err(SlackApiError::Api {
                method: method.to_string(),
                code: "not_authed".to_string(),
            });
        }
        Ok(())
    }

    async fn call_api<T, F>(&self, method: &str, builder: F) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(method, builder).await?;
        let payload = response
            .json::<Value>()
            .await
            .map_err(|error| SlackApiError::Decode {
                method: method.to_string(),
                message: error.to_string(),
            })?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            if code == "ratelimited" {
                return Err(SlackApiError::RateLimited {
                    method: method.to_string(),
                    attempts: 1,
                });
            }
            return Err(SlackApiError::Api {
                method: method.to_string(),
                code,
            });
        }
        serde_json::from_value::<T>(payload).map_err(|error| SlackApiError::Decode {
            method: method.to_string(),
            message: error.to_string(),
        })
    }

    async fn send_with_retry<F>(
        &self,
        method: &str,
        mut builder: F,
    ) -> Result<reqwest::Response, SlackApiError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    if attempt < self.retry_max_attempts
                        && is_retryable_slack_status(status.as_u16())
                    {
                        let delay = retry_delay(self.retry_base_delay_ms, attempt, retry_after);
                        debug!(
                            method,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying slack request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if status.as_u16() == 429 {
                        return Err(SlackApiError::RateLimited {
                            method: method.to_string(),
                            attempts: attempt,
                        });
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(SlackApiError::HttpStatus {
                        method: method.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(SlackApiError::Transport {
                        method: method.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}

fn next_cursor(metadata: Option<&SlackResponseMetadata>) -> Option<String> {
    metadata
        .and_then(|metadata| metadata.next_cursor.as_deref())
        .map(str::trim)
        .filter(|cursor| !cursor.is_empty())
        .map(ToOwned::to_owned)
}
