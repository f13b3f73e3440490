//! Remote operations an archive job needs, independent of the Slack wire client.

use async_trait::async_trait;
use courier_slack_runtime::{SlackApiClient, SlackApiError, SlackHistoryPage};
use tracing::debug;

use crate::{ArchiveError, ChannelRef};

/// A channel resolved from a [`ChannelRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveChannel {
    pub id: String,
    pub name: String,
    pub is_member: bool,
}

#[async_trait]
pub trait ArchivePlatform: Send + Sync {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ArchiveChannel, ArchiveError>;

    /// One page of history, newest first, plus the cursor for the next page.
    async fn history_page(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<SlackHistoryPage, ArchiveError>;

    async fn user_display_name(&self, user_id: &str) -> Result<String, ArchiveError>;

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, ArchiveError>;

    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        title: &str,
        bytes: &[u8],
    ) -> Result<(), ArchiveError>;

    async fn post_notice(&self, channel_id: &str, text: &str) -> Result<(), ArchiveError>;
}

#[async_trait]
impl ArchivePlatform for SlackApiClient {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ArchiveChannel, ArchiveError> {
        let resolved = match channel {
            ChannelRef::Id(id) => self
                .conversation_info(id)
                .await
                .map_err(|error| ArchiveError::from_slack(error, id))?,
            ChannelRef::Name(name) => self
                .find_channel_by_name(name)
                .await
                .map_err(|error| ArchiveError::from_slack(error, name))?
                .ok_or_else(|| ArchiveError::ChannelNotFound(name.clone()))?,
        };
        debug!(
            channel_id = resolved.id.as_str(),
            channel_name = resolved.name.as_str(),
            is_member = ?resolved.is_member,
            "resolved slack channel"
        );
        Ok(ArchiveChannel {
            name: if resolved.name.trim().is_empty() {
                resolved.id.clone()
            } else {
                resolved.name
            },
            id: resolved.id,
            // Direct messages and group DMs omit `is_member`; history access decides there.
            is_member: resolved.is_member.unwrap_or(true),
        })
    }

    async fn history_page(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<SlackHistoryPage, ArchiveError> {
        SlackApiClient::history_page(self, channel_id, cursor)
            .await
            .map_err(|error| ArchiveError::from_slack(error, channel_id))
    }

    async fn user_display_name(&self, user_id: &str) -> Result<String, ArchiveError> {
        self.user_info(user_id)
            .await
            .map(|user| user.display_name())
            .map_err(|error| ArchiveError::from_slack(error, user_id))
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        self.download_file(url)
            .await
            .map_err(|error| ArchiveError::from_slack(error, url))
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        title: &str,
        bytes: &[u8],
    ) -> Result<(), ArchiveError> {
        self.upload_file_v2(channel_id, filename, title, bytes, None)
            .await
            .map(|_| ())
            .map_err(|error| upload_failure(filename, error))
    }

    async fn post_notice(&self, channel_id: &str, text: &str) -> Result<(), ArchiveError> {
        self.post_message(channel_id, text, None)
            .await
            .map(|_| ())
            .map_err(|error| ArchiveError::from_slack(error, channel_id))
    }
}

/// Every upload error, auth codes included, is an upload failure: the local
/// artifacts already exist when uploads start.
fn upload_failure(filename: &str, error: SlackApiError) -> ArchiveError {
    ArchiveError::UploadFailure {
        filename: filename.to_string(),
        reason: error.to_string(),
    }
}
