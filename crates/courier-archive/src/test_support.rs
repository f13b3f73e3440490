//! In-memory [`ArchivePlatform`] used by the pipeline tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use courier_slack_runtime::{SlackApiError, SlackFile, SlackHistoryPage, SlackMessage};

use crate::{ArchiveChannel, ArchiveError, ArchivePlatform, ChannelRef};

/// A 2x2 opaque red RGB PNG.
pub(crate) const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0xFD, 0xD4, 0x9A,
    0x73, 0x00, 0x00, 0x00, 0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0xDA, 0x63, 0x38, 0x21, 0x27, 0x07,
    0x44, 0x0C, 0x10, 0x0A, 0x00, 0x1F, 0x26, 0x04, 0x11, 0x4A, 0x8E, 0x8D, 0x20, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FakeCalls {
    pub(crate) history_cursors: Vec<Option<String>>,
    pub(crate) user_lookups: Vec<String>,
    pub(crate) downloads: Vec<String>,
    /// `(channel_id, filename, bytes)` per upload.
    pub(crate) uploads: Vec<(String, String, Vec<u8>)>,
    pub(crate) notices: Vec<(String, String)>,
}

pub(crate) struct FakePlatform {
    pub(crate) channel: ArchiveChannel,
    pub(crate) pages: Vec<SlackHistoryPage>,
    pub(crate) users: HashMap<String, String>,
    pub(crate) attachments: HashMap<String, Vec<u8>>,
    pub(crate) history_error: Option<&'static str>,
    pub(crate) rate_limit_users: bool,
    pub(crate) fail_uploads: bool,
    /// Rejects uploads as if the token lacked the file scopes.
    pub(crate) reject_upload_auth: bool,
    calls: Mutex<FakeCalls>,
}

impl FakePlatform {
    /// Serves `messages` (oldest first) as newest-first pages of `page_size`.
    pub(crate) fn with_messages(messages: Vec<SlackMessage>, page_size: usize) -> Self {
        let mut newest_first = messages;
        newest_first.reverse();
        let chunks = newest_first
            .chunks(page_size.max(1))
            .map(<[SlackMessage]>::to_vec)
            .collect::<Vec<_>>();
        let page_count = chunks.len();
        let mut pages = chunks
            .into_iter()
            .enumerate()
            .map(|(index, messages)| SlackHistoryPage {
                messages,
                next_cursor: (index + 1 < page_count).then(|| format!("cursor-{}", index + 1)),
            })
            .collect::<Vec<_>>();
        if pages.is_empty() {
            pages.push(SlackHistoryPage::default());
        }

        let users = [("U1", "Ada Lovelace"), ("U2", "Grace Hopper")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        Self {
            channel: ArchiveChannel {
                id: "C1".to_string(),
                name: "general".to_string(),
                is_member: true,
            },
            pages,
            users,
            attachments: HashMap::new(),
            history_error: None,
            rate_limit_users: false,
            fail_uploads: false,
            reject_upload_auth: false,
            calls: Mutex::new(FakeCalls::default()),
        }
    }

    pub(crate) fn calls(&self) -> FakeCalls {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, update: impl FnOnce(&mut FakeCalls)) {
        update(&mut self.calls.lock().expect("calls lock"));
    }
}

#[async_trait]
impl ArchivePlatform for FakePlatform {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ArchiveChannel, ArchiveError> {
        let matches = match channel {
            ChannelRef::Id(id) => *id == self.channel.id,
            ChannelRef::Name(name) => name
                .trim_start_matches('#')
                .eq_ignore_ascii_case(&self.channel.name),
        };
        if matches {
            Ok(self.channel.clone())
        } else {
            Err(ArchiveError::ChannelNotFound(channel.label().to_string()))
        }
    }

    async fn history_page(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
    ) -> Result<SlackHistoryPage, ArchiveError> {
        self.record(|calls| calls.history_cursors.push(cursor.map(str::to_string)));
        if let Some(code) = self.history_error {
            let error = SlackApiError::Api {
                method: "conversations.history".to_string(),
                code: code.to_string(),
            };
            return Err(ArchiveError::from_slack(error, channel_id));
        }
        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("cursor-")
                .and_then(|index| index.parse::<usize>().ok())
                .ok_or_else(|| {
                    ArchiveError::Platform(SlackApiError::Api {
                        method: "conversations.history".to_string(),
                        code: "invalid_cursor".to_string(),
                    })
                })?,
        };
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn user_display_name(&self, user_id: &str) -> Result<String, ArchiveError> {
        self.record(|calls| calls.user_lookups.push(user_id.to_string()));
        if self.rate_limit_users {
            return Err(ArchiveError::RateLimited("users.info".to_string()));
        }
        self.users.get(user_id).cloned().ok_or_else(|| {
            ArchiveError::Platform(SlackApiError::Api {
                method: "users.info".to_string(),
                code: "user_not_found".to_string(),
            })
        })
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        self.record(|calls| calls.downloads.push(url.to_string()));
        self.attachments.get(url).cloned().ok_or_else(|| {
            ArchiveError::Platform(SlackApiError::HttpStatus {
                method: "file download".to_string(),
                status: 404,
                body: "not found".to_string(),
            })
        })
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        _title: &str,
        bytes: &[u8],
    ) -> Result<(), ArchiveError> {
        if self.reject_upload_auth {
            return Err(ArchiveError::AuthenticationFailure(
                "slack api files.getUploadURLExternal failed: no_permission".to_string(),
            ));
        }
        if self.fail_uploads {
            return Err(ArchiveError::UploadFailure {
                filename: filename.to_string(),
                reason: "file_upload_disabled".to_string(),
            });
        }
        self.record(|calls| {
            calls
                .uploads
                .push((channel_id.to_string(), filename.to_string(), bytes.to_vec()))
        });
        Ok(())
    }

    async fn post_notice(&self, channel_id: &str, text: &str) -> Result<(), ArchiveError> {
        self.record(|calls| calls.notices.push((channel_id.to_string(), text.to_string())));
        Ok(())
    }
}

pub(crate) fn text_message(ts: &str, user: &str, text: &str) -> SlackMessage {
    SlackMessage {
        message_type: Some("message".to_string()),
        user: Some(user.to_string()),
        text: Some(text.to_string()),
        ts: ts.to_string(),
        ..SlackMessage::default()
    }
}

pub(crate) fn slack_file(name: &str, mimetype: &str, url: &str) -> SlackFile {
    SlackFile {
        id: format!("F-{name}"),
        name: Some(name.to_string()),
        title: Some(name.to_string()),
        mimetype: Some(mimetype.to_string()),
        filetype: name.rsplit('.').next().map(str::to_string),
        url_private: Some(format!("{url}?view")),
        url_private_download: Some(url.to_string()),
    }
}
