//! Flattens raw Slack messages into display-ready archive records.

use std::collections::HashMap;
use std::sync::OnceLock;

use courier_core::{format_slack_ts, unique_filename};
use courier_slack_runtime::{SlackFile, SlackMessage};
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::warn;

use crate::{ArchiveError, ArchivePlatform};

pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M%p";
pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%m/%d/%Y at %I:%M %p";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const UNKNOWN_AUTHOR: &str = "Unknown";
const JOIN_AUTHOR: &str = "Slackbot";

const MENTION_PATTERN: &str = r"<@([UW][A-Z0-9]+)(?:\|([^>]*))?>";

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(MENTION_PATTERN).expect("hardcoded mention regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Message,
    ChannelJoin,
    BotMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRecord {
    /// Unique within the owning record.
    pub filename: String,
    pub mimetype: Option<String>,
    /// Link target shown in the CSV and the document.
    pub link_url: String,
    /// Authenticated download URL, when Slack provided one.
    pub download_url: Option<String>,
    pub is_image: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    /// 1-based position in the archive.
    pub sequence: usize,
    pub ts: String,
    pub csv_timestamp: String,
    pub display_timestamp: String,
    pub author: String,
    pub kind: RecordKind,
    pub text: String,
    pub attachments: Vec<AttachmentRecord>,
}

/// User-ID to display-name lookups, one remote call per distinct ID.
#[derive(Debug, Default)]
pub struct UserNameCache {
    names: HashMap<String, String>,
}

impl UserNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, user_id: &str) -> Option<&str> {
        self.names.get(user_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves `user_id`, falling back to the raw ID when the lookup fails.
    ///
    /// Rate limits and authentication failures are not recoverable here and propagate.
    pub async fn resolve<P>(&mut self, platform: &P, user_id: &str) -> Result<String, ArchiveError>
    where
        P: ArchivePlatform + ?Sized,
    {
        if let Some(name) = self.names.get(user_id) {
            return Ok(name.clone());
        }
        let name = match platform.user_display_name(user_id).await {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            Ok(_) => user_id.to_string(),
            Err(
                error @ (ArchiveError::RateLimited(_) | ArchiveError::AuthenticationFailure(_)),
            ) => return Err(error),
            Err(error) => {
                warn!(user_id, error = %error, "user lookup failed; using raw user id");
                user_id.to_string()
            }
        };
        self.names.insert(user_id.to_string(), name.clone());
        Ok(name)
    }
}

/// Produces the single record sequence both exporters consume.
pub struct RecordNormalizer<'a, P: ?Sized> {
    platform: &'a P,
    users: UserNameCache,
}

impl<'a, P> RecordNormalizer<'a, P>
where
    P: ArchivePlatform + ?Sized,
{
    pub fn new(platform: &'a P) -> Self {
        Self {
            platform,
            users: UserNameCache::new(),
        }
    }

    pub fn users(&self) -> &UserNameCache {
        &self.users
    }

    pub async fn resolve_user(&mut self, user_id: &str) -> Result<String, ArchiveError> {
        self.users.resolve(self.platform, user_id).await
    }

    /// Normalizes `messages` (oldest first) into sequence-numbered records.
    pub async fn normalize_all(
        &mut self,
        messages: &[SlackMessage],
    ) -> Result<Vec<NormalizedRecord>, ArchiveError> {
        let mut records = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            records.push(self.normalize(index + 1, message).await?);
        }
        Ok(records)
    }

    pub async fn normalize(
        &mut self,
        sequence: usize,
        message: &SlackMessage,
    ) -> Result<NormalizedRecord, ArchiveError> {
        let (kind, author) = self.author_of(message).await?;
        let text = self
            .substitute_mentions(message.text.as_deref().unwrap_or_default())
            .await?;
        Ok(NormalizedRecord {
            sequence,
            ts: message.ts.clone(),
            csv_timestamp: format_slack_ts(&message.ts, CSV_TIMESTAMP_FORMAT),
            display_timestamp: format_slack_ts(&message.ts, DISPLAY_TIMESTAMP_FORMAT),
            author,
            kind,
            text: decode_slack_text(&text),
            attachments: attachment_records(&message.files),
        })
    }

    async fn author_of(
        &mut self,
        message: &SlackMessage,
    ) -> Result<(RecordKind, String), ArchiveError> {
        match message.subtype.as_deref() {
            Some("channel_join") => return Ok((RecordKind::ChannelJoin, JOIN_AUTHOR.to_string())),
            Some("bot_message") if message.user.is_none() => {
                let name = message
                    .username
                    .as_deref()
                    .or_else(|| {
                        message
                            .bot_profile
                            .as_ref()
                            .and_then(|profile| profile.name.as_deref())
                    })
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNKNOWN_AUTHOR);
                return Ok((RecordKind::BotMessage, name.to_string()));
            }
            _ => {}
        }
        let kind = if message.subtype.as_deref() == Some("bot_message") {
            RecordKind::BotMessage
        } else {
            RecordKind::Message
        };
        match message
            .user
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty())
        {
            Some(user_id) => Ok((kind, self.resolve_user(user_id).await?)),
            None => Ok((kind, UNKNOWN_AUTHOR.to_string())),
        }
    }

    async fn substitute_mentions(&mut self, text: &str) -> Result<String, ArchiveError> {
        let pattern = mention_pattern();
        let mut mentioned = Vec::new();
        for captures in pattern.captures_iter(text) {
            let user_id = captures[1].to_string();
            if !mentioned.contains(&user_id) {
                mentioned.push(user_id);
            }
        }
        for user_id in &mentioned {
            self.resolve_user(user_id).await?;
        }

        let users = &self.users;
        let substituted = pattern.replace_all(text, |captures: &Captures<'_>| {
            let user_id = &captures[1];
            let label = captures
                .get(2)
                .map(|label| label.as_str().trim())
                .filter(|label| !label.is_empty());
            let name = match (users.cached(user_id), label) {
                (Some(name), Some(label)) if name == user_id => label,
                (Some(name), _) => name,
                (None, Some(label)) => label,
                (None, None) => user_id,
            };
            format!("@{name}")
        });
        Ok(substituted.into_owned())
    }
}

/// Decodes Slack's HTML escapes and folds typographic punctuation to ASCII.
pub fn decode_slack_text(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace('\u{2019}', "'")
        .replace('\u{2026}', "...")
}

fn attachment_records(files: &[SlackFile]) -> Vec<AttachmentRecord> {
    let mut taken: Vec<String> = Vec::with_capacity(files.len());
    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let raw_name = file
            .name
            .as_deref()
            .or(file.title.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR);
        let filename = unique_filename(raw_name, &taken);
        taken.push(filename.clone());

        let download_url = file
            .url_private_download
            .as_deref()
            .or(file.url_private.as_deref())
            .map(str::to_string);
        let link_url = file
            .url_private
            .clone()
            .or_else(|| download_url.clone())
            .unwrap_or_default();
        records.push(AttachmentRecord {
            is_image: is_image_file(file, &filename),
            filename,
            mimetype: file.mimetype.clone(),
            link_url,
            download_url,
        });
    }
    records
}

fn is_image_file(file: &SlackFile, filename: &str) -> bool {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    let by_extension = extension
        .as_deref()
        .or(file.filetype.as_deref())
        .map(|extension| IMAGE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    let by_mimetype = file
        .mimetype
        .as_deref()
        .map(|mimetype| mimetype.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);
    by_extension || by_mimetype
}

#[cfg(test)]
mod tests {
    use courier_slack_runtime::{SlackBotProfile, SlackMessage};

    use super::{decode_slack_text, mention_pattern, RecordKind, RecordNormalizer, MENTION_PATTERN};
    use crate::test_support::{slack_file, text_message, FakePlatform};
    use crate::ArchiveError;

    #[test]
    fn unit_mention_pattern_compiles_and_captures_labels() {
        assert!(regex::Regex::new(MENTION_PATTERN).is_ok());
        let captures = mention_pattern()
            .captures("hi <@U123ABC|ada> and <@W9>")
            .expect("mention");
        assert_eq!(&captures[1], "U123ABC");
        assert_eq!(captures.get(2).map(|label| label.as_str()), Some("ada"));
        assert_eq!(mention_pattern().find_iter("hi <@U123ABC|ada> and <@W9>").count(), 2);
    }

    #[test]
    fn unit_decode_slack_text_handles_escapes_and_punctuation() {
        assert_eq!(
            decode_slack_text("a &lt;b&gt; &amp;amp; it\u{2019}s\u{2026}"),
            "a <b> &amp; it's..."
        );
    }

    #[tokio::test]
    async fn functional_normalize_resolves_authors_mentions_and_timestamps() {
        let platform = FakePlatform::with_messages(Vec::new(), 10);
        let mut normalizer = RecordNormalizer::new(&platform);
        let message = text_message("1700000000.000100", "U1", "hi <@U2> and <@U2|grace> &amp; <@U1>");

        let record = normalizer.normalize(3, &message).await.expect("normalize");
        assert_eq!(record.sequence, 3);
        assert_eq!(record.author, "Ada Lovelace");
        assert_eq!(record.kind, RecordKind::Message);
        assert_eq!(record.text, "hi @Grace Hopper and @Grace Hopper & @Ada Lovelace");
        assert_eq!(record.csv_timestamp, "2023-11-14 10:13PM");
        assert_eq!(record.display_timestamp, "11/14/2023 at 10:13 PM");
        assert_eq!(platform.calls().user_lookups, vec!["U1", "U2"]);
    }

    #[tokio::test]
    async fn functional_user_lookups_are_cached_across_records() {
        let platform = FakePlatform::with_messages(Vec::new(), 10);
        let messages = vec![
            text_message("1.0", "U1", "one"),
            text_message("2.0", "U1", "two <@U1>"),
            text_message("3.0", "U2", "three"),
        ];
        let mut normalizer = RecordNormalizer::new(&platform);
        let records = normalizer.normalize_all(&messages).await.expect("normalize");
        assert_eq!(
            records.iter().map(|record| record.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(platform.calls().user_lookups, vec!["U1", "U2"]);
        assert_eq!(normalizer.users().len(), 2);
    }

    #[tokio::test]
    async fn unit_author_rules_cover_joins_bots_and_unknown() {
        let platform = FakePlatform::with_messages(Vec::new(), 10);
        let mut normalizer = RecordNormalizer::new(&platform);

        let join = SlackMessage {
            subtype: Some("channel_join".to_string()),
            ..text_message("1.0", "U1", "<@U1> has joined the channel")
        };
        let record = normalizer.normalize(1, &join).await.expect("join");
        assert_eq!(record.kind, RecordKind::ChannelJoin);
        assert_eq!(record.author, "Slackbot");

        let bot = SlackMessage {
            subtype: Some("bot_message".to_string()),
            user: None,
            bot_profile: Some(SlackBotProfile {
                name: Some("deploy-bot".to_string()),
            }),
            ..text_message("2.0", "", "deployed")
        };
        let record = normalizer.normalize(2, &bot).await.expect("bot");
        assert_eq!(record.kind, RecordKind::BotMessage);
        assert_eq!(record.author, "deploy-bot");

        let anonymous = SlackMessage {
            user: None,
            ..text_message("3.0", "", "who am i")
        };
        let record = normalizer.normalize(3, &anonymous).await.expect("anonymous");
        assert_eq!(record.author, "Unknown");
    }

    #[tokio::test]
    async fn regression_failed_lookup_falls_back_to_raw_id_once() {
        let platform = FakePlatform::with_messages(Vec::new(), 10);
        let mut normalizer = RecordNormalizer::new(&platform);
        let messages = vec![
            text_message("1.0", "U404", "first"),
            text_message("2.0", "U404", "second <@U404|ghost>"),
        ];
        let records = normalizer.normalize_all(&messages).await.expect("normalize");
        assert_eq!(records[0].author, "U404");
        assert_eq!(records[1].text, "second @ghost");
        assert_eq!(platform.calls().user_lookups, vec!["U404"]);
    }

    #[tokio::test]
    async fn regression_rate_limited_lookup_propagates() {
        let mut platform = FakePlatform::with_messages(Vec::new(), 10);
        platform.rate_limit_users = true;
        let mut normalizer = RecordNormalizer::new(&platform);
        let error = normalizer
            .normalize(1, &text_message("1.0", "U1", "hi"))
            .await
            .expect_err("rate limited");
        assert!(matches!(error, ArchiveError::RateLimited(_)));
    }

    #[tokio::test]
    async fn unit_attachments_get_unique_names_and_image_flags() {
        let platform = FakePlatform::with_messages(Vec::new(), 10);
        let mut normalizer = RecordNormalizer::new(&platform);
        let mut message = text_message("1.0", "U1", "files");
        message.files = vec![
            slack_file("photo.png", "image/png", "https://files.example/1"),
            slack_file("photo.png", "image/png", "https://files.example/2"),
            slack_file("notes.pdf", "application/pdf", "https://files.example/3"),
            slack_file("scan.heic", "image/heic", "https://files.example/4"),
        ];
        message.files[2].name = None;
        message.files[2].title = None;

        let record = normalizer.normalize(1, &message).await.expect("normalize");
        let names = record
            .attachments
            .iter()
            .map(|attachment| attachment.filename.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["photo.png", "photo (1).png", "Unknown", "scan.heic"]);
        let images = record
            .attachments
            .iter()
            .map(|attachment| attachment.is_image)
            .collect::<Vec<_>>();
        assert_eq!(images, vec![true, true, false, true]);
        assert_eq!(record.attachments[0].link_url, "https://files.example/1?view");
        assert_eq!(
            record.attachments[0].download_url.as_deref(),
            Some("https://files.example/1")
        );
        assert!(platform.calls().downloads.is_empty());
    }
}
