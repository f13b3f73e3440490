use courier_slack_runtime::SlackApiError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates the ways an archive job can fail.
pub enum ArchiveError {
    #[error("slack authentication failed: {0}")]
    AuthenticationFailure(String),
    #[error("channel `{0}` was not found")]
    ChannelNotFound(String),
    #[error("the archive bot is not a member of channel `{0}`; invite it to the channel first")]
    NotAMember(String),
    #[error("slack rate limited `{0}`; try again in a few minutes")]
    RateLimited(String),
    #[error("failed to download attachment `{filename}`: {reason}")]
    AttachmentDownloadFailure { filename: String, reason: String },
    #[error("failed to upload `{filename}` to the channel: {reason}")]
    UploadFailure { filename: String, reason: String },
    #[error("slack api error: {0}")]
    Platform(SlackApiError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write csv export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to render archive document: {0}")]
    Document(String),
    #[error("failed to store archive artifact: {0:#}")]
    Storage(anyhow::Error),
}

impl ArchiveError {
    /// Maps a Slack client error raised while working on `channel`.
    pub fn from_slack(error: SlackApiError, channel: &str) -> Self {
        if error.is_auth_failure() {
            return Self::AuthenticationFailure(error.to_string());
        }
        match &error {
            SlackApiError::RateLimited { method, .. } => Self::RateLimited(method.clone()),
            SlackApiError::Api { code, .. } => match code.as_str() {
                "channel_not_found" => Self::ChannelNotFound(channel.to_string()),
                "not_in_channel" => Self::NotAMember(channel.to_string()),
                _ => Self::Platform(error),
            },
            _ => Self::Platform(error),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable identifier used in the job ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure(_) => "authentication_failure",
            Self::ChannelNotFound(_) => "channel_not_found",
            Self::NotAMember(_) => "not_a_member",
            Self::RateLimited(_) => "rate_limited",
            Self::AttachmentDownloadFailure { .. } => "attachment_download_failure",
            Self::UploadFailure { .. } => "upload_failure",
            Self::Platform(_) => "platform_error",
            Self::Io { .. } => "io_error",
            Self::Csv(_) => "csv_error",
            Self::Document(_) => "document_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether the job's local artifacts are complete despite this error.
    pub fn preserves_local_artifacts(&self) -> bool {
        matches!(self, Self::UploadFailure { .. })
    }
}

impl From<lopdf::Error> for ArchiveError {
    fn from(error: lopdf::Error) -> Self {
        Self::Document(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use courier_slack_runtime::SlackApiError;

    use super::ArchiveError;

    fn api_error(code: &str) -> SlackApiError {
        SlackApiError::Api {
            method: "conversations.history".to_string(),
            code: code.to_string(),
        }
    }

    #[test]
    fn unit_from_slack_maps_terminal_channel_errors() {
        assert!(matches!(
            ArchiveError::from_slack(api_error("channel_not_found"), "general"),
            ArchiveError::ChannelNotFound(channel) if channel == "general"
        ));
        assert!(matches!(
            ArchiveError::from_slack(api_error("not_in_channel"), "general"),
            ArchiveError::NotAMember(_)
        ));
        assert!(matches!(
            ArchiveError::from_slack(api_error("invalid_auth"), "general"),
            ArchiveError::AuthenticationFailure(_)
        ));
        assert!(matches!(
            ArchiveError::from_slack(api_error("fatal_error"), "general"),
            ArchiveError::Platform(_)
        ));
    }

    #[test]
    fn unit_from_slack_maps_rate_limits() {
        let error = ArchiveError::from_slack(
            SlackApiError::RateLimited {
                method: "users.info".to_string(),
                attempts: 3,
            },
            "general",
        );
        assert_eq!(error.kind(), "rate_limited");
        assert!(error.to_string().contains("users.info"));
    }

    #[test]
    fn unit_only_upload_failures_preserve_local_artifacts() {
        let upload = ArchiveError::UploadFailure {
            filename: "general.csv".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(upload.preserves_local_artifacts());
        assert!(!ArchiveError::NotAMember("general".to_string()).preserves_local_artifacts());
    }
}
