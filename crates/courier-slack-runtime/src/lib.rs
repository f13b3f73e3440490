//! Slack transport crate for the courier archiver.
//!
//! Hosts the Web API client used by archive jobs (history pagination, user
//! lookup, file download/upload, channel notices) and the Socket Mode
//! listener that turns mentions and channel invitations into archive
//! triggers.

mod slack_api_client;
mod slack_error;
mod slack_helpers;
mod slack_types;
mod socket_mode;

pub use slack_api_client::{SlackApiClient, SlackApiClientConfig, DEFAULT_SLACK_API_BASE};
pub use slack_error::SlackApiError;
pub use slack_types::{
    SlackAuthIdentity, SlackBotProfile, SlackChannel, SlackFile, SlackHistoryPage, SlackMessage,
    SlackPostedMessage, SlackUploadedFile, SlackUser, SlackUserProfile,
};
pub use socket_mode::{
    run_socket_mode, SlackEventHandler, SlackTriggerEvent, SlackTriggerKind, SocketModeConfig,
};
