//! Channel archiving for the courier bot.
//!
//! An archive job resolves a channel, pages through its full history,
//! normalizes every message into a [`NormalizedRecord`], writes a CSV and a
//! paginated PDF under `<output>/<Channel> Archive/`, and optionally uploads
//! both files back to the channel. Jobs are started from the CLI
//! ([`run_archive_job`]) or from Socket Mode triggers ([`run_listener`]).

mod config;
mod csv_export;
mod delivery;
pub mod document;
mod error;
mod history;
mod job;
mod ledger;
mod listener;
mod normalize;
mod platform;

#[cfg(test)]
mod test_support;

pub use config::{ArchiveConfig, ArchiveJob, ChannelRef, Requester, SlackCredentials};
pub use csv_export::{render_csv, write_csv, CsvOptions, CSV_HEADER};
pub use delivery::{
    deliver, remove_image_dirs, ArchiveArtifacts, DeliveryOptions, DeliveryOutcome,
    UPLOAD_FAILURE_NOTICE,
};
pub use error::ArchiveError;
pub use history::{fetch_history, history_pages};
pub use job::{
    archive_directory, archive_directory_name, record_job_outcome, run_archive_job,
    run_archive_job_with_platform, ArchiveReport, ArchiveStage,
};
pub use ledger::{
    read_job_ledger, JobLedger, JobLedgerEntry, LedgerArtifact, JOB_LEDGER_SCHEMA_VERSION,
};
pub use listener::{
    failure_notice, run_listener, ListenerConfig, MentionArchiveHandler, WORKING_NOTICE,
};
pub use normalize::{
    decode_slack_text, AttachmentRecord, NormalizedRecord, RecordKind, RecordNormalizer,
    UserNameCache, CSV_TIMESTAMP_FORMAT, DISPLAY_TIMESTAMP_FORMAT,
};
pub use platform::{ArchiveChannel, ArchivePlatform};
