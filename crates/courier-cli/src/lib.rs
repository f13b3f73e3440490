//! CLI argument models for the `virtual-courier` binary.
//!
//! Exposes the clap-backed command tree, the legacy single-dash flag
//! normalizer, and conversions into the explicit configuration structs the
//! archive and listener entry points take.

pub mod cli_args;
pub mod legacy_aliases;

pub use cli_args::{parse_channel_ref, ArchiveArgs, Cli, CliCommand, ListenArgs, SlackArgs};
pub use legacy_aliases::normalize_legacy_archive_flags;
