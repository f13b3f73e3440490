//! Foundational low-level utilities shared across courier crates.
//!
//! Provides atomic file-write helpers, Slack timestamp conversion, and path
//! sanitizing used by archive exporters and listener state persistence.

pub mod atomic_io;
pub mod path_utils;
pub mod time_utils;

pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use path_utils::{sanitize_for_path, title_case, unique_filename};
pub use time_utils::{
    current_unix_timestamp, current_unix_timestamp_ms, format_slack_ts, slack_ts_to_datetime,
};
