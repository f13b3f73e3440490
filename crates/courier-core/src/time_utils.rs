use chrono::{DateTime, Utc};

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Parses a Slack `ts` value (`"1700000000.000200"`) into a UTC datetime.
///
/// Slack timestamps are fractional epoch seconds; the fraction is a sequence
/// suffix, so only the integer part and the first six fractional digits are
/// honoured. Returns `None` for anything that is not a non-negative number.
pub fn slack_ts_to_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let trimmed = ts.trim();
    let (seconds_raw, fraction_raw) = match trimmed.split_once('.') {
        Some((seconds, fraction)) => (seconds, fraction),
        None => (trimmed, ""),
    };
    if seconds_raw.is_empty() || !seconds_raw.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if !fraction_raw.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let seconds = seconds_raw.parse::<i64>().ok()?;
    let micros = if fraction_raw.is_empty() {
        0
    } else {
        let mut digits = fraction_raw.chars().take(6).collect::<String>();
        while digits.len() < 6 {
            digits.push('0');
        }
        digits.parse::<u32>().ok()?
    };
    DateTime::from_timestamp(seconds, micros.saturating_mul(1_000))
}

/// Formats a Slack `ts` with a chrono format string, falling back to the raw value.
pub fn format_slack_ts(ts: &str, format: &str) -> String {
    match slack_ts_to_datetime(ts) {
        Some(datetime) => datetime.format(format).to_string(),
        None => ts.trim().to_string(),
    }
}
