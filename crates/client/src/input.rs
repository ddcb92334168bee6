//! Conversions between user-facing input and ledger values.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use registry_types::Timestamp;

/// Seconds in one day of auction duration.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Format accepted for auction start times, interpreted as UTC.
pub const START_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid start time {input:?}, expected YYYY-MM-DDTHH:MM")]
    InvalidStart { input: String },

    #[error("start time {0} is before the unix epoch")]
    BeforeEpoch(String),

    #[error("duration of {0} days is too long")]
    DurationOverflow(u64),
}

/// Parse a start time such as `2024-06-01T14:30` into a unix timestamp.
pub fn parse_start(input: &str) -> Result<Timestamp, InputError> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), START_FORMAT).map_err(|_| {
        InputError::InvalidStart {
            input: input.to_string(),
        }
    })?;
    Timestamp::try_from(naive.and_utc().timestamp())
        .map_err(|_| InputError::BeforeEpoch(input.to_string()))
}

pub fn days_to_secs(days: u64) -> Result<u64, InputError> {
    days.checked_mul(SECONDS_PER_DAY)
        .ok_or(InputError::DurationOverflow(days))
}

/// Render a unix timestamp as `YYYY-MM-DD HH:MM UTC`.
pub fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        assert_eq!(parse_start("2023-11-14T22:13").unwrap(), 1_700_000_000 - 20);
        assert_eq!(parse_start("1970-01-01T00:01").unwrap(), 60);
        assert!(matches!(
            parse_start("14/11/2023 22:13"),
            Err(InputError::InvalidStart { .. })
        ));
        assert!(matches!(
            parse_start("1969-12-31T23:59"),
            Err(InputError::BeforeEpoch(_))
        ));
    }

    #[test]
    fn test_days_to_secs() {
        assert_eq!(days_to_secs(7).unwrap(), 604_800);
        assert!(days_to_secs(u64::MAX).is_err());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13 UTC");
    }
}
