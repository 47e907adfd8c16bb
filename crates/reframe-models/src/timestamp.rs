//! Timestamp parsing for clip ranges.
//!
//! Clip ranges arrive either as plain seconds or as `HH:MM:SS[.mmm]`,
//! `MM:SS`, `SS` strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS, HH:MM:SS.mmm, MM:SS, or SS")]
    InvalidFormat(String),
}

/// Parse a timestamp string to total seconds.
///
/// ```
/// use reframe_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    const NAMES: [&str; 3] = ["hours", "minutes", "seconds"];
    let offset = 3 - parts.len();

    let mut total = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let name = NAMES[offset + i];
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| TimestampError::InvalidValue(name, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }

    Ok(total)
}

/// A clip boundary given as seconds or as a timestamp string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ClipTime {
    Seconds(f64),
    Text(String),
}

impl ClipTime {
    pub fn to_seconds(&self) -> Result<f64, TimestampError> {
        match self {
            ClipTime::Seconds(s) if *s < 0.0 => Err(TimestampError::Negative),
            ClipTime::Seconds(s) => Ok(*s),
            ClipTime::Text(t) => parse_timestamp(t),
        }
    }
}

impl From<f64> for ClipTime {
    fn from(value: f64) -> Self {
        ClipTime::Seconds(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
        assert_eq!(parse_timestamp("53:53").unwrap(), 3233.0);
        assert_eq!(parse_timestamp("0").unwrap(), 0.0);
        assert!((parse_timestamp("00:00:30.500").unwrap() - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp("  "), Err(TimestampError::Empty)));
        assert!(matches!(
            parse_timestamp("abc"),
            Err(TimestampError::InvalidValue("seconds", _))
        ));
        assert!(matches!(
            parse_timestamp("1:2:3:4"),
            Err(TimestampError::InvalidFormat(_))
        ));
        assert!(matches!(parse_timestamp("-1:00"), Err(TimestampError::Negative)));
    }

    #[test]
    fn test_clip_time_untagged() {
        let t: ClipTime = serde_json::from_str("12.5").unwrap();
        assert_eq!(t.to_seconds().unwrap(), 12.5);

        let t: ClipTime = serde_json::from_str("\"00:01:05\"").unwrap();
        assert_eq!(t.to_seconds().unwrap(), 65.0);
    }
}
