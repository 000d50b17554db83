//! Timestamp normalization.
//!
//! Every timestamp entering the analysis is reduced to an offset-free wall-clock
//! reading. Offsets are stripped, not converted: `09:00+02:00` and `09:00-05:00`
//! both become `09:00`. Producers are expected to emit local time already, so
//! mixing sources with different offsets yields skewed deltas.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Format used when serializing normalized timestamps.
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Errors raised when a timestamp string cannot be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    Unparseable(String),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::Unparseable(s) => write!(f, "Unrecognized timestamp: '{s}'"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Strip the zone from a timestamp, keeping its wall-clock reading.
pub fn normalize<Z: TimeZone>(timestamp: &DateTime<Z>) -> NaiveDateTime {
    timestamp.naive_local()
}

/// Parse a timestamp string into its offset-free wall-clock reading.
///
/// Accepts RFC 3339 (`Z` or numeric offsets), naive ISO date-times and
/// plain dates (midnight).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, NormalizeError> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(normalize(&dt));
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| NormalizeError::Unparseable(trimmed.to_string()))
}

/// Current wall-clock time in `zone`, or in the system zone when none is given.
pub fn now_wall_clock(zone: Option<Tz>) -> NaiveDateTime {
    match zone {
        Some(tz) => normalize(&Utc::now().with_timezone(&tz)),
        None => normalize(&chrono::Local::now()),
    }
}

/// Serde support for required wall-clock timestamps.
pub mod wall_clock {
    use super::{parse_timestamp, WALL_CLOCK_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(WALL_CLOCK_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde support for optional wall-clock timestamps.
pub mod wall_clock_opt {
    use super::{parse_timestamp, WALL_CLOCK_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.format(WALL_CLOCK_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.trim().is_empty() => parse_timestamp(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
