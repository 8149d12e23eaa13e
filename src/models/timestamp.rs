//! Reading timestamps.
//!
//! Agents report ISO-8601 timestamps, sometimes with an offset and sometimes
//! without. Values with an offset are normalized to UTC; naive values are taken
//! to already be UTC. The stored column carries no zone, so everything that
//! reaches the database is UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Message used whenever a timestamp cannot be parsed.
pub const INVALID_TIMESTAMP_MESSAGE: &str =
    "Invalid timestamp format. Expected ISO 8601 format (YYYY-MM-DDTHH:MM:SSZ).";

/// Parses an ISO-8601 timestamp with or without a UTC offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Serde helper for required timestamp fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(INVALID_TIMESTAMP_MESSAGE))
}

/// Serde helper for optional timestamp fields; `null` and a missing field are both "unknown".
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(INVALID_TIMESTAMP_MESSAGE)),
        None => Ok(None),
    }
}
