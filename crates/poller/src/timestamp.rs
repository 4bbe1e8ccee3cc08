//! Minute-resolution timestamps.
//!
//! `last_check` values are stored in UTC and rendered as `YYYY-MM-DD HH:MM`
//! on a 24-hour clock.

use chrono::{DateTime, NaiveDateTime, ParseError, Timelike, Utc};

/// Wire format of a `last_check` value.
pub const FORMAT: &str = "%Y-%m-%d %H:%M";

/// The `last_check` of a service that has never been probed.
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_default()
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

pub fn format(time: DateTime<Utc>) -> String {
    time.format(FORMAT).to_string()
}

pub fn parse(value: &str) -> Result<DateTime<Utc>, ParseError> {
    NaiveDateTime::parse_from_str(value, FORMAT).map(|naive| naive.and_utc())
}

/// Serde adapter for `#[serde(with = "...")]`.
pub mod serde_minutes {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse(&value).map_err(|e| D::Error::custom(format!("invalid lastCheck {value:?}: {e}")))
    }
}
