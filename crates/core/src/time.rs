//! Timestamp helpers for wire payloads.
//!
//! Upstream producers serialize "no timestamp" as the zero instant
//! `0001-01-01T00:00:00Z` rather than omitting the field. Both forms decode to
//! `None` here.

use chrono::{DateTime, Datelike, Utc};

/// True for the zero instant (and anything else in year 1 or earlier).
pub fn is_zero(t: &DateTime<Utc>) -> bool {
    t.year() <= 1
}

pub fn normalize(t: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    t.filter(|t| !is_zero(t))
}

/// `#[serde(with = "...")]` adapter for optional timestamps that maps the zero
/// instant to `None`.
pub mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        Ok(super::normalize(raw))
    }
}
