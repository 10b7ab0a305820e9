//! Effective-timestamp resolution for stored documents.
//!
//! Documents reach the store through several save paths, each filling a
//! different subset of timestamp fields. Resolution tries the fields in a
//! fixed priority order and takes the first one that is present **and**
//! parseable:
//!
//! 1. `createdAt`
//! 2. `updatedAt`
//! 3. `timestamp`
//! 4. `id`, when it is a 24-hex ObjectId (leading 8 hex chars are big-endian
//!    Unix seconds)
//! 5. `savedAt`, the client-supplied save timestamp
//!
//! Nothing parses → [`UNKNOWN_TS`], which sorts as the oldest possible
//! instant. Resolution never fails.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Resolved value for a document with no usable timestamp.
pub const UNKNOWN_TS: i64 = 0;

/// Length of an ObjectId-style identifier in hex characters.
pub const OBJECT_ID_LEN: usize = 24;

/// A timestamp value exactly as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInstant {
    /// Integral epoch milliseconds.
    Millis(i64),
    /// Fractional epoch milliseconds.
    Fractional(f64),
    /// Any textual form: RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or
    /// digits.
    Text(String),
}

impl RawInstant {
    /// Convert a JSON value into a raw instant. Non-scalar values yield `None`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Millis)
                .or_else(|| n.as_f64().map(Self::Fractional)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Epoch milliseconds, or `None` when the value does not parse.
    #[must_use]
    pub fn millis(&self) -> Option<i64> {
        parse_instant(self)
    }
}

impl From<i64> for RawInstant {
    fn from(millis: i64) -> Self {
        Self::Millis(millis)
    }
}

impl From<&str> for RawInstant {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Which field supplied a document's effective timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampSource {
    CreatedAt,
    UpdatedAt,
    Timestamp,
    ObjectId,
    SavedAt,
    Unknown,
}

impl TimestampSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::Timestamp => "timestamp",
            Self::ObjectId => "id",
            Self::SavedAt => "savedAt",
            Self::Unknown => "unknown",
        }
    }
}

/// Anything carrying the timestamp-bearing fields of a stored document.
pub trait TimeFields {
    fn created_at(&self) -> Option<&RawInstant>;
    fn updated_at(&self) -> Option<&RawInstant>;
    fn timestamp(&self) -> Option<&RawInstant>;
    fn object_id(&self) -> &str;
    fn saved_at(&self) -> Option<&RawInstant>;
}

/// Resolve the effective timestamp of `doc` in epoch milliseconds.
#[must_use]
pub fn resolve_timestamp<T: TimeFields + ?Sized>(doc: &T) -> i64 {
    resolve_with_source(doc).0
}

/// Resolve the effective timestamp and report which field won.
#[must_use]
pub fn resolve_with_source<T: TimeFields + ?Sized>(doc: &T) -> (i64, TimestampSource) {
    let candidates = [
        (doc.created_at(), TimestampSource::CreatedAt),
        (doc.updated_at(), TimestampSource::UpdatedAt),
        (doc.timestamp(), TimestampSource::Timestamp),
    ];
    for (raw, source) in candidates {
        if let Some(millis) = raw.and_then(parse_instant) {
            return (millis, source);
        }
    }
    if let Some(millis) = object_id_millis(doc.object_id()) {
        return (millis, TimestampSource::ObjectId);
    }
    if let Some(millis) = doc.saved_at().and_then(parse_instant) {
        return (millis, TimestampSource::SavedAt);
    }
    (UNKNOWN_TS, TimestampSource::Unknown)
}

/// Decode the creation time embedded in a 24-hex ObjectId.
///
/// The first 8 hex characters are a big-endian `u32` of Unix seconds.
/// Returns `None` for ids of any other shape.
#[must_use]
pub fn object_id_millis(id: &str) -> Option<i64> {
    if id.len() != OBJECT_ID_LEN || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let seconds = u32::from_str_radix(&id[..8], 16).ok()?;
    Some(i64::from(seconds) * 1000)
}

/// Parse a raw wire instant into epoch milliseconds.
///
/// Non-positive numbers are treated as absent so they fall through to the
/// next field.
#[must_use]
pub fn parse_instant(raw: &RawInstant) -> Option<i64> {
    match raw {
        RawInstant::Millis(millis) => (*millis > 0).then_some(*millis),
        RawInstant::Fractional(value) => fractional_millis(*value),
        RawInstant::Text(text) => parse_text(text.trim()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn fractional_millis(value: f64) -> Option<i64> {
    (value.is_finite() && value >= 1.0 && value < 9.0e18).then(|| value.round() as i64)
}

fn parse_text(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i64>().ok().filter(|millis| *millis > 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
