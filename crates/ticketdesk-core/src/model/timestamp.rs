//! Lenient timestamp parsing for backend rows.
//!
//! Rows arrive from the bulk read API, from insert/update responses and from
//! the change channel. Depending on the path, a `timestamptz` column may be
//! rendered as RFC 3339 (`2024-01-02T03:04:05.123+00:00`), in Postgres text
//! form (`2024-01-02 03:04:05.123+00`), without an offset, or as a bare date.
//! All of them decode to UTC. Serialization always emits RFC 3339.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a timestamp in any of the accepted shapes.
#[must_use]
pub fn parse_lenient(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter for `Option<DateTime<Utc>>` columns.
pub mod option {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, parse_lenient};

    /// Serialize as RFC 3339 or `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from `null`, an empty string, or any accepted text shape.
    ///
    /// # Errors
    ///
    /// Returns an error when a non-empty string is not a recognizable timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_lenient(text).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("unrecognized timestamp '{text}'"))
            }),
        }
    }
}

/// Serde adapter for required `DateTime<Utc>` fields.
pub mod required {
    use super::{DateTime, Deserialize, Deserializer, Serializer, Utc, parse_lenient};

    /// Serialize as RFC 3339.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    /// Deserialize from any accepted text shape.
    ///
    /// # Errors
    ///
    /// Returns an error when the string is not a recognizable timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_lenient(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{raw}'")))
    }
}
