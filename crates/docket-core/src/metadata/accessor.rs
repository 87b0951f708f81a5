//! Typed, null-tolerant readers over [`BlockData`].
//!
//! The YAML layer has no native timestamp type. Timestamps live in block
//! data as RFC 3339 strings produced by [`format_timestamp`], so
//! [`header_str`] returns them in canonical form and [`header_datetime`]
//! parses them back.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_yaml::Value;

use super::BlockData;

/// Read a field as a string.
///
/// Strings are returned as-is, scalars are stringified, tagged values are
/// unwrapped, and collections are rendered as YAML. Absent and null fields
/// give `None`.
pub fn header_str(data: &BlockData, key: &str) -> Option<String> {
    value_to_string(data.get(key)?)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => value_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_yaml::to_string(value)
            .ok()
            .map(|s| s.trim_end().to_owned()),
    }
}

/// Read a field stored as a YAML integer.
///
/// Numeric strings and floats give `None`; no coercion is attempted.
pub fn header_int(data: &BlockData, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Read a field stored as an ISO-8601 timestamp string. Tagged values are
/// unwrapped first, as in [`header_str`].
pub fn header_datetime(data: &BlockData, key: &str) -> Option<DateTime<Utc>> {
    value_to_datetime(data.get(key)?)
}

fn value_to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Tagged(tagged) => value_to_datetime(&tagged.value),
        _ => None,
    }
}

/// Parse an ISO-8601 timestamp.
///
/// A trailing `Z` is treated as `+00:00`. Timestamps without an offset, and
/// bare dates, are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => raw.to_owned(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical string form of a timestamp, e.g. `2024-01-15T10:30:00Z`.
///
/// Matches chrono's own serde output, so headers written through either path
/// agree byte for byte.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Serde adapters for `DateTime<Utc>` record fields.
///
/// Writes [`format_timestamp`] and reads through [`parse_timestamp`], so a
/// typed record decodes every timestamp its schema accepts.
pub mod timestamp_serde {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_timestamp, parse_timestamp};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
    }

    /// The same, for optional fields. Pair with `#[serde(default)]`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        use super::{format_timestamp, parse_timestamp};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_some(&format_timestamp(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    parse_timestamp(&raw)
                        .ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
                })
                .transpose()
        }
    }
}
