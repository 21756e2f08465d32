//! Secret records and camelCase to `snake_case` key mapping.
//!
//! The secret endpoint answers with camelCase keys and timestamp strings.
//! [`map_to_secret_record`] renames the keys and parses the `created` and
//! `last_modified` timestamps into a typed [`SecretRecord`].

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Format of the `created` and `lastModified` timestamps.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// An uppercase letter starting a lowercase word, e.g. the `Se` in `HTTPServer`.
static WORD_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("valid word start pattern"));
// A lowercase letter or digit followed by an uppercase letter.
static CASE_CHANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid case change pattern"));

/// Errors raised while mapping a secret payload.
#[derive(Error, Debug)]
pub enum RecordError {
    /// A timestamp did not match the expected format
    #[error("Invalid {field} timestamp {value:?}: {source}")]
    Timestamp {
        /// Field name after renaming
        field: &'static str,
        /// Offending value
        value: String,
        /// Parser error
        #[source]
        source: chrono::ParseError,
    },

    /// The payload is not a secret record
    #[error("Invalid secret record: {0}")]
    Shape(#[from] serde_json::Error),
}

/// A secret as returned by the secret endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretRecord {
    /// Server-assigned id (a UUID)
    pub id: String,
    /// Secret path
    pub path: String,
    /// Secret attributes
    pub attributes: Value,
    /// Free-form description
    pub description: String,
    /// Secret data
    pub data: HashMap<String, Value>,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// Creator
    pub created_by: String,
    /// Last modifier
    pub last_modified_by: String,
    /// Version number
    pub version: f64,
    /// Fields not covered above, keyed by their renamed name
    pub extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RenamedRecord {
    id: String,
    path: String,
    #[serde(default)]
    attributes: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    data: HashMap<String, Value>,
    created: String,
    last_modified: String,
    #[serde(default, deserialize_with = "null_as_default")]
    created_by: String,
    #[serde(default, deserialize_with = "null_as_default")]
    last_modified_by: String,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    version: f64,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

// Optional fields may be sent as explicit nulls.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Number(f64),
        Text(String),
    }

    match Option::<Version>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(Version::Number(n)) => Ok(n),
        Some(Version::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl SecretRecord {
    /// Parse a secret payload using [`DEFAULT_DATETIME_FORMAT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object describing a secret.
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        let raw: Map<String, Value> = serde_json::from_str(text)?;
        map_to_secret_record(&raw, DEFAULT_DATETIME_FORMAT)
    }
}

/// Convert a camelCase key to `snake_case`.
///
/// Boundaries are inserted before an uppercase letter that follows a
/// lowercase letter or digit, and before an uppercase letter that starts a
/// lowercase word, so acronyms stay together: `HTTPServer` becomes
/// `http_server` and `lastModified` becomes `last_modified`.
#[must_use]
pub fn to_snake_case(key: &str) -> String {
    let words = WORD_START.replace_all(key, "${1}_${2}");
    CASE_CHANGE.replace_all(&words, "${1}_${2}").to_lowercase()
}

/// Map a raw secret payload to a [`SecretRecord`].
///
/// Keys are renamed with [`to_snake_case`], `created` and `last_modified` are
/// parsed with `datetime_format` and every other value is kept as is. Keys are
/// applied in sorted order, so when two keys rename to the same name the
/// outcome does not depend on the order the payload listed them in.
///
/// # Errors
///
/// Returns an error if a timestamp does not match `datetime_format` or a
/// required field is missing or has the wrong type.
pub fn map_to_secret_record(
    raw: &Map<String, Value>,
    datetime_format: &str,
) -> Result<SecretRecord, RecordError> {
    let mut entries: Vec<(&String, &Value)> = raw.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let renamed: Map<String, Value> = entries
        .into_iter()
        .map(|(key, value)| (to_snake_case(key), value.clone()))
        .collect();

    let record: RenamedRecord = serde_json::from_value(Value::Object(renamed))?;

    Ok(SecretRecord {
        created: parse_timestamp("created", &record.created, datetime_format)?,
        last_modified: parse_timestamp("last_modified", &record.last_modified, datetime_format)?,
        id: record.id,
        path: record.path,
        attributes: record.attributes,
        description: record.description,
        data: record.data,
        created_by: record.created_by,
        last_modified_by: record.last_modified_by,
        version: record.version,
        extra: record.extra,
    })
}

fn parse_timestamp(
    field: &'static str,
    value: &str,
    format: &str,
) -> Result<DateTime<Utc>, RecordError> {
    NaiveDateTime::parse_from_str(value, format)
        .map(|dt| dt.and_utc())
        .map_err(|source| RecordError::Timestamp {
            field,
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        let value = json!({
            "id": "0b1f2d3c-4e5f-4a6b-8c7d-9e0f1a2b3c4d",
            "path": "test:sdk:simple",
            "attributes": {},
            "description": "a simple secret",
            "data": {"username": "app", "password": "hunter2"},
            "created": "2021-01-01T00:00:00Z",
            "lastModified": "2021-02-03T04:05:06Z",
            "createdBy": "x",
            "lastModifiedBy": "users:thy-one:admin",
            "version": "2"
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("lastModified"), "last_modified");
        assert_eq!(to_snake_case("createdBy"), "created_by");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("getHTTPResponseCode"), "get_http_response_code");
        assert_eq!(to_snake_case("version2Name"), "version2_name");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_map_to_secret_record() {
        let record = map_to_secret_record(&payload(), DEFAULT_DATETIME_FORMAT).unwrap();

        assert_eq!(record.id.len(), 36);
        assert_eq!(record.created_by, "x");
        assert_eq!(record.last_modified_by, "users:thy-one:admin");
        assert_eq!(
            record.last_modified,
            Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 6).unwrap()
        );
        assert_eq!(record.created, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(record.data["username"], "app");
        assert!((record.version - 2.0).abs() < f64::EPSILON);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let mut raw = payload();
        raw.insert("expiresAt".to_string(), json!(null));

        let record = map_to_secret_record(&raw, DEFAULT_DATETIME_FORMAT).unwrap();

        assert_eq!(record.extra.get("expires_at"), Some(&Value::Null));
    }

    #[test]
    fn test_invalid_timestamp() {
        let mut raw = payload();
        raw.insert("lastModified".to_string(), json!("yesterday"));

        match map_to_secret_record(&raw, DEFAULT_DATETIME_FORMAT) {
            Err(RecordError::Timestamp { field, value, .. }) => {
                assert_eq!(field, "last_modified");
                assert_eq!(value, "yesterday");
            }
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_datetime_format() {
        let mut raw = payload();
        raw.insert("created".to_string(), json!("2021-01-01 12:30:00"));
        raw.insert("lastModified".to_string(), json!("2021-01-02 12:30:00"));

        let record = map_to_secret_record(&raw, "%Y-%m-%d %H:%M:%S").unwrap();

        assert_eq!(
            record.created,
            Utc.with_ymd_and_hms(2021, 1, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_required_field() {
        let mut raw = payload();
        raw.remove("id");

        let err = map_to_secret_record(&raw, DEFAULT_DATETIME_FORMAT).unwrap_err();

        assert!(matches!(err, RecordError::Shape(_)));
    }

    #[test]
    fn test_null_optional_fields_default() {
        let mut raw = payload();
        for key in ["description", "data", "attributes", "createdBy", "lastModifiedBy", "version"] {
            raw.insert(key.to_string(), Value::Null);
        }

        let record = map_to_secret_record(&raw, DEFAULT_DATETIME_FORMAT).unwrap();

        assert_eq!(record.description, "");
        assert!(record.data.is_empty());
        assert_eq!(record.attributes, Value::Null);
        assert_eq!(record.created_by, "");
        assert_eq!(record.last_modified_by, "");
        assert!(record.version.abs() < f64::EPSILON);
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_numeric_version() {
        let mut raw = payload();
        raw.insert("version".to_string(), json!(7));

        let record = map_to_secret_record(&raw, DEFAULT_DATETIME_FORMAT).unwrap();

        assert!((record.version - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_json() {
        let text = serde_json::to_string(&Value::Object(payload())).unwrap();
        let record = SecretRecord::from_json(&text).unwrap();
        assert_eq!(record.path, "test:sdk:simple");

        assert!(SecretRecord::from_json("[1, 2]").is_err());
    }
}
