use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Structured error payload returned by the API on non-success responses.
///
/// Every field is optional because servers are free to omit any of them.
/// Decoding is lenient: `null` members count as absent, `status` may be a
/// number or a numeric string, and a field error may be a single string.
/// Unknown members are kept in [`ProblemDetails::extensions`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Per-field validation messages, keyed by field name.
    #[serde(default, deserialize_with = "lenient_errors", skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, Vec<String>>,
    #[serde(flatten)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

impl ProblemDetails {
    /// Picks the human readable summary: `title`, then `detail`.
    pub fn summary(&self) -> Option<&str> {
        self.title.as_deref().or(self.detail.as_deref())
    }

    /// Messages attached to a single field, empty when there are none.
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(number) => number.as_u64().and_then(|code| u16::try_from(code).ok()),
        JsonValue::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_errors<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, Vec<String>>, D::Error> {
    let JsonValue::Object(fields) = JsonValue::deserialize(deserializer)? else {
        return Ok(HashMap::new());
    };
    Ok(fields
        .into_iter()
        .filter_map(|(field, messages)| {
            let messages = match messages {
                JsonValue::Null => return None,
                JsonValue::Array(items) => items.into_iter().filter_map(message).collect(),
                single => message(single).into_iter().collect(),
            };
            Some((field, messages))
        })
        .collect())
}

fn message(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
