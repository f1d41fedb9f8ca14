//! View keys and view staleness.
//!
//! Views are queried by key ranges. A key is usually a string or an array of
//! keys (a "complex key"); arbitrary JSON is accepted for the less common
//! cases such as the `{}` high sentinel in `["a", {}]`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A key used to select rows from a view.
///
/// Keys are sent JSON-encoded. An array key preserves element order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewKey {
    /// A string key
    String(String),
    /// A complex key; elements keep their order
    Array(Vec<ViewKey>),
    /// Any other JSON value (numbers, objects, null)
    Json(JsonValue),
}

impl ViewKey {
    /// Convert to a JSON value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ViewKey::String(s) => JsonValue::String(s.clone()),
            ViewKey::Array(items) => JsonValue::Array(items.iter().map(ViewKey::to_json).collect()),
            ViewKey::Json(v) => v.clone(),
        }
    }

    /// Encode as the JSON text placed in a query parameter.
    pub fn to_json_string(&self) -> String {
        // Serializing a `serde_json::Value` cannot fail: all map keys are strings.
        serde_json::to_string(&self.to_json()).unwrap_or_default()
    }

    /// The high sentinel `{}` that sorts after every string and array.
    pub fn high() -> Self {
        ViewKey::Json(JsonValue::Object(serde_json::Map::new()))
    }
}

impl From<&str> for ViewKey {
    fn from(s: &str) -> Self {
        ViewKey::String(s.to_string())
    }
}

impl From<String> for ViewKey {
    fn from(s: String) -> Self {
        ViewKey::String(s)
    }
}

impl<T: Into<ViewKey>> From<Vec<T>> for ViewKey {
    fn from(items: Vec<T>) -> Self {
        ViewKey::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<JsonValue> for ViewKey {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::String(s) => ViewKey::String(s),
            JsonValue::Array(items) => ViewKey::Array(items.into_iter().map(ViewKey::from).collect()),
            other => ViewKey::Json(other),
        }
    }
}

impl From<i64> for ViewKey {
    fn from(n: i64) -> Self {
        ViewKey::Json(JsonValue::from(n))
    }
}

/// Whether a view may be served from a stale index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stale {
    /// Wait for the index to be up to date (parameter omitted)
    #[default]
    No,
    /// Serve from the index as it is
    Ok,
    /// Serve from the index as it is, then update it
    UpdateAfter,
}

impl Stale {
    /// The literal sent on the wire, `None` when the parameter is omitted.
    pub fn token(self) -> Option<&'static str> {
        match self {
            Stale::No => None,
            Stale::Ok => Some("ok"),
            Stale::UpdateAfter => Some("update_after"),
        }
    }
}
