//! # Record Value Type
//!
//! The service stores every value as a string. Clients hand it either raw
//! text or structured data, and get back whatever the stored string decodes
//! to.
//!
//! ## Design Principles
//!
//! 1. **Tagged Union, Not Type Sniffing**: `RecordValue::Text` is passed
//!    through verbatim, `RecordValue::Json` is encoded as JSON text. The
//!    variant is chosen by the caller's type, never by runtime inspection.
//!
//! 2. **Lenient Decoding**: A stored string that parses as JSON comes back as
//!    `Json`, anything else comes back as `Text`. Decoding never fails.
//!
//! ## Wire Mapping
//!
//! ```text
//! RecordValue::Text("hello")            -> "hello"
//! RecordValue::Json({"age": 30})        -> "{\"age\":30}"
//!
//! stored "{\"age\":30}"                 -> RecordValue::Json({"age": 30})
//! stored "hello"                        -> RecordValue::Text("hello")
//! stored "42"                           -> RecordValue::Json(42)
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::HpkvResult;

/// A value as seen by callers of either client.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Raw text, stored verbatim.
    Text(String),
    /// Structured data, stored as its JSON encoding.
    Json(JsonValue),
}

impl RecordValue {
    /// Builds a structured value from any serializable type.
    ///
    /// # Errors
    /// Returns `HpkvError::Serialization` if `value` cannot be represented as
    /// JSON (e.g. a map with non-string keys).
    ///
    /// # Examples
    /// ```rust
    /// use hpkv_common::RecordValue;
    ///
    /// let value = RecordValue::json(&vec![1, 2, 3]).expect("serializable");
    /// assert_eq!(value.to_wire().unwrap(), "[1,2,3]");
    /// ```
    pub fn json<T: Serialize + ?Sized>(value: &T) -> HpkvResult<Self> {
        Ok(RecordValue::Json(serde_json::to_value(value)?))
    }

    /// Builds a raw text value.
    pub fn text(value: impl Into<String>) -> Self {
        RecordValue::Text(value.into())
    }

    /// Encodes the value into the string the service stores.
    pub fn to_wire(&self) -> HpkvResult<String> {
        match self {
            RecordValue::Text(text) => Ok(text.clone()),
            RecordValue::Json(value) => Ok(serde_json::to_string(value)?),
        }
    }

    /// Decodes a stored string, preferring JSON and falling back to text.
    pub fn from_wire(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match serde_json::from_str::<JsonValue>(&raw) {
            Ok(value) => RecordValue::Json(value),
            Err(_) => RecordValue::Text(raw),
        }
    }

    /// Decodes a value field that may already be structured.
    ///
    /// Strings go through [`RecordValue::from_wire`]; any other JSON value is
    /// kept as-is.
    pub fn from_json_field(value: JsonValue) -> Self {
        match value {
            JsonValue::String(raw) => RecordValue::from_wire(raw),
            other => RecordValue::Json(other),
        }
    }

    /// Deserializes the value into a caller-chosen shape.
    ///
    /// Text values are tried as a JSON string, so `String` targets work for
    /// both variants.
    pub fn decode<T: DeserializeOwned>(&self) -> HpkvResult<T> {
        match self {
            RecordValue::Json(value) => Ok(T::deserialize(value)?),
            RecordValue::Text(text) => Ok(T::deserialize(JsonValue::String(text.clone()))?),
        }
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::Text(value)
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::Text(value.to_string())
    }
}

impl From<JsonValue> for RecordValue {
    fn from(value: JsonValue) -> Self {
        RecordValue::Json(value)
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Text(text) => f.write_str(text),
            RecordValue::Json(value) => write!(f, "{}", value),
        }
    }
}
