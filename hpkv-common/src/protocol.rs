//! # Wire Structures
//!
//! Purpose: Define the JSON bodies exchanged with the HPKV service over HTTP
//! and the frames exchanged over WebSocket.
//!
//! ## Design Principles
//!
//! 1. **Field Names Match the Service**: camelCase on the wire, snake_case in
//!    Rust, bridged with `#[serde(rename_all = "camelCase")]`.
//! 2. **Optional Means Omitted**: Absent optionals are skipped on output, so
//!    a create body never carries `partialUpdate`.
//! 3. **Lenient Inbound Parsing**: Response fields the client does not need
//!    are ignored, and missing fields default to `None`.
//!
//! ## Endpoints
//!
//! ```text
//! POST   {base}/record            RecordRequest         -> (status only)
//! GET    {base}/record/{key}                            -> RecordResponse
//! DELETE {base}/record/{key}                            -> (status only)
//! POST   {base}/record/atomic     AtomicIncrementRequest -> AtomicIncrementResponse
//! GET    {base}/records?startKey&endKey&limit           -> RangeResponse
//! POST   {base}/token/websocket   TokenRequest          -> TokenResponse
//! WS     {base}/ws?apiKey=..      RequestFrame / ResponseFrame
//! WS     {base}/ws?token=..       ... plus pushed Notification frames
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::opcode::OperationCode;
use crate::types::RecordValue;

/// Header carrying the API key on every HTTP request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Path of the single-record endpoint.
pub const RECORD_PATH: &str = "record";

/// Path segment of the atomic increment endpoint, below `record`.
pub const ATOMIC_PATH: &str = "atomic";

/// Path of the range query endpoint.
pub const RECORDS_PATH: &str = "records";

/// Path of the WebSocket endpoint.
pub const WS_PATH: &str = "ws";

/// Body of a create or update request.
///
/// Use: `POST {base}/record`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    /// Record key.
    pub key: String,
    /// Serialized value (text verbatim or JSON text).
    pub value: String,
    /// Present only on updates; true asks the service to merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_update: Option<bool>,
}

/// Body of a successful read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordResponse {
    /// Stored value, absent when the service has nothing to return.
    #[serde(default)]
    pub value: Option<String>,
}

/// Body of an atomic increment request.
///
/// A negative `increment` decrements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicIncrementRequest {
    pub key: String,
    pub increment: i64,
}

/// Body returned by the atomic increment endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicIncrementResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub new_value: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parameters of a range query over `[start_key, end_key]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub start_key: String,
    pub end_key: String,
    /// Maximum number of records to return; service default when `None`.
    pub limit: Option<u32>,
}

impl RangeQuery {
    /// Builds an unlimited range query.
    pub fn new(start_key: impl Into<String>, end_key: impl Into<String>) -> Self {
        RangeQuery {
            start_key: start_key.into(),
            end_key: end_key.into(),
            limit: None,
        }
    }

    /// Caps the number of returned records.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the query-string pairs in wire order.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("startKey", self.start_key.clone()),
            ("endKey", self.end_key.clone()),
        ];
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// One record inside a range response, as sent by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub key: String,
    pub value: String,
}

/// Body returned by the range query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RangeResponse {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub truncated: Option<bool>,
}

/// A decoded record from a range query.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: RecordValue,
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        Record {
            key: raw.key,
            value: RecordValue::from_wire(raw.value),
        }
    }
}

/// Body of a WebSocket token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Keys the token holder may subscribe to.
    pub subscribe_keys: Vec<String>,
}

/// Body returned by the WebSocket token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Outbound WebSocket frame.
///
/// The correlation id is attached last, right before registration and send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    pub op: OperationCode,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message_id: u64,
}

impl RequestFrame {
    /// Builds a frame body with no correlation id assigned yet.
    pub fn new(op: OperationCode, key: impl Into<String>, value: Option<String>) -> Self {
        RequestFrame {
            op,
            key: key.into(),
            value,
            message_id: 0,
        }
    }
}

/// `type` of frames pushed for subscribed keys.
pub const NOTIFICATION_TYPE: &str = "notification";

/// Change to a subscribed key, pushed without being requested.
///
/// Delivered to connections authenticated with a token whose
/// `subscribeKeys` cover `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub key: String,
    /// New value; `None` when the key was deleted.
    pub value: Option<RecordValue>,
    /// Milliseconds since the Unix epoch, when the service sends one.
    pub timestamp: Option<i64>,
}

/// Inbound WebSocket frame.
///
/// `value` is kept as raw JSON because the service may send either the
/// stored string or a structured payload. `error` is kept raw for the same
/// reason; see [`ResponseFrame::error_text`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    #[serde(default)]
    pub message_id: Option<u64>,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<JsonValue>,
    /// Frame kind for pushed events (`"notification"`); absent on responses.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<JsonValue>,
}

impl ResponseFrame {
    /// Returns the error description, if the frame carries a non-empty one.
    pub fn error_text(&self) -> Option<String> {
        match &self.error {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(text)) if text.is_empty() => None,
            Some(JsonValue::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Decodes the value field, if any.
    pub fn record_value(&self) -> Option<RecordValue> {
        match &self.value {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(RecordValue::from_json_field(value.clone())),
        }
    }

    /// Returns the pushed key-change event this frame carries, if any.
    ///
    /// Only frames without a correlation id qualify; a response that happens
    /// to carry `type` is still a response.
    pub fn notification(&self) -> Option<Notification> {
        if self.message_id.is_some() || self.kind.as_deref() != Some(NOTIFICATION_TYPE) {
            return None;
        }
        let key = self.key.clone()?;
        Some(Notification {
            key,
            value: self.record_value(),
            timestamp: self.timestamp.as_ref().and_then(JsonValue::as_i64),
        })
    }
}
