//! # WebSocket Frame Encoding and Parsing
//!
//! Purpose: Turn request frames into text messages and inbound text into
//! response frames, rejecting anything that is not a JSON object.
//!
//! ## Design Principles
//! 1. **State-Free**: Each frame is encoded/decoded on its own.
//! 2. **Fail Fast**: Non-object payloads are protocol errors, not silently
//!    defaulted frames.
//! 3. **Lenient Fields**: Unknown fields in responses are ignored.

use hpkv_common::{HpkvError, HpkvResult, RequestFrame, ResponseFrame};
use serde_json::Value as JsonValue;

/// Encodes a request frame as JSON text.
pub fn encode_request(frame: &RequestFrame) -> HpkvResult<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Parses one inbound text message.
pub fn decode_response(text: &str) -> HpkvResult<ResponseFrame> {
    let value: JsonValue = serde_json::from_str(text)
        .map_err(|err| HpkvError::Protocol(format!("invalid JSON frame: {}", err)))?;
    if !value.is_object() {
        return Err(HpkvError::Protocol("frame is not a JSON object".to_string()));
    }
    serde_json::from_value(value)
        .map_err(|err| HpkvError::Protocol(format!("unexpected frame shape: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpkv_common::{OperationCode, RecordValue};
    use serde_json::json;

    #[test]
    fn encodes_request() {
        let mut frame = RequestFrame::new(OperationCode::Insert, "k", Some("v".to_string()));
        frame.message_id = 12;
        let text = encode_request(&frame).unwrap();
        let value: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"op": 2, "key": "k", "value": "v", "messageId": 12}));
    }

    #[test]
    fn parses_value_response() {
        let frame = decode_response(r#"{"messageId":1,"value":"hello"}"#).unwrap();
        assert_eq!(frame.message_id, Some(1));
        assert_eq!(frame.record_value(), Some(RecordValue::text("hello")));
    }

    #[test]
    fn parses_error_response() {
        let frame = decode_response(r#"{"messageId":2,"error":"Key not found"}"#).unwrap();
        assert_eq!(frame.error_text().as_deref(), Some("Key not found"));
    }

    #[test]
    fn parses_frame_without_id() {
        let frame = decode_response(r#"{"type":"notification","key":"a"}"#).unwrap();
        assert_eq!(frame.message_id, None);
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(decode_response("[1,2]"), Err(HpkvError::Protocol(_))));
        assert!(matches!(decode_response("not json"), Err(HpkvError::Protocol(_))));
    }

    #[test]
    fn rejects_bad_id_type() {
        assert!(matches!(
            decode_response(r#"{"messageId":"abc"}"#),
            Err(HpkvError::Protocol(_))
        ));
    }
}
