//! # HPKV Clients
//!
//! Purpose: Talk to a hosted HPKV key-value service over HTTP or WebSocket.
//!
//! ## Design Principles
//! 1. **Two Independent Transports**: `RestClient` (blocking, one request per
//!    call) and `WsClient` (async, many requests over one connection) share
//!    only the wire types from `hpkv-common`.
//! 2. **Correlation by Id**: The WebSocket client tags every request with a
//!    monotonically increasing id and resolves it when the matching response
//!    arrives, in whatever order responses come.
//! 3. **Typed Values**: Values are a `RecordValue` tagged union rather than
//!    runtime type checks.
//! 4. **Pushed Events**: Frames without a correlation id that carry
//!    `type: "notification"` go to `WsClient::notifications` subscribers.
//! 5. **Errors Kept or Collapsed**: `try_*` methods return `HpkvResult`;
//!    the plain methods log and return `bool`/`Option`.

mod codec;
mod rest;
pub mod ws;

pub use codec::{decode_response, encode_request};
pub use rest::{RangePage, RestClient};
pub use ws::{ConnectionState, PendingResponse, WsClient};

pub use hpkv_common::{
    ClientConfig, HpkvError, HpkvResult, Notification, RangeQuery, Record, RecordValue,
};
