//! # Asynchronous WebSocket Client
//!
//! Purpose: Multiplex concurrent record operations over one WebSocket
//! connection, matching responses to requests by correlation id.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `WsClient` hides framing, id allocation and the
//!    pending table behind four record operations.
//! 2. **Single Reader**: One spawned task owns the inbound stream and is the
//!    only place responses are dispatched, one frame at a time.
//! 3. **Many Writers**: Any number of tasks may issue requests; the sink is
//!    serialized by an async mutex, the table by its own lock.
//! 4. **No Reconnect**: Once the connection closes the client stays closed.
//!
//! ## Structure Overview
//!
//! ```text
//! WsClient
//!   ├── sink: Mutex<Pin<Box<dyn Sink<Message>>>>    (writers)
//!   ├── reader: JoinHandle<()>                       (read_loop)
//!   └── shared: Arc<Shared>
//!         ├── ids: CorrelationIds
//!         ├── pending: Arc<PendingTable>
//!         ├── state: AtomicU8 (Connecting → Open → Closed)
//!         └── notifications: Mutex<Option<broadcast::Sender<Notification>>>
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use hpkv_common::{
    ClientConfig, HpkvError, HpkvResult, Notification, OperationCode, RecordValue, RequestFrame,
    WsAuth, WS_PATH,
};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::codec::{decode_response, encode_request};
use crate::ws::pending::{Completion, CorrelationIds, PendingResponse, PendingTable};

type BoxedSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Notifications buffered per subscriber before it starts lagging.
const NOTIFICATION_CAPACITY: usize = 256;

/// Connection lifecycle of a [`WsClient`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reader task not started yet. Never observed through a `WsClient`:
    /// `connect` completes the handshake and `from_parts` starts the reader
    /// before either returns.
    Connecting = 0,
    /// Requests may be sent.
    Open = 1,
    /// Terminal; every send fails.
    Closed = 2,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State shared between callers and the reader task.
struct Shared {
    ids: CorrelationIds,
    pending: Arc<PendingTable>,
    state: AtomicU8,
    /// Taken on shutdown so subscribers see `Closed`.
    notifications: parking_lot::Mutex<Option<broadcast::Sender<Notification>>>,
}

impl Shared {
    fn new() -> Self {
        Shared {
            ids: CorrelationIds::new(),
            pending: Arc::new(PendingTable::new()),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            notifications: parking_lot::Mutex::new(Some(
                broadcast::channel(NOTIFICATION_CAPACITY).0,
            )),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_open(&self) {
        // Never reopen a closed connection.
        let _ = self.state.compare_exchange(
            ConnectionState::Connecting as u8,
            ConnectionState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Moves to Closed and rejects everything still pending.
    fn shutdown(&self, reason: &str) {
        let previous = self
            .state
            .swap(ConnectionState::Closed as u8, Ordering::AcqRel);
        let rejected = self.pending.close();
        self.notifications.lock().take();
        if previous != ConnectionState::Closed as u8 {
            info!(reason, rejected, "websocket connection closed");
        }
    }

    /// Routes one inbound text frame to its pending request.
    fn dispatch(&self, text: &str) {
        let frame = match decode_response(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "discarding malformed frame");
                return;
            }
        };

        let Some(id) = frame.message_id else {
            match frame.notification() {
                Some(event) => self.publish(event),
                None => debug!("discarding frame without messageId"),
            }
            return;
        };

        let result: Completion = match frame.error_text() {
            Some(message) => Err(HpkvError::Service(message)),
            None => Ok(frame.record_value()),
        };

        if !self.pending.complete(id, result) {
            debug!(message_id = id, "discarding response for unknown correlation id");
        }
    }

    fn publish(&self, event: Notification) {
        debug!(key = %event.key, "notification received");
        if let Some(tx) = self.notifications.lock().as_ref() {
            // Err only means nobody is subscribed.
            let _ = tx.send(event);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        match self.notifications.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            // Closed already: the sender is dropped at once, so `recv` reports Closed.
            None => broadcast::channel(1).1,
        }
    }
}

/// Asynchronous HPKV client over a single WebSocket connection.
///
/// The record operations come in two flavours: `try_*` methods return the
/// error category, while `create`/`read`/`update`/`delete` log failures and
/// collapse them into `false`/`None`.
pub struct WsClient {
    shared: Arc<Shared>,
    sink: Mutex<BoxedSink>,
    reader: JoinHandle<()>,
    response_timeout: Option<Duration>,
}

impl WsClient {
    /// Connects to `{base}/ws` and starts the reader task.
    pub async fn connect(config: &ClientConfig) -> HpkvResult<Self> {
        let url = websocket_url(config)?;
        debug!(host = url.host_str().unwrap_or(""), "connecting websocket");

        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|err| HpkvError::Transport(format!("failed to connect: {}", err)))?;
        info!(status = %response.status(), "websocket connection established");

        let (sink, stream) = stream.split();
        Ok(Self::from_parts(sink, stream).with_response_timeout(config.response_timeout))
    }

    /// Builds a client over an already-open message transport.
    ///
    /// Must be called inside a Tokio runtime; the reader task is spawned
    /// immediately.
    pub fn from_parts<Si, St>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Message, Error = WsError> + Send + 'static,
        St: Stream<Item = Result<Message, WsError>> + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared::new());
        let reader = tokio::spawn(read_loop(stream, shared.clone()));
        shared.set_open();

        WsClient {
            shared,
            sink: Mutex::new(Box::pin(sink)),
            reader,
            response_timeout: None,
        }
    }

    /// Rejects requests whose response takes longer than `timeout`.
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Subscribes to key-change notifications pushed by the service.
    ///
    /// Only events that arrive after this call are seen. A receiver that
    /// falls more than a few hundred events behind gets `Lagged` and skips
    /// ahead; once the connection closes, `recv` returns `Closed`.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.shared.subscribe()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Sends one request and returns a handle to its eventual response.
    ///
    /// The value is serialized before anything is registered, and the
    /// pending entry exists before the frame is written. A failed write
    /// removes the entry again before the error is returned.
    pub async fn request(
        &self,
        op: OperationCode,
        key: &str,
        value: Option<&RecordValue>,
    ) -> HpkvResult<PendingResponse> {
        if self.state() == ConnectionState::Closed {
            return Err(HpkvError::ConnectionClosed);
        }
        if op.carries_value() != value.is_some() {
            let expectation = if op.carries_value() { "requires" } else { "does not take" };
            return Err(HpkvError::Protocol(format!("{} {} a value", op, expectation)));
        }

        let value = value.map(RecordValue::to_wire).transpose()?;
        let mut frame = RequestFrame::new(op, key, value);
        frame.message_id = self.shared.ids.next_id();
        let text = encode_request(&frame)?;

        let id = frame.message_id;
        let rx = self.shared.pending.register(id)?;
        let handle = PendingResponse::new(id, rx, self.shared.pending.clone());

        let sent = {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(text.into())).await
        };

        if let Err(err) = sent {
            self.shared.pending.remove(id);
            warn!(message_id = id, op = %op, key, error = %err, "failed to send request");
            if matches!(err, WsError::ConnectionClosed | WsError::AlreadyClosed) {
                self.shared.shutdown("send on closed connection");
            }
            return Err(HpkvError::Transport(format!("failed to send message: {}", err)));
        }

        debug!(message_id = id, op = %op, key, "request sent");
        Ok(handle)
    }

    async fn roundtrip(
        &self,
        op: OperationCode,
        key: &str,
        value: Option<&RecordValue>,
    ) -> Completion {
        let handle = self.request(op, key, value).await?;
        let id = handle.id();
        match self.response_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(message_id = id, ?limit, "request timed out");
                    Err(HpkvError::Timeout)
                }
            },
            None => handle.await,
        }
    }

    /// Creates or replaces a record.
    pub async fn try_create(&self, key: &str, value: impl Into<RecordValue>) -> HpkvResult<()> {
        let value = value.into();
        self.roundtrip(OperationCode::Insert, key, Some(&value))
            .await
            .map(|_| ())
    }

    /// Fetches a record; `Ok(None)` when the response carried no value.
    pub async fn try_read(&self, key: &str) -> HpkvResult<Option<RecordValue>> {
        self.roundtrip(OperationCode::Get, key, None).await
    }

    /// Updates a record, merging when `partial` is set.
    pub async fn try_update(
        &self,
        key: &str,
        value: impl Into<RecordValue>,
        partial: bool,
    ) -> HpkvResult<()> {
        let value = value.into();
        self.roundtrip(OperationCode::for_update(partial), key, Some(&value))
            .await
            .map(|_| ())
    }

    /// Deletes a record.
    pub async fn try_delete(&self, key: &str) -> HpkvResult<()> {
        self.roundtrip(OperationCode::Delete, key, None)
            .await
            .map(|_| ())
    }

    /// Returns true unless the request failed or the service reported an error.
    pub async fn create(&self, key: &str, value: impl Into<RecordValue>) -> bool {
        report("create", key, self.try_create(key, value).await).is_some()
    }

    /// Returns the decoded value, or `None` on any error.
    pub async fn read(&self, key: &str) -> Option<RecordValue> {
        report("read", key, self.try_read(key).await).flatten()
    }

    /// Reads a record and deserializes it into `T`.
    ///
    /// A value that does not fit `T` yields `None` (logged). Use
    /// [`WsClient::read`] to get the raw `Text` fallback instead.
    pub async fn read_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read(key).await?;
        report("decode", key, value.decode())
    }

    pub async fn update(&self, key: &str, value: impl Into<RecordValue>, partial: bool) -> bool {
        report("update", key, self.try_update(key, value, partial).await).is_some()
    }

    pub async fn delete(&self, key: &str) -> bool {
        report("delete", key, self.try_delete(key).await).is_some()
    }

    /// Sends a close frame and moves to Closed.
    ///
    /// Requests still pending are rejected with `ConnectionClosed`.
    pub async fn close(&self) -> HpkvResult<()> {
        if self.state() == ConnectionState::Closed {
            return Ok(());
        }
        let result = {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        self.shared.shutdown("closed by client");
        match result {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(HpkvError::Transport(err.to_string())),
        }
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.shared.shutdown("client dropped");
    }
}

/// Logs a failed operation and converts the result into an `Option`.
fn report<T>(operation: &str, key: &str, result: HpkvResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(operation, key, error = %err, "websocket operation failed");
            None
        }
    }
}

/// Drains the inbound stream until it ends or errors, then closes the client.
async fn read_loop<St>(mut stream: St, shared: Arc<Shared>)
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => shared.dispatch(text.as_str()),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => shared.dispatch(text),
                Err(_) => warn!(len = data.len(), "discarding non-UTF-8 binary frame"),
            },
            Ok(Message::Close(frame)) => {
                debug!(?frame, "server sent close frame");
                break;
            }
            // Ping/pong replies are handled by tungstenite.
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "websocket read failed");
                break;
            }
        }
    }
    shared.shutdown("connection closed");
}

/// Builds `{ws-base}/ws?apiKey=...` (or `?token=...`) from the HTTP base URL.
///
/// `https` becomes `wss`, `http` becomes `ws`, and a URL without scheme is
/// assumed to be `wss`.
pub fn websocket_url(config: &ClientConfig) -> HpkvResult<Url> {
    let base = config.base_url();
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("wss://{}", base)
    };

    let mut url = Url::parse(&ws_base)
        .map_err(|err| HpkvError::Config(format!("invalid base URL {}: {}", base, err)))?;
    url.path_segments_mut()
        .map_err(|_| HpkvError::Config(format!("base URL {} cannot carry a path", base)))?
        .pop_if_empty()
        .push(WS_PATH);

    let (name, credential) = match &config.ws_auth {
        WsAuth::ApiKey => ("apiKey", config.api_key()),
        WsAuth::Token(token) => ("token", token.as_str()),
    };
    url.query_pairs_mut().append_pair(name, credential);
    Ok(url)
}
