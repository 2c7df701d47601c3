//! WebSocket transport.
//!
//! `pending` holds the correlation core (id source, pending table, response
//! handle); `client` drives it over a tungstenite connection.

mod client;
mod pending;

pub use client::{websocket_url, ConnectionState, WsClient};
pub use pending::{Completion, CorrelationIds, PendingResponse, PendingTable};
pub use tokio_tungstenite::tungstenite::{Error as WsError, Message};
