//! # Error Types
//!
//! One error enum shared by both transports. Variants are grouped by the
//! category a caller may need to branch on: configuration, transport,
//! protocol, and errors reported by the service itself.

use thiserror::Error;

/// Result type alias using HpkvError
pub type HpkvResult<T> = std::result::Result<T, HpkvError>;

/// Unified error type for HPKV client operations
#[derive(Debug, Error)]
pub enum HpkvError {
    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for response")]
    Timeout,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("correlation id {0} is already pending")]
    DuplicateCorrelationId(u64),

    // -------------------------------------------------------------------------
    // Application Errors
    // -------------------------------------------------------------------------
    #[error("record not found")]
    NotFound,

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service error: {0}")]
    Service(String),
}

impl HpkvError {
    /// Returns true when the service reported the record as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HpkvError::NotFound)
    }
}
