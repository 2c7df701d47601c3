// hpkv-common - Shared types and protocol definitions for the HPKV clients
//
// This crate defines the wire format spoken by both the REST and the
// WebSocket client, plus the error and configuration types they share.

pub mod opcode;
pub mod error;
pub mod types;
pub mod protocol;
pub mod config;

// Re-export for convenience
pub use opcode::*;
pub use error::*;
pub use types::*;
pub use protocol::*;
pub use config::*;
