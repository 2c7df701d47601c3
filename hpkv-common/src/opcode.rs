// opcode.rs - operation codes for the HPKV WebSocket protocol
//
// Every outbound WebSocket frame carries an integer `op` field telling the
// service which record operation to run. The REST API encodes the same
// operations as HTTP method + path instead, so these codes only matter on
// the message transport.
//
// ============================================================================
// FRAME SHAPE
// ============================================================================
//
//   outbound: {"op": 2, "key": "user:1", "value": "{...}", "messageId": 7}
//   inbound:  {"messageId": 7, "value": "..."}  or  {"messageId": 7, "error": "..."}
//
// The `messageId` is the correlation id; the op code never appears in
// responses, so a response can only be matched to its request by id.
//
// ============================================================================
// DESIGN NOTES
// ============================================================================
//
// - Codes start at 1; 0 is never sent.
// - INSERT replaces the stored value wholesale, UPDATE merges into it.
// - Only GET is read-only.

/// Operation code for GET (fetch a record by key).
pub const OP_GET: u8 = 1;

/// Operation code for INSERT (create or fully replace a record).
pub const OP_INSERT: u8 = 2;

/// Operation code for UPDATE (merge the value into the existing record).
///
/// Used by partial updates only; a full update is sent as INSERT.
pub const OP_UPDATE: u8 = 3;

/// Operation code for DELETE (remove a record by key).
pub const OP_DELETE: u8 = 4;

// ============================================================================
// OPERATION ENUMERATION
// ============================================================================

/// Record operations understood by the WebSocket endpoint.
///
/// Each variant corresponds to one of the OP_* constants above.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCode {
    /// Fetch a record
    Get = OP_GET,

    /// Create or replace a record
    Insert = OP_INSERT,

    /// Merge into an existing record
    Update = OP_UPDATE,

    /// Remove a record
    Delete = OP_DELETE,
}

impl OperationCode {
    /// Convert operation to its wire number
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to create an operation from its wire number
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            OP_GET => Some(Self::Get),
            OP_INSERT => Some(Self::Insert),
            OP_UPDATE => Some(Self::Update),
            OP_DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    /// Picks the code for an update: merge when partial, replace otherwise.
    pub const fn for_update(partial: bool) -> Self {
        if partial {
            Self::Update
        } else {
            Self::Insert
        }
    }

    /// Get human-readable operation name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Check if operation carries a value payload
    pub const fn carries_value(self) -> bool {
        matches!(self, Self::Insert | Self::Update)
    }
}

impl std::fmt::Display for OperationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl serde::Serialize for OperationCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> serde::Deserialize<'de> for OperationCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown operation code {raw}")))
    }
}

// ============================================================================
// TESTS
// ============================================================================
