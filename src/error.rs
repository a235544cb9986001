//! # Error Types
//!
//! Error handling for the cross-chain membership protocol.
//!
//! This module defines every error variant that can surface from the codec,
//! the package dispatcher, the membership engine and the channel migrator.
//!
//! ## Error Categories
//! - **Wire Errors**: malformed ABI payloads, unknown operation types, bad frames
//! - **Request Errors**: payload-level validation failures, malformed addresses
//! - **State Errors**: missing groups or members, duplicate names, source type mismatch
//! - **Authorization Errors**: the operator lacks the required permission
//! - **Upgrade Errors**: channel migration and governance plan failures
//!
//! Inbound cross-chain errors are converted into failure acknowledgements by the
//! group applications; same-chain entry points return them to the caller.
//!
//! ## Example Usage
//! ```rust
//! use membership_protocol::error::{ProtocolError, Result};
//! use membership_protocol::core::primitives::Address;
//!
//! fn parse_operator(input: &str) -> Result<Address> {
//!     input.parse::<Address>()
//! }
//!
//! assert!(matches!(
//!     parse_operator("0x1234"),
//!     Err(ProtocolError::InvalidAddress(_))
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Codec errors
    pub const ERR_INVALID_CROSS_CHAIN_PACKAGE: &str = "invalid cross-chain package";
    pub const ERR_TRUNCATED_PACKAGE: &str = "package truncated";
    pub const ERR_EMPTY_ENVELOPE: &str = "empty cross-chain package envelope";
    pub const ERR_INVALID_PACKAGE_TYPE: &str = "invalid cross-chain package type";
    pub const ERR_UNKNOWN_OPERATION: &str = "operation type not registered for channel";

    /// Request validation errors
    pub const ERR_INVALID_OPERATION_TYPE: &str = "invalid operation type";
    pub const ERR_EMPTY_OPERATOR: &str = "operator address is empty";
    pub const ERR_EMPTY_MEMBER: &str = "member address is empty";
    pub const ERR_MEMBER_EXPIRATION_MISMATCH: &str =
        "members and member expirations differ in length";
    pub const ERR_INVALID_GROUP_NAME: &str = "invalid group name";
    pub const ERR_MEMBER_LIMIT_EXCEEDED: &str = "once update group member limit exceeded";
    pub const ERR_EXTRA_TOO_LONG: &str = "group extra info too long";

    /// State errors
    pub const ERR_NO_SUCH_GROUP: &str = "no such group";
    pub const ERR_NO_SUCH_GROUP_MEMBER: &str = "no such group member";
    pub const ERR_GROUP_ALREADY_EXISTS: &str = "group already exists";
    pub const ERR_GROUP_MEMBER_ALREADY_EXISTS: &str = "group member already exists";

    /// Channel errors
    pub const ERR_CHANNEL_NOT_BOUND: &str = "channel has no bound application";
    pub const ERR_CHANNEL_ALREADY_BOUND: &str = "channel already bound";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    /// Codec or dispatch failure: bad ABI layout, unknown operation type, bad envelope.
    #[error("invalid cross-chain package: {0}")]
    MalformedPackage(String),

    /// Payload-level validation failure.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("source type mismatch")]
    SourceTypeMismatch,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid package sequence on channel {channel}: expected {expected}, got {got}")]
    InvalidSequence { channel: u8, expected: u64, got: u64 },

    #[error("Invalid protocol header")]
    InvalidHeader,

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("unknown upgrade plan: {0}")]
    UnknownUpgrade(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Shorthand for a malformed package carrying a static reason.
    pub(crate) fn malformed(reason: &str) -> Self {
        ProtocolError::MalformedPackage(reason.to_string())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
