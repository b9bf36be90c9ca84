//! # Error Types
//!
//! Error handling for the encoding layer and its transport collaborators.
//!
//! ## Error Categories
//! - **Metadata Errors**: Unparseable field tags, surfaced with the offending field's name
//! - **Codec Errors**: Unknown siblings, values that do not fit their width, short buffers
//! - **Built-in Encoding Errors**: Malformed NodeIds, invalid UTF-8, bad array lengths
//! - **Transport Errors**: I/O failures, bad chunk headers, timeouts, service faults
//!
//! Every core error is deterministic and local. Nothing is retried.
//!
//! ## Example Usage
//! ```rust
//! use ua_protocol::core::tag::FieldTag;
//! use ua_protocol::error::ProtocolError;
//!
//! let err = "bits=abc".parse::<FieldTag>().unwrap_err();
//! assert!(matches!(err, ProtocolError::InvalidTag));
//! ```

use crate::types::StatusCode;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Descriptor cache errors
    pub const ERR_CACHE_WRITE_LOCK: &str = "Failed to acquire write lock on descriptor cache";
    pub const ERR_CACHE_READ_LOCK: &str = "Failed to acquire read lock on descriptor cache";
    pub const ERR_CACHE_TYPE_MISMATCH: &str = "Descriptor cache entry has an unexpected type";

    /// Built-in encoding errors
    pub const ERR_INVALID_UTF8: &str = "String is not valid UTF-8";
    pub const ERR_NEGATIVE_LENGTH: &str = "Negative length other than -1";
    pub const ERR_LENGTH_OVERFLOW: &str = "Length does not fit in Int32";

    /// Connection errors
    pub const ERR_NOT_CONNECTED: &str = "Connection has not been established";
    pub const ERR_INVALID_ENDPOINT: &str = "Endpoint URL must start with opc.tcp://";

    /// Logging setup errors
    pub const ERR_LOGGING_INIT: &str = "Failed to install tracing subscriber";
}

/// ProtocolError is the primary error type for all encoding and transport operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid tag")]
    InvalidTag,

    /// A failure wrapped with the immediate field name that triggered it
    #[error("field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ProtocolError>,
    },

    #[error("field {field}: unknown sibling field {sibling}")]
    UnknownSibling { field: String, sibling: String },

    #[error("field {field}: sibling {sibling} is not decoded before it")]
    LinkOrder { field: String, sibling: String },

    #[error("field {0} does not hold an integer value")]
    NotInteger(String),

    #[error("field {field}: value {value} does not fit in {bits} bits")]
    ValueOutOfRange { field: String, bits: u32, value: i64 },

    #[error("Unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Unsupported operation for {0}")]
    UnsupportedType(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Invalid message header")]
    InvalidHeader,

    #[error("Message too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Unexpected message type")]
    UnexpectedMessage,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Service fault: {0}")]
    ServiceFault(StatusCode),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Wrap this error with the name of the field being processed
    pub fn in_field(self, field: impl Into<String>) -> Self {
        ProtocolError::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Name of the field this error was attached to, if any
    pub fn field_name(&self) -> Option<&str> {
        match self {
            ProtocolError::Field { field, .. }
            | ProtocolError::UnknownSibling { field, .. }
            | ProtocolError::LinkOrder { field, .. }
            | ProtocolError::ValueOutOfRange { field, .. } => Some(field),
            ProtocolError::NotInteger(field) => Some(field),
            _ => None,
        }
    }

    /// Innermost error, skipping field context wrappers
    pub fn root_cause(&self) -> &ProtocolError {
        match self {
            ProtocolError::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
