//! # Protocol Layer
//!
//! Messages exchanged over a UA TCP connection: the HEL/ACK/ERR handshake
//! bodies and type-id framed service requests and responses.

pub mod message;

pub use message::{
    decode_message, encode_message, peek_type_id, Acknowledge, ErrorMessage, Hello,
    ServiceMessage, ServiceRequest,
};
