//! # Transport Layer
//!
//! Collaborators that move encoded bytes: a chunk [`Connection`] and the
//! [`SecureChannel`] opened over it.
//!
//! ## Components
//! - **Tcp**: UA TCP connection with HEL/ACK negotiation
//! - **Channel**: Error sink a secure channel reports background failures on
//!
//! The codec never calls into this layer; it works on buffers that a
//! connection sends or has received.

use std::future::Future;

use crate::core::chunk::MessageChunk;
use crate::error::Result;

pub mod channel;
pub mod tcp;

pub use channel::{error_channel, report, spawn_error_drain, ErrorSink, ErrorStream};
pub use tcp::TcpConnection;

/// A bidirectional stream of message chunks
pub trait Connection: Send {
    /// Dial `address` and complete any connection-level handshake
    fn connect(&mut self, address: &str) -> impl Future<Output = Result<()>> + Send;

    fn send(&mut self, chunk: MessageChunk) -> impl Future<Output = Result<()>> + Send;

    fn receive(&mut self) -> impl Future<Output = Result<MessageChunk>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Secured session layer over a [`Connection`].
///
/// `open` takes ownership of the connection and may start a background task
/// that keeps reporting failures on `errors` for the lifetime of the channel.
/// The caller owns the receiving half and must keep draining it.
pub trait SecureChannel<C: Connection> {
    fn open(&mut self, connection: C, errors: ErrorSink)
        -> impl Future<Output = Result<()>> + Send;
}
