//! UA TCP client connection.
//!
//! Dials an `opc.tcp://` endpoint, exchanges HEL/ACK and then carries
//! [`MessageChunk`]s framed by [`ChunkCodec`]. Security and session handling
//! sit above this layer.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument};

use crate::config::{NetworkConfig, TransportConfig};
use crate::core::chunk::{ChunkCodec, MessageChunk, MessageType, DEFAULT_MAX_MESSAGE_SIZE};
use crate::core::codec;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{Acknowledge, ErrorMessage, Hello};
use crate::transport::Connection;
use crate::utils::timeout::{with_timeout_error, DEFAULT_TIMEOUT};

/// Default port for `opc.tcp` endpoints
pub const DEFAULT_PORT: u16 = 4840;

const SCHEME: &str = "opc.tcp://";

/// Split an `opc.tcp://host[:port][/path]` URL into host and port
pub fn parse_endpoint(url: &str) -> Result<(String, u16)> {
    let rest = url
        .strip_prefix(SCHEME)
        .ok_or_else(|| ProtocolError::ConfigError(format!("{}: {url}", constants::ERR_INVALID_ENDPOINT)))?;
    let authority = rest.split('/').next().unwrap_or_default();

    // Bracketed IPv6 literal
    let (host, port) = if let Some(v6) = authority.strip_prefix('[') {
        let (host, tail) = v6
            .split_once(']')
            .ok_or_else(|| ProtocolError::ConfigError(format!("Unterminated IPv6 host in {url}")))?;
        (host, tail.strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(ProtocolError::ConfigError(format!("Missing host in {url}")));
    }
    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| ProtocolError::ConfigError(format!("Invalid port in {url}")))?,
        None => DEFAULT_PORT,
    };
    Ok((host.to_string(), port))
}

/// Chunk connection over a tokio `TcpStream`
pub struct TcpConnection {
    transport: TransportConfig,
    connect_timeout: Duration,
    framed: Option<Framed<TcpStream, ChunkCodec>>,
    negotiated: Option<Acknowledge>,
}

impl TcpConnection {
    pub fn new(transport: TransportConfig, connect_timeout: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
            framed: None,
            negotiated: None,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.transport.clone(), config.client.connection_timeout)
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Limits agreed with the server in its ACK
    pub fn negotiated(&self) -> Option<&Acknowledge> {
        self.negotiated.as_ref()
    }

    fn framed(&mut self) -> Result<&mut Framed<TcpStream, ChunkCodec>> {
        self.framed
            .as_mut()
            .ok_or_else(|| ProtocolError::TransportError(constants::ERR_NOT_CONNECTED.into()))
    }

    fn chunk_limit(size: u32) -> usize {
        match size {
            0 => DEFAULT_MAX_MESSAGE_SIZE,
            size => size as usize,
        }
    }

    async fn handshake(
        &self,
        framed: &mut Framed<TcpStream, ChunkCodec>,
        url: &str,
    ) -> Result<Acknowledge> {
        let hello = Hello::from_config(&self.transport, url);
        framed
            .send(MessageChunk::new(MessageType::Hello, codec::encode(&hello)?))
            .await?;

        let reply = next_chunk(framed).await?;
        match reply.message_type {
            MessageType::Acknowledge => codec::decode::<Acknowledge>(&reply.body),
            MessageType::Error => {
                let message = codec::decode::<ErrorMessage>(&reply.body)?;
                error!(status = %message.error, reason = %message.reason, "Server rejected HEL");
                Err(ProtocolError::ServiceFault(message.error))
            }
            other => {
                error!(message_type = ?other, "Unexpected reply to HEL");
                Err(ProtocolError::UnexpectedMessage)
            }
        }
    }
}

async fn next_chunk(framed: &mut Framed<TcpStream, ChunkCodec>) -> Result<MessageChunk> {
    match framed.next().await {
        Some(chunk) => chunk,
        None => Err(ProtocolError::ConnectionClosed),
    }
}

impl Connection for TcpConnection {
    #[instrument(skip(self), fields(endpoint = %address))]
    async fn connect(&mut self, address: &str) -> Result<()> {
        let (host, port) = parse_endpoint(address)?;
        let deadline = self.connect_timeout;

        let stream = with_timeout_error(
            async { TcpStream::connect((host.as_str(), port)).await.map_err(ProtocolError::from) },
            deadline,
        )
        .await?;
        stream.set_nodelay(true)?;
        debug!(%host, port, "TCP connection established");

        let codec = ChunkCodec::new(Self::chunk_limit(self.transport.receive_buffer_size));
        let mut framed = Framed::new(stream, codec);
        let ack = with_timeout_error(self.handshake(&mut framed, address), deadline).await?;

        // Incoming chunks fit our receive buffer and the server's send buffer;
        // outgoing chunks fit the server's receive buffer
        let receive_limit = Self::chunk_limit(self.transport.receive_buffer_size)
            .min(Self::chunk_limit(ack.send_buffer_size));
        *framed.codec_mut() = ChunkCodec::new(receive_limit)
            .with_send_limit(Self::chunk_limit(ack.receive_buffer_size));

        info!(
            protocol_version = ack.protocol_version,
            receive_buffer_size = ack.receive_buffer_size,
            send_buffer_size = ack.send_buffer_size,
            max_message_size = ack.max_message_size,
            "Connection acknowledged"
        );
        self.negotiated = Some(ack);
        self.framed = Some(framed);
        Ok(())
    }

    async fn send(&mut self, chunk: MessageChunk) -> Result<()> {
        self.framed()?.send(chunk).await
    }

    async fn receive(&mut self) -> Result<MessageChunk> {
        next_chunk(self.framed()?).await
    }

    async fn close(&mut self) -> Result<()> {
        self.negotiated = None;
        match self.framed.take() {
            Some(mut framed) => {
                SinkExt::<MessageChunk>::close(&mut framed).await?;
                debug!("Connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Default for TcpConnection {
    fn default() -> Self {
        Self::new(TransportConfig::default(), DEFAULT_TIMEOUT)
    }
}
