//! UA TCP message chunks and their framing codec.
//!
//! ## Wire Format
//! ```text
//! [MessageType(3)] [ChunkType(1)] [MessageSize(4, LE, includes header)] [Body(N)]
//! ```
//!
//! The size is validated before the body is buffered, so a hostile peer cannot
//! make the decoder allocate past `max_message_size`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::{ProtocolError, Result};
use crate::utils::metrics;

/// Bytes taken by the chunk header
pub const HEADER_SIZE: usize = 8;

/// Default upper bound on one chunk, header included
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Three-letter message kind at the start of every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    Acknowledge,
    Error,
    ReverseHello,
    OpenChannel,
    Message,
    CloseChannel,
}

impl MessageType {
    pub fn as_bytes(self) -> &'static [u8; 3] {
        match self {
            MessageType::Hello => b"HEL",
            MessageType::Acknowledge => b"ACK",
            MessageType::Error => b"ERR",
            MessageType::ReverseHello => b"RHE",
            MessageType::OpenChannel => b"OPN",
            MessageType::Message => b"MSG",
            MessageType::CloseChannel => b"CLO",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"HEL" => Some(MessageType::Hello),
            b"ACK" => Some(MessageType::Acknowledge),
            b"ERR" => Some(MessageType::Error),
            b"RHE" => Some(MessageType::ReverseHello),
            b"OPN" => Some(MessageType::OpenChannel),
            b"MSG" => Some(MessageType::Message),
            b"CLO" => Some(MessageType::CloseChannel),
            _ => None,
        }
    }
}

/// Whether a chunk completes, continues or aborts its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkType {
    #[default]
    Final,
    Intermediate,
    Abort,
}

impl ChunkType {
    pub fn as_byte(self) -> u8 {
        match self {
            ChunkType::Final => b'F',
            ChunkType::Intermediate => b'C',
            ChunkType::Abort => b'A',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(ChunkType::Final),
            b'C' => Some(ChunkType::Intermediate),
            b'A' => Some(ChunkType::Abort),
            _ => None,
        }
    }
}

/// One framed unit on a UA TCP connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunk {
    pub message_type: MessageType,
    pub chunk_type: ChunkType,
    pub body: Bytes,
}

impl MessageChunk {
    /// A final chunk carrying `body`
    pub fn new(message_type: MessageType, body: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            chunk_type: ChunkType::Final,
            body: body.into(),
        }
    }

    /// Total size on the wire, header included
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        let size = u32::try_from(self.wire_size())
            .map_err(|_| ProtocolError::OversizedPacket(self.wire_size()))?;
        buf.reserve(self.wire_size());
        buf.put_slice(self.message_type.as_bytes());
        buf.put_u8(self.chunk_type.as_byte());
        buf.put_u32_le(size);
        buf.put_slice(&self.body);
        Ok(())
    }

    /// Parse exactly one chunk occupying all of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (message_type, chunk_type, size) = parse_header(data)?;
        if size != data.len() {
            return Err(ProtocolError::InvalidHeader);
        }
        Ok(Self {
            message_type,
            chunk_type,
            body: Bytes::copy_from_slice(&data[HEADER_SIZE..]),
        })
    }
}

/// Validate a chunk header, returning its kinds and declared total size
pub fn parse_header(data: &[u8]) -> Result<(MessageType, ChunkType, usize)> {
    if data.len() < HEADER_SIZE {
        return Err(ProtocolError::InvalidHeader);
    }
    let message_type = MessageType::from_bytes(&data[..3]).ok_or(ProtocolError::InvalidHeader)?;
    let chunk_type = ChunkType::from_byte(data[3]).ok_or(ProtocolError::InvalidHeader)?;
    let mut size_bytes = &data[4..HEADER_SIZE];
    let size = size_bytes.get_u32_le() as usize;
    if size < HEADER_SIZE {
        return Err(ProtocolError::InvalidHeader);
    }
    Ok((message_type, chunk_type, size))
}

/// tokio-util codec framing [`MessageChunk`]s over a byte stream
#[derive(Debug, Clone, Copy)]
pub struct ChunkCodec {
    max_message_size: usize,
    max_send_size: usize,
}

impl ChunkCodec {
    /// One size limit for both directions
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            max_send_size: max_message_size,
        }
    }

    /// Bound outgoing chunks separately, e.g. by the peer's receive buffer
    pub fn with_send_limit(mut self, max_send_size: usize) -> Self {
        self.max_send_size = max_send_size;
        self
    }

    /// Largest chunk the decoder accepts
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Largest chunk the encoder writes
    pub fn max_send_size(&self) -> usize {
        self.max_send_size
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Decoder for ChunkCodec {
    type Item = MessageChunk;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<MessageChunk>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let (message_type, chunk_type, size) = parse_header(&src[..HEADER_SIZE])?;
        if size > self.max_message_size {
            return Err(ProtocolError::OversizedPacket(size));
        }
        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(HEADER_SIZE);
        metrics::global().chunk_received(size);
        trace!(?message_type, ?chunk_type, size, "Decoded chunk");

        Ok(Some(MessageChunk {
            message_type,
            chunk_type,
            body: frame.freeze(),
        }))
    }
}

impl Encoder<MessageChunk> for ChunkCodec {
    type Error = ProtocolError;

    fn encode(&mut self, chunk: MessageChunk, dst: &mut BytesMut) -> Result<()> {
        if chunk.wire_size() > self.max_send_size {
            return Err(ProtocolError::OversizedPacket(chunk.wire_size()));
        }
        chunk.write_to(dst)?;
        metrics::global().chunk_sent(chunk.wire_size());
        Ok(())
    }
}
