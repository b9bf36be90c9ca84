//! Transport handshake messages and service message framing.
//!
//! `Hello`, `Acknowledge` and `ErrorMessage` travel as the bodies of HEL, ACK
//! and ERR chunks. Service requests and responses are prefixed with the NodeId
//! of their binary encoding so the receiver can tell a response from a
//! [`ServiceFault`].

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::core::codec::{self, Encodable};
use crate::core::descriptor::Structure;
use crate::error::{ProtocolError, Result};
use crate::types::service::{
    ActivateSessionRequest, ActivateSessionResponse, BrowseRequest, BrowseResponse,
    CreateSessionRequest, CreateSessionResponse, ServiceFault,
};
use crate::types::{NodeId, StatusCode};
use crate::ua_struct;
use crate::utils::metrics;

ua_struct! {
    /// Client greeting opening a UA TCP connection
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Hello {
        pub protocol_version: u32,
        pub receive_buffer_size: u32,
        pub send_buffer_size: u32,
        pub max_message_size: u32,
        pub max_chunk_count: u32,
        pub endpoint_url: String,
    }
}

impl Hello {
    pub fn from_config(config: &TransportConfig, endpoint_url: impl Into<String>) -> Self {
        Self {
            protocol_version: config.protocol_version,
            receive_buffer_size: config.receive_buffer_size,
            send_buffer_size: config.send_buffer_size,
            max_message_size: config.max_message_size,
            max_chunk_count: config.max_chunk_count,
            endpoint_url: endpoint_url.into(),
        }
    }
}

ua_struct! {
    /// Server answer to [`Hello`] carrying the negotiated limits
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Acknowledge {
        pub protocol_version: u32,
        pub receive_buffer_size: u32,
        pub send_buffer_size: u32,
        pub max_message_size: u32,
        pub max_chunk_count: u32,
    }
}

ua_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct ErrorMessage {
        pub error: StatusCode,
        pub reason: String,
    }
}

/// A structure sent as a service body, identified by its binary encoding id
pub trait ServiceMessage: Structure {
    /// Numeric id, namespace 0, of the `Default Binary` encoding node
    const TYPE_ID: u32;
}

/// A request and the response the server answers it with
pub trait ServiceRequest: ServiceMessage {
    type Response: ServiceMessage;
}

macro_rules! service_messages {
    ($($ty:ty => $id:expr;)*) => {
        $(
            impl ServiceMessage for $ty {
                const TYPE_ID: u32 = $id;
            }
        )*
    };
}

service_messages! {
    ServiceFault => 397;
    CreateSessionRequest => 461;
    CreateSessionResponse => 464;
    ActivateSessionRequest => 467;
    ActivateSessionResponse => 470;
    BrowseRequest => 527;
    BrowseResponse => 530;
}

impl ServiceRequest for CreateSessionRequest {
    type Response = CreateSessionResponse;
}

impl ServiceRequest for ActivateSessionRequest {
    type Response = ActivateSessionResponse;
}

impl ServiceRequest for BrowseRequest {
    type Response = BrowseResponse;
}

/// Encode `message` preceded by its type id
pub fn encode_message<M: ServiceMessage>(message: &M) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    let result = NodeId::numeric(0, M::TYPE_ID)
        .encode(&mut buf)
        .and_then(|()| message.encode(&mut buf));

    match result {
        Ok(()) => {
            metrics::global().message_encoded(buf.len());
            debug!(type_id = M::TYPE_ID, bytes = buf.len(), "Encoded service message");
            Ok(buf.freeze())
        }
        Err(e) => {
            metrics::global().codec_error();
            Err(e)
        }
    }
}

/// Read the type id at the front of a service body
pub fn peek_type_id(data: &[u8]) -> Result<NodeId> {
    let mut buf = data;
    let mut type_id = NodeId::default();
    type_id.decode(&mut buf)?;
    Ok(type_id)
}

/// Decode a service body expected to hold `M`.
///
/// A [`ServiceFault`] in its place becomes [`ProtocolError::ServiceFault`]
/// with the fault's service result; any other type id is
/// [`ProtocolError::UnexpectedMessage`].
pub fn decode_message<M: ServiceMessage>(data: &[u8]) -> Result<M> {
    let mut buf = data;
    let mut type_id = NodeId::default();
    type_id.decode(&mut buf)?;

    match type_id.as_ns0_numeric() {
        Some(id) if id == M::TYPE_ID => codec::decode::<M>(buf),
        Some(id) if id == ServiceFault::TYPE_ID => {
            let fault = codec::decode::<ServiceFault>(buf)?;
            let status = fault.response_header.service_result;
            warn!(status = %status, expected = M::TYPE_ID, "Server answered with a fault");
            Err(ProtocolError::ServiceFault(status))
        }
        _ => {
            warn!(type_id = %type_id, expected = M::TYPE_ID, "Unexpected service message");
            Err(ProtocolError::UnexpectedMessage)
        }
    }
}
