//! # Built-in Types
//!
//! Part 6 built-in types that the message layer is assembled from.
//!
//! Types with a fixed or variant wire shape (`NodeId`, `Guid`, `DateTime` ...)
//! implement [`Encodable`] by hand. Types whose shape is an encoding mask plus
//! optional members (`LocalizedText`, `ExtensionObject`, `DiagnosticInfo`) are
//! declared with [`ua_struct!`](crate::ua_struct) so their masks go through
//! bit packing and their optional members through switch gating.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};
use rand::RngCore;

use crate::core::codec::{ensure_remaining, get_length, put_length, Encodable};
use crate::error::{ProtocolError, Result};
use crate::ua_struct;

/// Raw bytes framed like a string. Empty encodes as null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteString(pub Vec<u8>);

impl ByteString {
    pub fn null() -> Self {
        Self(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `len` bytes from the thread-local CSPRNG, used for session nonces
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for ByteString {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Encodable for ByteString {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        if self.0.is_empty() {
            return put_length(buf, None);
        }
        put_length(buf, Some(self.0.len()))?;
        buf.put_slice(&self.0);
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        let len = get_length(buf)?.unwrap_or(0);
        ensure_remaining(buf, len)?;
        self.0 = buf[..len].to_vec();
        buf.advance(len);
        Ok(())
    }
}

/// 100 ns intervals between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Int64 count of 100 ns ticks since 1601-01-01 UTC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(pub i64);

impl DateTime {
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub fn ticks(&self) -> i64 {
        self.0
    }

    /// `None` for the null (zero) timestamp
    pub fn to_system_time(&self) -> Option<SystemTime> {
        if self.0 == 0 {
            return None;
        }
        let since_unix = self.0 - UNIX_EPOCH_TICKS;
        let nanos = |ticks: i64| Duration::from_nanos(ticks.unsigned_abs() * 100);
        if since_unix >= 0 {
            UNIX_EPOCH.checked_add(nanos(since_unix))
        } else {
            UNIX_EPOCH.checked_sub(nanos(since_unix))
        }
    }
}

impl From<SystemTime> for DateTime {
    fn from(time: SystemTime) -> Self {
        let ticks = |d: Duration| {
            (d.as_secs() as i64)
                .saturating_mul(TICKS_PER_SECOND)
                .saturating_add(i64::from(d.subsec_nanos() / 100))
        };
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(UNIX_EPOCH_TICKS.saturating_add(ticks(after))),
            Err(before) => Self(UNIX_EPOCH_TICKS.saturating_sub(ticks(before.duration())).max(0)),
        }
    }
}

impl Encodable for DateTime {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_i64_le(self.0);
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 8)?;
        self.0 = buf.get_i64_le();
        Ok(())
    }
}

/// 16-byte identifier with the Part 6 mixed-endian layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Random (version 4) guid
    pub fn new_random() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;

        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self {
            data1: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_be_bytes([bytes[4], bytes[5]]),
            data3: u16::from_be_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl Encodable for Guid {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32_le(self.data1);
        buf.put_u16_le(self.data2);
        buf.put_u16_le(self.data3);
        buf.put_slice(&self.data4);
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 16)?;
        self.data1 = buf.get_u32_le();
        self.data2 = buf.get_u16_le();
        self.data3 = buf.get_u16_le();
        buf.copy_to_slice(&mut self.data4);
        Ok(())
    }
}

/// UInt32 result code; the top two bits carry the severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0);
    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode(0x8001_0000);
    pub const BAD_ENCODING_ERROR: StatusCode = StatusCode(0x8006_0000);
    pub const BAD_DECODING_ERROR: StatusCode = StatusCode(0x8007_0000);
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    pub const BAD_SERVICE_UNSUPPORTED: StatusCode = StatusCode(0x800B_0000);
    pub const BAD_SESSION_ID_INVALID: StatusCode = StatusCode(0x8025_0000);
    pub const BAD_TCP_MESSAGE_TOO_LARGE: StatusCode = StatusCode(0x8080_0000);
    pub const BAD_PROTOCOL_VERSION_UNSUPPORTED: StatusCode = StatusCode(0x80BE_0000);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl Encodable for StatusCode {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.0.encode(buf)
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        self.0.decode(buf)
    }

    fn to_integer(&self) -> Option<i64> {
        Some(i64::from(self.0))
    }
}

/// Identifier half of a [`NodeId`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(String),
    Guid(Guid),
    Opaque(ByteString),
}

impl Default for Identifier {
    fn default() -> Self {
        Identifier::Numeric(0)
    }
}

const NODE_ID_TWO_BYTE: u8 = 0x00;
const NODE_ID_FOUR_BYTE: u8 = 0x01;
const NODE_ID_NUMERIC: u8 = 0x02;
const NODE_ID_STRING: u8 = 0x03;
const NODE_ID_GUID: u8 = 0x04;
const NODE_ID_OPAQUE: u8 = 0x05;

const EXPANDED_NAMESPACE_URI: u8 = 0x80;
const EXPANDED_SERVER_INDEX: u8 = 0x40;

/// Namespace-qualified node identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn numeric(namespace: u16, id: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(id),
        }
    }

    pub fn string(namespace: u16, id: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(id.into()),
        }
    }

    pub fn guid(namespace: u16, id: Guid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(id),
        }
    }

    pub fn opaque(namespace: u16, id: impl Into<ByteString>) -> Self {
        Self {
            namespace,
            identifier: Identifier::Opaque(id.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Numeric id in namespace 0, as used for type ids
    pub fn as_ns0_numeric(&self) -> Option<u32> {
        match (&self.identifier, self.namespace) {
            (Identifier::Numeric(id), 0) => Some(*id),
            _ => None,
        }
    }

    /// Write the most compact form, OR-ing `flags` into the encoding byte
    fn encode_with_flags(&self, flags: u8, buf: &mut BytesMut) -> Result<()> {
        match &self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 && *id <= 0xFF => {
                buf.put_u8(NODE_ID_TWO_BYTE | flags);
                buf.put_u8(*id as u8);
            }
            Identifier::Numeric(id) if self.namespace <= 0xFF && *id <= 0xFFFF => {
                buf.put_u8(NODE_ID_FOUR_BYTE | flags);
                buf.put_u8(self.namespace as u8);
                buf.put_u16_le(*id as u16);
            }
            Identifier::Numeric(id) => {
                buf.put_u8(NODE_ID_NUMERIC | flags);
                buf.put_u16_le(self.namespace);
                buf.put_u32_le(*id);
            }
            Identifier::String(id) => {
                buf.put_u8(NODE_ID_STRING | flags);
                buf.put_u16_le(self.namespace);
                id.encode(buf)?;
            }
            Identifier::Guid(id) => {
                buf.put_u8(NODE_ID_GUID | flags);
                buf.put_u16_le(self.namespace);
                id.encode(buf)?;
            }
            Identifier::Opaque(id) => {
                buf.put_u8(NODE_ID_OPAQUE | flags);
                buf.put_u16_le(self.namespace);
                id.encode(buf)?;
            }
        }
        Ok(())
    }

    /// Read the body that follows an encoding byte whose flag bits are cleared
    fn read_body(encoding: u8, buf: &mut &[u8]) -> Result<Self> {
        let node = match encoding {
            NODE_ID_TWO_BYTE => {
                ensure_remaining(buf, 1)?;
                NodeId::numeric(0, u32::from(buf.get_u8()))
            }
            NODE_ID_FOUR_BYTE => {
                ensure_remaining(buf, 3)?;
                let namespace = u16::from(buf.get_u8());
                NodeId::numeric(namespace, u32::from(buf.get_u16_le()))
            }
            NODE_ID_NUMERIC => {
                ensure_remaining(buf, 6)?;
                let namespace = buf.get_u16_le();
                NodeId::numeric(namespace, buf.get_u32_le())
            }
            NODE_ID_STRING => {
                let namespace = read_namespace(buf)?;
                let mut id = String::new();
                id.decode(buf)?;
                NodeId::string(namespace, id)
            }
            NODE_ID_GUID => {
                let namespace = read_namespace(buf)?;
                let mut id = Guid::default();
                id.decode(buf)?;
                NodeId::guid(namespace, id)
            }
            NODE_ID_OPAQUE => {
                let namespace = read_namespace(buf)?;
                let mut id = ByteString::default();
                id.decode(buf)?;
                NodeId::opaque(namespace, id)
            }
            other => {
                return Err(ProtocolError::InvalidEncoding(format!(
                    "unknown NodeId encoding 0x{other:02X}"
                )))
            }
        };
        Ok(node)
    }
}

fn read_namespace(buf: &mut &[u8]) -> Result<u16> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16_le())
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(id) => write!(f, "i={id}"),
            Identifier::String(id) => write!(f, "s={id}"),
            Identifier::Guid(id) => write!(f, "g={id}"),
            Identifier::Opaque(id) => {
                f.write_str("b=")?;
                id.as_bytes().iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
        }
    }
}

impl Encodable for NodeId {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.encode_with_flags(0, buf)
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 1)?;
        let encoding = buf.get_u8();
        if encoding & (EXPANDED_NAMESPACE_URI | EXPANDED_SERVER_INDEX) != 0 {
            return Err(ProtocolError::InvalidEncoding(format!(
                "NodeId encoding 0x{encoding:02X} carries ExpandedNodeId flags"
            )));
        }
        *self = NodeId::read_body(encoding, buf)?;
        Ok(())
    }
}

/// NodeId with optional namespace URI and server index
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: String,
    pub server_index: u32,
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self {
            node_id,
            ..Self::default()
        }
    }
}

impl Encodable for ExpandedNodeId {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let mut flags = 0;
        if !self.namespace_uri.is_empty() {
            flags |= EXPANDED_NAMESPACE_URI;
        }
        if self.server_index != 0 {
            flags |= EXPANDED_SERVER_INDEX;
        }
        self.node_id.encode_with_flags(flags, buf)?;
        if !self.namespace_uri.is_empty() {
            self.namespace_uri.encode(buf)?;
        }
        if self.server_index != 0 {
            buf.put_u32_le(self.server_index);
        }
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 1)?;
        let encoding = buf.get_u8();
        let node_id = NodeId::read_body(encoding & 0x3F, buf)?;

        let mut namespace_uri = String::new();
        if encoding & EXPANDED_NAMESPACE_URI != 0 {
            namespace_uri.decode(buf)?;
        }
        let mut server_index = 0u32;
        if encoding & EXPANDED_SERVER_INDEX != 0 {
            server_index.decode(buf)?;
        }

        *self = Self {
            node_id,
            namespace_uri,
            server_index,
        };
        Ok(())
    }
}

ua_struct! {
    /// Name qualified by a namespace index
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct QualifiedName {
        pub namespace_index: u16,
        pub name: String,
    }
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

ua_struct! {
    /// Text with an optional locale. The encoding mask occupies one byte:
    /// bit 0 marks the locale, bit 1 the text.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct LocalizedText {
        #[ua(tag = "bits=6")]
        pub reserved: u8,
        #[ua(tag = "bits=1")]
        pub has_text: bool,
        #[ua(tag = "bits=1")]
        pub has_locale: bool,
        #[ua(tag = "switchField=has_locale,switchValue=1")]
        pub locale: String,
        #[ua(tag = "switchField=has_text,switchValue=1")]
        pub text: String,
    }
}

impl LocalizedText {
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        let locale = locale.into();
        let text = text.into();
        Self {
            reserved: 0,
            has_text: !text.is_empty(),
            has_locale: !locale.is_empty(),
            locale,
            text,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new("", text)
    }
}

ua_struct! {
    /// Structure wrapped with its encoding id. `encoding` selects the body:
    /// 0 none, 1 binary, 2 XML.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct ExtensionObject {
        pub type_id: NodeId,
        pub encoding: u8,
        #[ua(tag = "switchField=encoding,switchValue=1")]
        pub body: ByteString,
        #[ua(tag = "switchField=encoding,switchValue=2")]
        pub xml: String,
    }
}

impl ExtensionObject {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn binary(type_id: NodeId, body: impl Into<ByteString>) -> Self {
        Self {
            type_id,
            encoding: 1,
            body: body.into(),
            xml: String::new(),
        }
    }

    /// Wrap an encodable value under its binary encoding id
    pub fn from_encodable<T: Encodable>(type_id: NodeId, value: &T) -> Result<Self> {
        let mut body = BytesMut::new();
        value.encode(&mut body)?;
        Ok(Self::binary(type_id, body.to_vec()))
    }

    pub fn is_null(&self) -> bool {
        self.type_id.is_null() && self.encoding == 0
    }
}

ua_struct! {
    /// Vendor-specific diagnostics. One mask byte gates seven optional members;
    /// the innermost diagnostic nests recursively.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct DiagnosticInfo {
        #[ua(tag = "bits=1")]
        pub reserved: bool,
        #[ua(tag = "bits=1")]
        pub has_inner_diagnostic: bool,
        #[ua(tag = "bits=1")]
        pub has_inner_status: bool,
        #[ua(tag = "bits=1")]
        pub has_additional_info: bool,
        #[ua(tag = "bits=1")]
        pub has_locale: bool,
        #[ua(tag = "bits=1")]
        pub has_localized_text: bool,
        #[ua(tag = "bits=1")]
        pub has_namespace_uri: bool,
        #[ua(tag = "bits=1")]
        pub has_symbolic_id: bool,
        #[ua(tag = "switchField=has_symbolic_id,switchValue=1")]
        pub symbolic_id: i32,
        #[ua(tag = "switchField=has_namespace_uri,switchValue=1")]
        pub namespace_uri: i32,
        #[ua(tag = "switchField=has_locale,switchValue=1")]
        pub locale: i32,
        #[ua(tag = "switchField=has_localized_text,switchValue=1")]
        pub localized_text: i32,
        #[ua(tag = "switchField=has_additional_info,switchValue=1")]
        pub additional_info: String,
        #[ua(tag = "switchField=has_inner_status,switchValue=1")]
        pub inner_status: StatusCode,
        #[ua(tag = "switchField=has_inner_diagnostic,switchValue=1")]
        pub inner: Option<Box<DiagnosticInfo>>,
    }
}

impl DiagnosticInfo {
    pub fn with_additional_info(info: impl Into<String>) -> Self {
        Self {
            has_additional_info: true,
            additional_info: info.into(),
            ..Self::default()
        }
    }

    pub fn with_inner(mut self, status: StatusCode, inner: DiagnosticInfo) -> Self {
        self.has_inner_status = true;
        self.inner_status = status;
        self.has_inner_diagnostic = true;
        self.inner = Some(Box::new(inner));
        self
    }

    /// Nesting depth including this level
    pub fn depth(&self) -> usize {
        1 + self.inner.as_ref().map_or(0, |inner| inner.depth())
    }
}
