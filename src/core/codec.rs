//! # Binary Codec
//!
//! Walks a [`RecordDescriptor`] to serialize an instance to bytes and back,
//! processing fields strictly in resolved order in both directions.
//!
//! ## Per-field rules
//! - **Whole value**: the field's own wire form ([`Encodable`])
//! - **Bit-packed** (`bits=N`): consecutive packed fields share a run of whole
//!   bytes, most significant field first; a whole-value field ends the run
//! - **Length-linked** (`lengthField=X`): elements only, the count lives in `X`;
//!   on encode `X` is emitted with the sequence's actual length
//! - **Switch-linked** (`switchField=X,switchValue=V`): present only while `X == V`
//!
//! All numbers are little-endian as required by OPC UA Part 6.
//!
//! ## Usage
//! ```rust
//! use ua_protocol::core::codec::{decode, encode};
//! use ua_protocol::ua_struct;
//!
//! ua_struct! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     pub struct Flags {
//!         #[ua(tag = "bits=3")]
//!         pub low: u8,
//!         #[ua(tag = "bits=5")]
//!         pub high: u8,
//!     }
//! }
//!
//! let bytes = encode(&Flags { low: 5, high: 17 }).unwrap();
//! assert_eq!(&bytes[..], &[0b1011_0001]);
//! assert_eq!(decode::<Flags>(&bytes).unwrap(), Flags { low: 5, high: 17 });
//! ```

use std::cell::Cell;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::core::bits::{low_mask, BitReader, BitWriter, MAX_FIELD_BITS};
use crate::core::descriptor::{RecordDescriptor, Structure};
use crate::error::{constants, ProtocolError, Result};
use crate::utils::metrics;

/// A value with an OPC UA binary wire representation
pub trait Encodable: Send + Sync {
    /// Write the whole value
    fn encode(&self, buf: &mut BytesMut) -> Result<()>;

    /// Replace this value with one read from the front of `buf`
    fn decode(&mut self, buf: &mut &[u8]) -> Result<()>;

    /// Integer view used for bit packing and sibling reads
    fn to_integer(&self) -> Option<i64> {
        None
    }

    /// Store an integer read from a bit-packed run
    fn set_integer(&mut self, _value: i64) -> Result<()> {
        Err(ProtocolError::UnsupportedType("integer assignment"))
    }

    /// Write `value` using this value's own wire width
    fn encode_with(&self, _value: i64, _buf: &mut BytesMut) -> Result<()> {
        Err(ProtocolError::UnsupportedType("element count"))
    }

    /// Number of elements, for sequences
    fn element_count(&self) -> Option<usize> {
        None
    }

    /// Write the elements without any count prefix
    fn encode_elements(&self, _buf: &mut BytesMut) -> Result<()> {
        Err(ProtocolError::UnsupportedType("length-linked sequence"))
    }

    /// Read exactly `count` elements
    fn decode_elements(&mut self, _buf: &mut &[u8], _count: usize) -> Result<()> {
        Err(ProtocolError::UnsupportedType("length-linked sequence"))
    }
}

/// Fail with `UnexpectedEof` unless `buf` holds at least `needed` bytes
pub fn ensure_remaining(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(ProtocolError::UnexpectedEof {
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// Write an Int32 length prefix, -1 standing for null
pub fn put_length(buf: &mut BytesMut, len: Option<usize>) -> Result<()> {
    let len = match len {
        Some(len) => i32::try_from(len)
            .map_err(|_| ProtocolError::InvalidEncoding(constants::ERR_LENGTH_OVERFLOW.into()))?,
        None => -1,
    };
    buf.put_i32_le(len);
    Ok(())
}

/// Read an Int32 length prefix; -1 (null) reads as `None`
pub fn get_length(buf: &mut &[u8]) -> Result<Option<usize>> {
    ensure_remaining(buf, 4)?;
    match buf.get_i32_le() {
        -1 => Ok(None),
        len if len < 0 => Err(ProtocolError::InvalidEncoding(format!(
            "{}: {len}",
            constants::ERR_NEGATIVE_LENGTH
        ))),
        len => Ok(Some(len as usize)),
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encodable for $ty {
                fn encode(&self, buf: &mut BytesMut) -> Result<()> {
                    buf.$put(*self);
                    Ok(())
                }

                fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
                    ensure_remaining(buf, std::mem::size_of::<$ty>())?;
                    *self = buf.$get();
                    Ok(())
                }

                fn to_integer(&self) -> Option<i64> {
                    i64::try_from(*self).ok()
                }

                fn set_integer(&mut self, value: i64) -> Result<()> {
                    *self = <$ty>::try_from(value).map_err(|_| {
                        ProtocolError::InvalidEncoding(format!(
                            "{value} out of range for {}",
                            stringify!($ty)
                        ))
                    })?;
                    Ok(())
                }

                fn encode_with(&self, value: i64, buf: &mut BytesMut) -> Result<()> {
                    let mut narrowed: $ty = 0;
                    narrowed.set_integer(value)?;
                    narrowed.encode(buf)
                }
            }
        )*
    };
}

impl_integer! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_le, get_u16_le;
    i16 => put_i16_le, get_i16_le;
    u32 => put_u32_le, get_u32_le;
    i32 => put_i32_le, get_i32_le;
    u64 => put_u64_le, get_u64_le;
    i64 => put_i64_le, get_i64_le;
}

impl Encodable for bool {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(u8::from(*self));
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 1)?;
        *self = buf.get_u8() != 0;
        Ok(())
    }

    fn to_integer(&self) -> Option<i64> {
        Some(i64::from(*self))
    }

    fn set_integer(&mut self, value: i64) -> Result<()> {
        *self = value != 0;
        Ok(())
    }
}

impl Encodable for f32 {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_f32_le(*self);
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 4)?;
        *self = buf.get_f32_le();
        Ok(())
    }
}

impl Encodable for f64 {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_f64_le(*self);
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        ensure_remaining(buf, 8)?;
        *self = buf.get_f64_le();
        Ok(())
    }
}

/// Empty strings go out as null (-1); both null and zero-length read back empty
impl Encodable for String {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        if self.is_empty() {
            return put_length(buf, None);
        }
        put_length(buf, Some(self.len()))?;
        buf.put_slice(self.as_bytes());
        Ok(())
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        let len = get_length(buf)?.unwrap_or(0);
        ensure_remaining(buf, len)?;
        let text = std::str::from_utf8(&buf[..len])
            .map_err(|_| ProtocolError::InvalidEncoding(constants::ERR_INVALID_UTF8.into()))?;
        *self = text.to_owned();
        buf.advance(len);
        Ok(())
    }
}

impl<T: Encodable + Default> Encodable for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        if self.is_empty() {
            return put_length(buf, None);
        }
        put_length(buf, Some(self.len()))?;
        self.encode_elements(buf)
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        let count = get_length(buf)?.unwrap_or(0);
        self.decode_elements(buf, count)
    }

    fn element_count(&self) -> Option<usize> {
        Some(self.len())
    }

    fn encode_elements(&self, buf: &mut BytesMut) -> Result<()> {
        for element in self {
            element.encode(buf)?;
        }
        Ok(())
    }

    /// Elements may encode to nothing (a structure without public fields), so
    /// `count` is not checked against the bytes left. A short buffer fails on
    /// the first element that runs out.
    fn decode_elements(&mut self, buf: &mut &[u8], count: usize) -> Result<()> {
        let mut elements = Vec::with_capacity(count.min(buf.len()));
        for _ in 0..count {
            let mut element = T::default();
            element.decode(buf)?;
            elements.push(element);
        }
        *self = elements;
        Ok(())
    }
}

impl<T: Encodable + ?Sized> Encodable for Box<T> {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        (**self).encode(buf)
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        (**self).decode(buf)
    }

    fn to_integer(&self) -> Option<i64> {
        (**self).to_integer()
    }
}

/// Optional values; `None` is written as the default value and always reads back as `Some`
impl<T: Encodable + Default> Encodable for Option<T> {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            Some(value) => value.encode(buf),
            None => T::default().encode(buf),
        }
    }

    fn decode(&mut self, buf: &mut &[u8]) -> Result<()> {
        let mut value = T::default();
        value.decode(buf)?;
        *self = Some(value);
        Ok(())
    }

    fn to_integer(&self) -> Option<i64> {
        self.as_ref().and_then(Encodable::to_integer)
    }
}

/// Serialize `instance` field by field following `record`
pub fn encode_fields<S: 'static>(
    instance: &S,
    record: &RecordDescriptor<S>,
    buf: &mut BytesMut,
) -> Result<()> {
    let fields = record.fields();
    let mut run = BitWriter::new();

    for (index, field) in fields.iter().enumerate() {
        if !field.is_bit_packed() && !run.is_empty() {
            buf.put_slice(&run.take());
        }

        if !is_present(instance, record, index, false)? {
            continue;
        }

        if field.is_bit_packed() {
            let bits = field_width(record, index)?;
            let value = sibling_integer(instance, record, index, false)?;
            if value < 0 || (value as u64) > low_mask(bits) {
                return Err(ProtocolError::ValueOutOfRange {
                    field: field.name.clone(),
                    bits,
                    value,
                });
            }
            run.write(value as u64, bits);
            continue;
        }

        let target = field.value(instance);
        if field.count_of().is_some() {
            let count = sibling_integer(instance, record, index, false)?;
            target
                .encode_with(count, buf)
                .map_err(|e| e.in_field(field.name.as_str()))?;
        } else if field.is_length_linked() {
            if field.length_slot().is_none() {
                return Err(unknown_sibling(&field.name, &field.length_field));
            }
            target
                .encode_elements(buf)
                .map_err(|e| e.in_field(field.name.as_str()))?;
        } else {
            target
                .encode(buf)
                .map_err(|e| e.in_field(field.name.as_str()))?;
        }
    }

    if !run.is_empty() {
        buf.put_slice(&run.take());
    }
    Ok(())
}

/// Populate `instance` field by field following `record`
pub fn decode_fields<S: 'static>(
    instance: &mut S,
    record: &RecordDescriptor<S>,
    buf: &mut &[u8],
) -> Result<()> {
    let fields = record.fields();
    let mut run = BitReader::new();

    for (index, field) in fields.iter().enumerate() {
        if !field.is_bit_packed() {
            run.finish_run();
        }

        if !is_present(instance, record, index, true)? {
            continue;
        }

        if field.is_bit_packed() {
            let bits = field_width(record, index)?;
            let raw = run
                .read(buf, bits)
                .map_err(|e| e.in_field(field.name.as_str()))?;
            let value = i64::try_from(raw).map_err(|_| ProtocolError::ValueOutOfRange {
                field: field.name.clone(),
                bits,
                value: i64::MAX,
            })?;
            field
                .value_mut(instance)
                .set_integer(value)
                .map_err(|e| e.in_field(field.name.as_str()))?;
            continue;
        }

        if field.is_length_linked() {
            let count = sibling_integer(instance, record, index, true)?;
            // A null (-1) count reads as an empty sequence
            let count = usize::try_from(count).unwrap_or(0);
            field
                .value_mut(instance)
                .decode_elements(buf, count)
                .map_err(|e| e.in_field(field.name.as_str()))?;
        } else {
            field
                .value_mut(instance)
                .decode(buf)
                .map_err(|e| e.in_field(field.name.as_str()))?;
        }
    }

    run.finish_run();
    Ok(())
}

fn unknown_sibling(field: &str, sibling: &str) -> ProtocolError {
    ProtocolError::UnknownSibling {
        field: field.to_string(),
        sibling: sibling.to_string(),
    }
}

fn field_width<S: 'static>(record: &RecordDescriptor<S>, index: usize) -> Result<u32> {
    let field = &record.fields()[index];
    let bits = u32::from(field.bit_size);
    if bits > MAX_FIELD_BITS {
        return Err(ProtocolError::InvalidEncoding(format!(
            "bit width {bits} exceeds {MAX_FIELD_BITS}"
        ))
        .in_field(field.name.as_str()));
    }
    Ok(bits)
}

/// Switch gate for the field at `index`; decode additionally requires the
/// gating sibling to have been read already
fn is_present<S: 'static>(
    instance: &S,
    record: &RecordDescriptor<S>,
    index: usize,
    decoding: bool,
) -> Result<bool> {
    let field = &record.fields()[index];
    if !field.is_switched() {
        return Ok(true);
    }

    let slot = field
        .switch_slot()
        .ok_or_else(|| unknown_sibling(&field.name, &field.switch_field))?;
    if decoding && slot >= index {
        return Err(ProtocolError::LinkOrder {
            field: field.name.clone(),
            sibling: field.switch_field.clone(),
        });
    }
    Ok(integer_at(instance, record, slot, decoding)? == field.switch_value)
}

/// Integer feeding the field at `index`: its length sibling when decoding a
/// length-linked field, otherwise the field's own value
fn sibling_integer<S: 'static>(
    instance: &S,
    record: &RecordDescriptor<S>,
    index: usize,
    decoding: bool,
) -> Result<i64> {
    let field = &record.fields()[index];
    if decoding && field.is_length_linked() {
        let slot = field
            .length_slot()
            .ok_or_else(|| unknown_sibling(&field.name, &field.length_field))?;
        if slot >= index {
            return Err(ProtocolError::LinkOrder {
                field: field.name.clone(),
                sibling: field.length_field.clone(),
            });
        }
        return integer_at(instance, record, slot, decoding);
    }
    integer_at(instance, record, index, decoding)
}

/// Current integer value of the field at `index`. While encoding, a field that
/// carries a sequence's count reports that sequence's length instead of its
/// stored value.
fn integer_at<S: 'static>(
    instance: &S,
    record: &RecordDescriptor<S>,
    index: usize,
    decoding: bool,
) -> Result<i64> {
    let fields = record.fields();
    let field = &fields[index];

    if let (false, Some(sequence)) = (decoding, field.count_of()) {
        let sequence = &fields[sequence];
        let count = sequence
            .value(instance)
            .element_count()
            .ok_or(ProtocolError::UnsupportedType("length-linked sequence"))
            .map_err(|e| e.in_field(sequence.name.as_str()))?;
        return i64::try_from(count).map_err(|_| {
            ProtocolError::InvalidEncoding(constants::ERR_LENGTH_OVERFLOW.into())
                .in_field(field.name.as_str())
        });
    }

    field
        .value(instance)
        .to_integer()
        .ok_or_else(|| ProtocolError::NotInteger(field.name.clone()))
}

/// Deepest structure nesting accepted while decoding
pub const MAX_DECODE_DEPTH: usize = 64;

thread_local! {
    static DECODE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Holds one level of structure nesting for as long as it lives
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self> {
        DECODE_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            if next > MAX_DECODE_DEPTH {
                warn!(limit = MAX_DECODE_DEPTH, "Structure nesting limit reached");
                return Err(ProtocolError::InvalidEncoding(format!(
                    "structure nesting deeper than {MAX_DECODE_DEPTH}"
                )));
            }
            depth.set(next);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DECODE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Encode a structure through its cached descriptor
pub fn encode_structure<S: Structure>(instance: &S, buf: &mut BytesMut) -> Result<()> {
    let record = S::descriptor()?;
    encode_fields(instance, &record, buf)
}

/// Decode a structure through its cached descriptor. `instance` and `buf` are
/// left untouched when decoding fails, including when nesting exceeds
/// [`MAX_DECODE_DEPTH`].
pub fn decode_structure<S: Structure>(instance: &mut S, buf: &mut &[u8]) -> Result<()> {
    let _depth = DepthGuard::enter()?;
    let record = S::descriptor()?;
    let mut cursor = *buf;
    let mut fresh = S::default();
    decode_fields(&mut fresh, &record, &mut cursor)?;
    *instance = fresh;
    *buf = cursor;
    Ok(())
}

/// Serialize a message to a fresh buffer
pub fn encode<S: Structure>(instance: &S) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    match instance.encode(&mut buf) {
        Ok(()) => {
            metrics::global().message_encoded(buf.len());
            trace!(type_name = std::any::type_name::<S>(), bytes = buf.len(), "Encoded message");
            Ok(buf.freeze())
        }
        Err(e) => {
            metrics::global().codec_error();
            Err(e)
        }
    }
}

/// Decode a message from the front of `buf`, advancing past the bytes consumed
pub fn decode_from<S: Structure>(buf: &mut &[u8]) -> Result<S> {
    let before = buf.len();
    let mut instance = S::default();
    match instance.decode(buf) {
        Ok(()) => {
            let consumed = before - buf.len();
            metrics::global().message_decoded(consumed);
            trace!(type_name = std::any::type_name::<S>(), bytes = consumed, "Decoded message");
            Ok(instance)
        }
        Err(e) => {
            metrics::global().codec_error();
            Err(e)
        }
    }
}

/// Decode a message that must occupy all of `data`
pub fn decode<S: Structure>(data: &[u8]) -> Result<S> {
    let mut buf = data;
    let instance = decode_from(&mut buf)?;
    if !buf.is_empty() {
        return Err(ProtocolError::InvalidEncoding(format!(
            "{} trailing bytes after {}",
            buf.len(),
            std::any::type_name::<S>()
        )));
    }
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_null_and_empty() {
        let mut buf = BytesMut::new();
        String::new().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &(-1i32).to_le_bytes());

        let zero = 0i32.to_le_bytes();
        let mut input = &zero[..];
        let mut text = String::from("stale");
        text.decode(&mut input).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_string_rejects_bad_utf8() {
        let mut data = 2i32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xFF, 0xFE]);
        let mut input = &data[..];
        let mut text = String::new();
        assert!(matches!(
            text.decode(&mut input),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_integers_are_little_endian() {
        let mut buf = BytesMut::new();
        0x0102_0304u32.encode(&mut buf).unwrap();
        (-2i16).encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x04, 0x03, 0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_short_buffer() {
        let data = [0x01, 0x02];
        let mut input = &data[..];
        let mut value = 0u32;
        assert!(matches!(
            value.decode(&mut input),
            Err(ProtocolError::UnexpectedEof {
                needed: 4,
                remaining: 2
            })
        ));
    }

    #[test]
    fn test_vec_whole_value_has_prefix() {
        let mut buf = BytesMut::new();
        vec![7u16, 8u16].encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[2, 0, 0, 0, 7, 0, 8, 0]);

        let mut input = &buf[..];
        let mut decoded: Vec<u16> = Vec::new();
        decoded.decode(&mut input).unwrap();
        assert_eq!(decoded, vec![7, 8]);
    }

    #[test]
    fn test_vec_rejects_impossible_count() {
        let data = 1000i32.to_le_bytes();
        let mut input = &data[..];
        let mut decoded: Vec<u8> = Vec::new();
        assert!(matches!(
            decoded.decode(&mut input),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_encode_with_checks_width() {
        let mut buf = BytesMut::new();
        0u8.encode_with(300, &mut buf).unwrap_err();
        0i32.encode_with(3, &mut buf).unwrap();
        assert_eq!(&buf[..], &[3, 0, 0, 0]);
    }

    #[test]
    fn test_negative_length_rejected() {
        let data = (-5i32).to_le_bytes();
        let mut input = &data[..];
        assert!(matches!(
            get_length(&mut input),
            Err(ProtocolError::InvalidEncoding(_))
        ));
    }
}
