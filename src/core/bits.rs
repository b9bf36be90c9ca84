//! MSB-first bit packing for runs of sub-byte fields.
//!
//! Bit 0 of a run is the high bit of its first byte. A run always occupies
//! whole bytes; trailing padding bits are zero on write and ignored on read.

use bytes::Buf;

use crate::error::{ProtocolError, Result};

/// Maximum width of a single packed field
pub const MAX_FIELD_BITS: u32 = 64;

/// Accumulates packed fields into a run of whole bytes
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`, most significant first
    pub fn write(&mut self, value: u64, bits: u32) {
        for i in (0..bits).rev() {
            self.push_bit(((value >> i) & 1) as u8);
        }
    }

    fn push_bit(&mut self, bit: u8) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if let Some(last) = self.bytes.last_mut() {
            *last |= bit << (7 - offset);
        }
        self.bit_len += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Take the packed bytes, leaving the writer empty for the next run
    pub fn take(&mut self) -> Vec<u8> {
        self.bit_len = 0;
        std::mem::take(&mut self.bytes)
    }
}

/// Pulls packed fields out of a byte buffer, one byte at a time on demand
#[derive(Debug, Default)]
pub struct BitReader {
    current: u8,
    available: u32,
}

impl BitReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `bits` bits, consuming bytes from `buf` only when the current one is exhausted
    pub fn read(&mut self, buf: &mut &[u8], bits: u32) -> Result<u64> {
        let mut value = 0u64;
        for _ in 0..bits {
            if self.available == 0 {
                if !buf.has_remaining() {
                    return Err(ProtocolError::UnexpectedEof {
                        needed: 1,
                        remaining: 0,
                    });
                }
                self.current = buf.get_u8();
                self.available = 8;
            }
            self.available -= 1;
            value = (value << 1) | u64::from((self.current >> self.available) & 1);
        }
        Ok(value)
    }

    /// End the current run; padding bits left in the byte are dropped
    pub fn finish_run(&mut self) {
        self.available = 0;
    }
}

/// Mask covering the low `bits` bits
pub fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
