//! Variable-length integer primitives and the positioned slice cursor.
//!
//! All varints in the format are unsigned: 7 data bits per byte, high bit set
//! while more bytes follow. Fixed-width integers are little-endian throughout.

use byteorder::{LittleEndian, ReadBytesExt};
use tessera_common::{Result, verify_data};

/// Extends any writer with the unsigned variable-length integer encodings used
/// by every stream of the codec.
pub trait VarintWrite: std::io::Write {
    /// Writes an unsigned 32-bit varint (1 to 5 bytes).
    fn write_vint(&mut self, value: u32) -> std::io::Result<()> {
        let mut v = value;
        while v >= 0x80 {
            self.write_all(&[(v as u8) | 0x80])?;
            v >>= 7;
        }
        self.write_all(&[v as u8])
    }

    /// Writes an unsigned 64-bit varint (1 to 10 bytes).
    fn write_vlong(&mut self, value: u64) -> std::io::Result<()> {
        let mut v = value;
        while v >= 0x80 {
            self.write_all(&[(v as u8) | 0x80])?;
            v >>= 7;
        }
        self.write_all(&[v as u8])
    }
}

impl<W: std::io::Write + ?Sized> VarintWrite for W {}

/// Returns the encoded byte length of `value` as a varint.
pub fn vint_len(value: u64) -> usize {
    let bits = 64 - value.max(1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// A positioned cursor over an in-memory stream.
///
/// This is the read-side counterpart of [`IndexOutput`](crate::IndexOutput):
/// positions reported by the writer are valid seek targets here. Decoding
/// failures (truncation, overlong varints) surface as `InvalidFormat` errors.
pub struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> SliceReader<'a> {
        SliceReader { buf, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn seek(&mut self, position: u64) -> Result<()> {
        verify_data!(position, position <= self.buf.len() as u64);
        self.pos = position as usize;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        verify_data!(stream, self.pos < self.buf.len());
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Reads the next `len` bytes, borrowing them from the underlying buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        verify_data!(stream, len <= self.remaining());
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Decodes an unsigned 32-bit varint.
    pub fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for shift in 0..5 {
            let b = self.read_u8()?;
            value |= ((b & 0x7F) as u32) << (shift * 7);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(overlong_varint("vint"))
    }

    /// Decodes an unsigned 64-bit varint.
    pub fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in 0..10 {
            let b = self.read_u8()?;
            value |= ((b & 0x7F) as u64) << (shift * 7);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(overlong_varint("vlong"))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let mut slice = self.read_bytes(4)?;
        Ok(slice.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let mut slice = self.read_bytes(8)?;
        Ok(slice.read_u64::<LittleEndian>()?)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        let mut slice = self.read_bytes(2)?;
        Ok(slice.read_i16::<LittleEndian>()?)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        let mut slice = self.read_bytes(4)?;
        Ok(slice.read_i32::<LittleEndian>()?)
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        let mut slice = self.read_bytes(8)?;
        Ok(slice.read_i64::<LittleEndian>()?)
    }
}

#[cold]
fn overlong_varint(element: &str) -> tessera_common::error::Error {
    tessera_common::error::ErrorKind::InvalidFormat {
        element: element.to_string(),
        message: "continuation bits exceed the encodable width".to_string(),
    }
    .into()
}
