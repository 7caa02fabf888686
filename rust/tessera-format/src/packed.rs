//! Bit-packed integer blocks.
//!
//! Doc-values layouts store ordinals, addresses and packed deltas at a fixed
//! bit width chosen from the value range. A block is self-describing:
//!
//! ```text
//! value count (vlong) | bits per value (u8) | packed words (u64 LE each)
//! ```
//!
//! Values are packed LSB-first into consecutive little-endian 64-bit words,
//! so a value may straddle a word boundary.

use byteorder::{LittleEndian, WriteBytesExt};
use tessera_common::{Result, error::Error, verify_arg, verify_data};
use tessera_io::{SliceReader, VarintWrite};

/// Number of bits needed to represent `max_value`, at least 1.
pub fn bits_required(max_value: u64) -> u32 {
    (64 - max_value.leading_zeros()).max(1)
}

/// Streaming writer for one packed block.
///
/// The declared `value_count` is a contract: `finish` fails unless exactly
/// that many values were added.
pub struct PackedWriter<'a, W: std::io::Write + ?Sized> {
    out: &'a mut W,
    bits: u32,
    value_count: u64,
    added: u64,
    acc: u64,
    acc_bits: u32,
}

impl<'a, W: std::io::Write + ?Sized> PackedWriter<'a, W> {
    /// Starts a block of `value_count` values at `bits` per value and writes
    /// the block preamble.
    pub fn new(out: &'a mut W, value_count: u64, bits: u32) -> Result<PackedWriter<'a, W>> {
        verify_arg!(bits, bits >= 1 && bits <= 64);
        out.write_vlong(value_count)?;
        out.write_u8(bits as u8)?;
        Ok(PackedWriter {
            out,
            bits,
            value_count,
            added: 0,
            acc: 0,
            acc_bits: 0,
        })
    }

    pub fn add(&mut self, value: u64) -> Result<()> {
        verify_arg!(value, self.bits == 64 || value < (1u64 << self.bits));
        verify_arg!(value_count, self.added < self.value_count);
        self.added += 1;

        if self.acc_bits == 0 {
            self.acc = value;
            self.acc_bits = self.bits;
        } else if self.acc_bits + self.bits <= 64 {
            self.acc |= value << self.acc_bits;
            self.acc_bits += self.bits;
        } else {
            // the value straddles the current word
            self.acc |= value << self.acc_bits;
            self.out.write_u64::<LittleEndian>(self.acc)?;
            self.acc = value >> (64 - self.acc_bits);
            self.acc_bits = self.acc_bits + self.bits - 64;
        }
        if self.acc_bits == 64 {
            self.out.write_u64::<LittleEndian>(self.acc)?;
            self.acc = 0;
            self.acc_bits = 0;
        }
        Ok(())
    }

    /// Flushes the trailing partial word and closes the block.
    pub fn finish(self) -> Result<()> {
        if self.added != self.value_count {
            return Err(Error::invalid_operation(format!(
                "packed block closed after {} of {} values",
                self.added, self.value_count
            )));
        }
        if self.acc_bits > 0 {
            self.out.write_u64::<LittleEndian>(self.acc)?;
        }
        Ok(())
    }
}

/// Random-access reader over one packed block.
pub struct PackedReader<'a> {
    block: &'a [u8],
    bits: u32,
    value_count: u64,
}

impl<'a> PackedReader<'a> {
    /// Parses the block preamble at the reader's position and takes ownership
    /// of the packed words, leaving the cursor just past the block.
    pub fn parse(reader: &mut SliceReader<'a>) -> Result<PackedReader<'a>> {
        let value_count = reader.read_vlong()?;
        let bits = reader.read_u8()? as u32;
        verify_data!(bits, bits >= 1 && bits <= 64);
        let Some(total_bits) = value_count.checked_mul(u64::from(bits)) else {
            return Err(Error::invalid_format("packed block size"));
        };
        let words = total_bits.div_ceil(64);
        let block = reader.read_bytes((words * 8) as usize)?;
        Ok(PackedReader {
            block,
            bits,
            value_count,
        })
    }

    pub fn len(&self) -> u64 {
        self.value_count
    }

    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns the value at `index`. Panics when out of bounds, like slice
    /// indexing.
    pub fn get(&self, index: u64) -> u64 {
        assert!(index < self.value_count, "packed index out of bounds");
        let mask = if self.bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        };
        let bit = index * self.bits as u64;
        let word_index = (bit / 64) as usize;
        let offset = (bit % 64) as u32;
        let low = self.word(word_index) >> offset;
        if offset + self.bits <= 64 {
            low & mask
        } else {
            (low | (self.word(word_index + 1) << (64 - offset))) & mask
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.value_count).map(|i| self.get(i))
    }

    fn word(&self, index: usize) -> u64 {
        let bytes: [u8; 8] = self.block[index * 8..index * 8 + 8]
            .try_into()
            .expect("word bytes");
        u64::from_le_bytes(bytes)
    }
}
