//! Stream framing.
//!
//! Every stream produced by the codec is framed the same way:
//!
//! ```text
//! magic (u32 LE) | codec name length (vint) | codec name | version (u32 LE)
//! ...payload...
//! footer magic (u32 LE) | checksum (u32 LE)
//! ```
//!
//! The checksum covers everything before the footer. Writers go through
//! [`StreamWriter`], which hashes incrementally and emits the footer on
//! `seal`; the read side validates the frame with [`open_stream`] before any
//! payload byte is interpreted.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use tessera_common::{Result, verify_data};
use tessera_io::{IndexOutput, SliceReader, VarintWrite};
use xxhash_rust::xxh3::Xxh3;

use crate::checksum;

/// Leading magic of every stream.
pub const STREAM_MAGIC: u32 = 0x5445_5331;

/// Magic of the trailing footer.
pub const FOOTER_MAGIC: u32 = 0x5445_53F1;

/// Byte length of the footer (magic + checksum).
pub const FOOTER_SIZE: usize = 8;

/// A framing wrapper around an [`IndexOutput`].
///
/// Writes the stream header on open, hashes every byte that passes through,
/// and emits the checksummed footer when sealed. Positions reported by
/// [`IndexOutput::position`] are absolute within the stream (header
/// included), so pointers recorded by the codec remain valid seek targets
/// for the read side.
///
/// Dropping an unsealed `StreamWriter` disposes the stream: no footer is
/// written and the underlying output is released unsealed.
pub struct StreamWriter<W: IndexOutput> {
    inner: W,
    hasher: Xxh3,
    sealed: bool,
}

impl<W: IndexOutput> StreamWriter<W> {
    /// Wraps `inner` and writes the stream header for `codec` at `version`.
    pub fn open(inner: W, codec: &str, version: u32) -> std::io::Result<StreamWriter<W>> {
        debug_assert!(codec.is_ascii());
        let mut writer = StreamWriter {
            inner,
            hasher: Xxh3::new(),
            sealed: false,
        };
        writer.write_u32::<LittleEndian>(STREAM_MAGIC)?;
        writer.write_vint(codec.len() as u32)?;
        writer.write_all(codec.as_bytes())?;
        writer.write_u32::<LittleEndian>(version)?;
        Ok(writer)
    }

    /// Checksum of the bytes written so far.
    pub fn current_checksum(&self) -> u32 {
        checksum::fold(self.hasher.digest())
    }
}

impl<W: IndexOutput> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: IndexOutput> IndexOutput for StreamWriter<W> {
    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn seal(&mut self) -> std::io::Result<()> {
        if !self.sealed {
            self.sealed = true;
            let checksum = checksum::fold(self.hasher.digest());
            // the footer itself is excluded from the checksum
            self.inner.write_u32::<LittleEndian>(FOOTER_MAGIC)?;
            self.inner.write_u32::<LittleEndian>(checksum)?;
        }
        self.inner.seal()
    }
}

/// Validates the frame of `buf` and returns a cursor positioned at the first
/// payload byte.
///
/// The cursor's underlying buffer excludes the footer, so stream positions
/// recorded at write time are valid seek targets. `element` names the stream
/// in errors.
pub fn open_stream<'a>(
    buf: &'a [u8],
    codec: &str,
    version: u32,
    element: &str,
) -> Result<SliceReader<'a>> {
    verify_data!(stream, buf.len() >= FOOTER_SIZE);
    let (body, footer) = buf.split_at(buf.len() - FOOTER_SIZE);

    let mut footer_reader = SliceReader::new(footer);
    let footer_magic = footer_reader.read_u32_le()?;
    verify_data!(footer_magic, footer_magic == FOOTER_MAGIC);
    let expected = footer_reader.read_u32_le()?;
    checksum::validate_buffer(body, expected, Some(element))?;

    let mut reader = SliceReader::new(body);
    let magic = reader.read_u32_le()?;
    verify_data!(magic, magic == STREAM_MAGIC);
    let name_len = reader.read_vint()? as usize;
    let name = reader.read_bytes(name_len)?;
    verify_data!(codec, name == codec.as_bytes());
    let actual_version = reader.read_u32_le()?;
    verify_data!(version, actual_version == version);
    Ok(reader)
}
