//! Verification decoders for the postings format: sequential posting-list
//! decoding and full skip-structure decoding, both driven by the
//! `TermMetadata` handed out at write time. Query-time readers with seek and
//! advance live outside this crate; these decoders exist to validate streams
//! and to state the format's round-trip and soundness properties in tests.

use tessera_common::{Result, error::Error, verify_data};
use tessera_format::{CodecConfig, FieldInfo, stream};
use tessera_io::SliceReader;

use crate::skip::skip_level_count;
use crate::writer::{FREQ_STREAM_CODEC, POSTINGS_FORMAT_VERSION, PROX_STREAM_CODEC, TermMetadata};

/// Validates the framing and the shared prologue of a postings stream and
/// returns a cursor positioned at the first term's bytes.
pub fn open_postings_stream<'a>(
    buf: &'a [u8],
    codec: &str,
    config: &CodecConfig,
    element: &str,
) -> Result<SliceReader<'a>> {
    let mut reader = stream::open_stream(buf, codec, POSTINGS_FORMAT_VERSION, element)?;
    let skip_interval = reader.read_vint()?;
    let max_skip_levels = reader.read_vint()?;
    let skip_minimum = reader.read_vint()?;
    verify_data!(skip_interval, skip_interval == config.skip_interval);
    verify_data!(max_skip_levels, max_skip_levels == config.max_skip_levels);
    verify_data!(skip_minimum, skip_minimum == config.skip_minimum);
    Ok(reader)
}

/// One decoded position occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub position: u32,
    /// Payload bytes; empty when the position carried none.
    pub payload: Vec<u8>,
    pub offsets: Option<(u32, u32)>,
}

/// One decoded posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: u32,
    pub term_freq: u32,
    pub positions: Vec<Position>,
}

/// Sequential decoder of a single term's posting list.
pub struct PostingsReader<'a> {
    freq: SliceReader<'a>,
    prox: Option<SliceReader<'a>>,
    field: FieldInfo,
    doc_freq: u32,
    docs_read: u32,
    doc_id: u32,
    payload_len: u32,
    offset_len: u32,
}

impl<'a> PostingsReader<'a> {
    /// Opens both streams and seeks to the term identified by `meta`.
    /// `prox_stream` must be provided exactly when the field indexes
    /// positions.
    pub fn new(
        freq_stream: &'a [u8],
        prox_stream: Option<&'a [u8]>,
        field: &FieldInfo,
        config: &CodecConfig,
        meta: &TermMetadata,
    ) -> Result<PostingsReader<'a>> {
        let mut freq = open_postings_stream(freq_stream, FREQ_STREAM_CODEC, config, "frq")?;
        freq.seek(meta.freq_start)?;

        let prox = if field.index_options.has_positions() {
            let Some(buf) = prox_stream else {
                return Err(Error::invalid_arg("prox_stream", "field indexes positions"));
            };
            let Some(prox_start) = meta.prox_start else {
                return Err(Error::invalid_arg("prox_start", "field indexes positions"));
            };
            let mut prox = open_postings_stream(buf, PROX_STREAM_CODEC, config, "prx")?;
            prox.seek(prox_start)?;
            Some(prox)
        } else {
            None
        };

        Ok(PostingsReader {
            freq,
            prox,
            field: field.clone(),
            doc_freq: meta.doc_freq,
            docs_read: 0,
            doc_id: 0,
            payload_len: 0,
            offset_len: 0,
        })
    }

    /// Frequency-stream position of the next posting; the granularity that
    /// skip-entry pointers refer to.
    pub fn freq_position(&self) -> u64 {
        self.freq.position()
    }

    /// Position-stream position of the next posting's first occurrence.
    pub fn prox_position(&self) -> Option<u64> {
        self.prox.as_ref().map(|p| p.position())
    }

    /// Decodes the next posting, or `None` once `doc_freq` postings were
    /// read.
    pub fn next(&mut self) -> Result<Option<Posting>> {
        if self.docs_read == self.doc_freq {
            return Ok(None);
        }
        let raw = self.freq.read_vlong()?;
        let term_freq = if self.field.index_options.has_freqs() {
            self.doc_id += (raw >> 1) as u32;
            if raw & 1 == 1 { 1 } else { self.freq.read_vint()? }
        } else {
            self.doc_id += raw as u32;
            1
        };

        let mut positions = Vec::new();
        if let Some(prox) = self.prox.as_mut() {
            let store_payloads = self.field.store_payloads;
            let has_offsets = self.field.index_options.has_offsets();
            let mut position = 0u32;
            let mut offset_start = 0u32;
            positions.reserve(term_freq as usize);
            for _ in 0..term_freq {
                let raw = prox.read_vlong()?;
                if store_payloads {
                    position += (raw >> 1) as u32;
                    if raw & 1 == 1 {
                        self.payload_len = prox.read_vint()?;
                    }
                } else {
                    position += raw as u32;
                }
                let offsets = if has_offsets {
                    let raw = prox.read_vlong()?;
                    offset_start += (raw >> 1) as u32;
                    if raw & 1 == 1 {
                        self.offset_len = prox.read_vint()?;
                    }
                    Some((offset_start, offset_start + self.offset_len))
                } else {
                    None
                };
                let payload = if store_payloads && self.payload_len > 0 {
                    prox.read_bytes(self.payload_len as usize)?.to_vec()
                } else {
                    Vec::new()
                };
                positions.push(Position {
                    position,
                    payload,
                    offsets,
                });
            }
        }

        self.docs_read += 1;
        Ok(Some(Posting {
            doc_id: self.doc_id,
            term_freq,
            positions,
        }))
    }
}

/// One decoded skip entry with accumulated (absolute) docID and pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipEntry {
    pub doc_id: u32,
    pub freq_ptr: u64,
    pub prox_ptr: u64,
    /// Payload length in effect at the skip point; `None` while no entry at
    /// this level has recorded one.
    pub payload_len: Option<u32>,
    pub offset_len: Option<u32>,
    /// Offset into the next lower level's block, just past the entry this
    /// one was promoted from. Present above level 0.
    pub child_ptr: Option<u64>,
    /// End of this entry within its level's block, before the child pointer;
    /// the position a parent's `child_ptr` refers to.
    pub end_offset: u64,
}

struct LevelCursor {
    doc: u32,
    freq_ptr: u64,
    prox_ptr: u64,
    payload_len: Option<u32>,
    offset_len: Option<u32>,
}

impl LevelCursor {
    fn new(meta: &TermMetadata) -> LevelCursor {
        LevelCursor {
            doc: 0,
            freq_ptr: meta.freq_start,
            prox_ptr: meta.prox_start.unwrap_or(0),
            payload_len: None,
            offset_len: None,
        }
    }
}

/// Decoder of the complete skip structure flushed for a term.
pub struct SkipListReader;

impl SkipListReader {
    /// Decodes every level of a term's skip data, level 0 first. Returns an
    /// empty vector for terms that wrote no skip data.
    pub fn decode(
        freq_stream: &[u8],
        field: &FieldInfo,
        config: &CodecConfig,
        meta: &TermMetadata,
    ) -> Result<Vec<Vec<SkipEntry>>> {
        let Some(skip_offset) = meta.skip_offset else {
            return Ok(Vec::new());
        };
        let mut reader = open_postings_stream(freq_stream, FREQ_STREAM_CODEC, config, "frq")?;
        reader.seek(meta.freq_start + skip_offset)?;

        // levels usable for this term: capped by its document frequency the
        // same way the writer caps by the segment document count
        let num_levels = skip_level_count(meta.doc_freq, config);

        // upper levels come first, highest first, each with a length prefix
        let mut upper_blocks = Vec::with_capacity(num_levels.saturating_sub(1));
        for _ in 1..num_levels {
            let len = reader.read_vlong()? as usize;
            upper_blocks.push(reader.read_bytes(len)?);
        }

        // level 0 is unprefixed and entry-count bounded: the stream carries
        // other terms' data beyond it
        let level0_entries = meta.doc_freq.div_ceil(config.skip_interval) as usize;
        let base = reader.position();
        let mut cursor = LevelCursor::new(meta);
        let mut level0 = Vec::with_capacity(level0_entries);
        for _ in 0..level0_entries {
            level0.push(decode_entry(&mut reader, field, &mut cursor, false, base)?);
        }

        let mut levels = vec![level0];
        for level in 1..num_levels {
            let block = upper_blocks[num_levels - 1 - level];
            let mut block_reader = SliceReader::new(block);
            let mut cursor = LevelCursor::new(meta);
            let mut entries = Vec::new();
            while block_reader.remaining() > 0 {
                entries.push(decode_entry(&mut block_reader, field, &mut cursor, true, 0)?);
            }
            levels.push(entries);
        }
        Ok(levels)
    }
}

fn decode_entry(
    reader: &mut SliceReader<'_>,
    field: &FieldInfo,
    cursor: &mut LevelCursor,
    has_child: bool,
    base: u64,
) -> Result<SkipEntry> {
    let tracks_lengths = field.store_payloads || field.index_options.has_offsets();
    let raw = reader.read_vlong()?;
    let delta = if tracks_lengths { raw >> 1 } else { raw };
    if tracks_lengths && raw & 1 == 1 {
        if field.store_payloads {
            cursor.payload_len = Some(reader.read_vint()?);
        }
        if field.index_options.has_offsets() {
            cursor.offset_len = Some(reader.read_vint()?);
        }
    }
    cursor.doc += delta as u32;
    cursor.freq_ptr += reader.read_vlong()?;
    cursor.prox_ptr += reader.read_vlong()?;
    let end_offset = reader.position() - base;
    let child_ptr = if has_child {
        Some(reader.read_vlong()?)
    } else {
        None
    };
    Ok(SkipEntry {
        doc_id: cursor.doc,
        freq_ptr: cursor.freq_ptr,
        prox_ptr: cursor.prox_ptr,
        payload_len: cursor.payload_len,
        offset_len: cursor.offset_len,
        child_ptr,
        end_offset,
    })
}
