//! Postings encoder: per term, per document, writes the frequency and
//! position streams with delta and varint encoding, buffering skip data
//! inline and flushing it at term end.
//!
//! Frequency stream, per document: the doc delta alone when the field does
//! not index frequencies; otherwise `(delta << 1) | 1` for the singleton
//! frequency, or `delta << 1` followed by the frequency as a second varint.
//!
//! Position stream, per position: the position delta, shifted and tagged
//! with a length-changed flag when payloads are stored (the new payload
//! length follows when the flag is set); an analogous start-offset delta and
//! length pair when offsets are indexed; the raw payload bytes last.

use std::io::Write;

use tessera_common::{Result, error::Error, verify_arg};
use tessera_format::{
    CodecConfig, FieldInfo, SegmentWriteContext, StreamWriter,
    segment::{FREQUENCIES_SUFFIX, POSITIONS_SUFFIX},
};
use tessera_io::{IndexOutput, VarintWrite};

use crate::skip::SkipListWriter;

/// Codec name framing the frequency stream.
pub const FREQ_STREAM_CODEC: &str = "tessera.postings.frq";

/// Codec name framing the position stream.
pub const PROX_STREAM_CODEC: &str = "tessera.postings.prx";

/// Current version of the postings stream format.
pub const POSTINGS_FORMAT_VERSION: u32 = 1;

/// Per-term result of [`FieldPostingsWriter::finish_term`], stored by the
/// term-dictionary collaborator alongside the term and handed back to a
/// reader to locate the term's postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermMetadata {
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Absolute frequency-stream position of the term's first posting.
    pub freq_start: u64,
    /// Absolute position-stream start, for fields that index positions.
    pub prox_start: Option<u64>,
    /// Start of the term's skip data, relative to `freq_start`; absent when
    /// `doc_freq` is below the configured skip minimum.
    pub skip_offset: Option<u64>,
}

/// Pointers captured at `start_doc` before the document's bytes are written,
/// kept in case that document closes the term off the skip cadence.
#[derive(Clone, Copy, Default)]
struct SkipCapture {
    doc: u32,
    payload_len: Option<u32>,
    offset_len: Option<u32>,
    freq_ptr: u64,
    prox_ptr: u64,
}

/// Writes the posting lists of one indexed field.
///
/// Driven per term by the term-enumeration collaborator: `start_term`, then
/// for each document in increasing docID order `start_doc`, `add_position`
/// once per occurrence, `finish_doc`, and finally `finish_term`. Dropping the
/// writer without [`seal`](FieldPostingsWriter::seal) disposes both streams.
pub struct FieldPostingsWriter {
    field: FieldInfo,
    config: CodecConfig,
    total_docs: u32,
    freq: StreamWriter<Box<dyn IndexOutput>>,
    prox: Option<StreamWriter<Box<dyn IndexOutput>>>,
    skip: SkipListWriter,
    freq_start: u64,
    prox_start: u64,
    doc_freq: u32,
    last_doc_id: u32,
    last_payload_len: Option<u32>,
    last_offset_len: Option<u32>,
    term_freq: u32,
    positions_written: u32,
    last_position: u32,
    last_offset_start: u32,
    tail: SkipCapture,
    terms_written: u64,
}

impl FieldPostingsWriter {
    /// Opens the frequency stream (and the position stream when the field
    /// indexes positions) and writes the framing header and the
    /// `skip_interval`/`max_skip_levels`/`skip_minimum` prologue into each.
    ///
    /// If a later stream fails to open, the earlier ones are dropped without
    /// sealing; their bytes are garbage for an external cleanup pass.
    pub fn open(
        context: &SegmentWriteContext<'_>,
        field: &FieldInfo,
        config: &CodecConfig,
    ) -> Result<FieldPostingsWriter> {
        field.validate()?;
        config.validate()?;

        let mut freq = StreamWriter::open(
            context.streams.create_stream(field.ordinal, FREQUENCIES_SUFFIX)?,
            FREQ_STREAM_CODEC,
            POSTINGS_FORMAT_VERSION,
        )?;
        write_prologue(&mut freq, config)?;

        let prox = if field.index_options.has_positions() {
            let mut prox = StreamWriter::open(
                context.streams.create_stream(field.ordinal, POSITIONS_SUFFIX)?,
                PROX_STREAM_CODEC,
                POSTINGS_FORMAT_VERSION,
            )?;
            write_prologue(&mut prox, config)?;
            Some(prox)
        } else {
            None
        };

        let skip = SkipListWriter::new(
            config,
            context.doc_count,
            field.store_payloads,
            field.index_options.has_offsets(),
        );

        Ok(FieldPostingsWriter {
            field: field.clone(),
            config: config.clone(),
            total_docs: context.doc_count,
            freq,
            prox,
            skip,
            freq_start: 0,
            prox_start: 0,
            doc_freq: 0,
            last_doc_id: 0,
            last_payload_len: None,
            last_offset_len: None,
            term_freq: 0,
            positions_written: 0,
            last_position: 0,
            last_offset_start: 0,
            tail: SkipCapture::default(),
            terms_written: 0,
        })
    }

    pub fn field(&self) -> &FieldInfo {
        &self.field
    }

    /// Begins a new term: records the stream start positions and resets the
    /// per-term counters and the skip buffers.
    pub fn start_term(&mut self) {
        self.freq_start = self.freq.position();
        self.prox_start = self.prox.as_ref().map_or(0, |p| p.position());
        self.doc_freq = 0;
        self.last_doc_id = 0;
        self.last_payload_len = None;
        self.last_offset_len = None;
        self.skip.reset_skip(self.freq_start, self.prox_start);
    }

    /// Begins a document within the current term. `doc_id` must be strictly
    /// greater than the previous document's (the first may be 0) and below
    /// the segment document count. `term_freq` is the number of positions
    /// that will follow; it is ignored when the field does not index
    /// frequencies.
    pub fn start_doc(&mut self, doc_id: u32, term_freq: u32) -> Result<()> {
        if self.doc_freq > 0 && doc_id <= self.last_doc_id {
            return Err(Error::order_violation(
                "doc_id",
                format!("doc {doc_id} after doc {}", self.last_doc_id),
            ));
        }
        verify_arg!(doc_id, doc_id < self.total_docs);
        if self.field.index_options.has_freqs() {
            verify_arg!(term_freq, term_freq > 0);
        }

        let delta = u64::from(doc_id - self.last_doc_id);
        let freq_ptr = self.freq.position();
        let prox_ptr = self.prox.as_ref().map_or(0, |p| p.position());

        self.doc_freq += 1;
        if self.doc_freq % self.config.skip_interval == 0 {
            // the skip point records the previous docID together with the
            // pointers standing before this document's bytes
            self.skip.set_skip_data(
                self.last_doc_id,
                self.last_payload_len,
                self.last_offset_len,
                freq_ptr,
                prox_ptr,
            );
            self.skip.buffer_skip(self.doc_freq)?;
        }
        self.tail = SkipCapture {
            doc: doc_id,
            payload_len: self.last_payload_len,
            offset_len: self.last_offset_len,
            freq_ptr,
            prox_ptr,
        };
        self.last_doc_id = doc_id;

        if !self.field.index_options.has_freqs() {
            self.freq.write_vlong(delta)?;
        } else if term_freq == 1 {
            self.freq.write_vlong(delta << 1 | 1)?;
        } else {
            self.freq.write_vlong(delta << 1)?;
            self.freq.write_vint(term_freq)?;
        }

        self.term_freq = term_freq;
        self.positions_written = 0;
        self.last_position = 0;
        self.last_offset_start = 0;
        Ok(())
    }

    /// Adds one position of the current document. Positions must be strictly
    /// increasing within the document (the first may be 0); offset starts
    /// must be non-decreasing with `end >= start`. `payload` is only
    /// accepted when the field stores payloads, `offsets` is required
    /// exactly when the field indexes offsets.
    pub fn add_position(
        &mut self,
        position: u32,
        payload: Option<&[u8]>,
        offsets: Option<(u32, u32)>,
    ) -> Result<()> {
        let store_payloads = self.field.store_payloads;
        let has_offsets = self.field.index_options.has_offsets();
        let Some(prox) = self.prox.as_mut() else {
            return Err(Error::invalid_operation(
                "add_position on a field without positions",
            ));
        };
        if self.positions_written >= self.term_freq {
            return Err(Error::invalid_operation(
                "add_position beyond the document's term frequency",
            ));
        }
        if self.positions_written > 0 && position <= self.last_position {
            return Err(Error::order_violation(
                "position",
                format!("position {position} after {}", self.last_position),
            ));
        }
        if !store_payloads {
            verify_arg!(payload, payload.is_none());
        }
        let offset_pair = if has_offsets {
            let Some((start, end)) = offsets else {
                return Err(Error::invalid_arg(
                    "offsets",
                    "field indexes offsets, none were provided",
                ));
            };
            if start < self.last_offset_start || end < start {
                return Err(Error::order_violation(
                    "offsets",
                    format!(
                        "offsets ({start}, {end}) after start {}",
                        self.last_offset_start
                    ),
                ));
            }
            Some((start, end))
        } else {
            verify_arg!(offsets, offsets.is_none());
            None
        };

        let delta = u64::from(position - self.last_position);
        self.last_position = position;

        if store_payloads {
            let payload_len = payload.map_or(0, |p| p.len() as u32);
            if Some(payload_len) != self.last_payload_len {
                self.last_payload_len = Some(payload_len);
                prox.write_vlong(delta << 1 | 1)?;
                prox.write_vint(payload_len)?;
            } else {
                prox.write_vlong(delta << 1)?;
            }
        } else {
            prox.write_vlong(delta)?;
        }

        if let Some((start, end)) = offset_pair {
            let offset_delta = u64::from(start - self.last_offset_start);
            let offset_len = end - start;
            if Some(offset_len) != self.last_offset_len {
                self.last_offset_len = Some(offset_len);
                prox.write_vlong(offset_delta << 1 | 1)?;
                prox.write_vint(offset_len)?;
            } else {
                prox.write_vlong(offset_delta << 1)?;
            }
            self.last_offset_start = start;
        }

        if let Some(payload) = payload {
            if !payload.is_empty() {
                prox.write_all(payload)?;
            }
        }

        self.positions_written += 1;
        Ok(())
    }

    /// Closes the current document, verifying that exactly `term_freq`
    /// positions were added.
    pub fn finish_doc(&mut self) -> Result<()> {
        if self.prox.is_some() && self.positions_written != self.term_freq {
            return Err(Error::invalid_arg(
                "positions",
                format!(
                    "document recorded {} positions, term frequency is {}",
                    self.positions_written, self.term_freq
                ),
            ));
        }
        Ok(())
    }

    /// Closes the current term: flushes the buffered skip levels into the
    /// frequency stream and returns the term's metadata.
    pub fn finish_term(&mut self) -> Result<TermMetadata> {
        if self.doc_freq == 0 {
            return Err(Error::invalid_operation("finish_term without documents"));
        }
        let skip_offset = if self.doc_freq >= self.config.skip_minimum {
            if self.doc_freq % self.config.skip_interval != 0 {
                // closing entry for the final document, keeping level 0 at
                // one entry per started skip interval
                self.skip.set_skip_data(
                    self.tail.doc,
                    self.tail.payload_len,
                    self.tail.offset_len,
                    self.tail.freq_ptr,
                    self.tail.prox_ptr,
                );
                self.skip.buffer_tail()?;
            }
            let skip_start = self.skip.write_skip(&mut self.freq)?;
            Some(skip_start - self.freq_start)
        } else {
            None
        };
        self.terms_written += 1;
        Ok(TermMetadata {
            doc_freq: self.doc_freq,
            freq_start: self.freq_start,
            prox_start: self.prox.is_some().then_some(self.prox_start),
            skip_offset,
        })
    }

    /// Seals both streams, writing their checksummed footers.
    pub fn seal(mut self) -> Result<()> {
        self.freq.seal()?;
        if let Some(prox) = self.prox.as_mut() {
            prox.seal()?;
        }
        log::debug!(
            "sealed postings for field '{}': {} terms, {} freq bytes",
            self.field.name,
            self.terms_written,
            self.freq.position(),
        );
        Ok(())
    }
}

fn write_prologue<W: IndexOutput>(out: &mut StreamWriter<W>, config: &CodecConfig) -> Result<()> {
    out.write_vint(config.skip_interval)?;
    out.write_vint(config.max_skip_levels)?;
    out.write_vint(config.skip_minimum)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::error::ErrorKind;
    use tessera_format::{IndexOptions, MemorySegmentStore, stream::open_stream};
    use tessera_io::SliceReader;

    fn write_field<F>(field: &FieldInfo, doc_count: u32, drive: F) -> MemorySegmentStore
    where
        F: FnOnce(&mut FieldPostingsWriter),
    {
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(doc_count, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, field, &CodecConfig::default()).unwrap();
        drive(&mut writer);
        writer.seal().unwrap();
        store
    }

    fn freq_body(store: &MemorySegmentStore, ordinal: u32) -> Vec<u8> {
        store.sealed_stream(ordinal, FREQUENCIES_SUFFIX).unwrap()
    }

    fn skip_prologue(reader: &mut SliceReader<'_>) {
        reader.read_vint().unwrap();
        reader.read_vint().unwrap();
        reader.read_vint().unwrap();
    }

    #[test]
    fn test_docs_only_writes_plain_deltas() {
        let field = FieldInfo::new("body", 0, IndexOptions::Docs);
        let store = write_field(&field, 100, |w| {
            w.start_term();
            for doc in [1, 3, 7] {
                w.start_doc(doc, 1).unwrap();
                w.finish_doc().unwrap();
            }
            let meta = w.finish_term().unwrap();
            assert_eq!(meta.doc_freq, 3);
            assert_eq!(meta.prox_start, None);
            assert_eq!(meta.skip_offset, None);
        });

        let bytes = freq_body(&store, 0);
        let mut reader = open_stream(&bytes, FREQ_STREAM_CODEC, 1, "frq").unwrap();
        skip_prologue(&mut reader);
        assert_eq!(reader.read_vlong().unwrap(), 1);
        assert_eq!(reader.read_vlong().unwrap(), 2);
        assert_eq!(reader.read_vlong().unwrap(), 4);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_singleton_frequency_is_folded_into_delta() {
        let field = FieldInfo::new("body", 2, IndexOptions::DocsAndFreqs);
        let store = write_field(&field, 100, |w| {
            w.start_term();
            w.start_doc(4, 1).unwrap();
            w.finish_doc().unwrap();
            w.start_doc(6, 3).unwrap();
            w.finish_doc().unwrap();
            w.finish_term().unwrap();
        });

        let bytes = freq_body(&store, 2);
        let mut reader = open_stream(&bytes, FREQ_STREAM_CODEC, 1, "frq").unwrap();
        skip_prologue(&mut reader);
        assert_eq!(reader.read_vlong().unwrap(), 4 << 1 | 1);
        assert_eq!(reader.read_vlong().unwrap(), 2 << 1);
        assert_eq!(reader.read_vint().unwrap(), 3);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_out_of_order_doc_is_fatal() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(100, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
        writer.start_term();
        writer.start_doc(5, 1).unwrap();
        writer.finish_doc().unwrap();
        let err = writer.start_doc(5, 1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OrderViolation { .. }));
    }

    #[test]
    fn test_out_of_order_position_is_fatal() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions);
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(100, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
        writer.start_term();
        writer.start_doc(0, 3).unwrap();
        writer.add_position(0, None, None).unwrap();
        writer.add_position(4, None, None).unwrap();
        let err = writer.add_position(4, None, None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OrderViolation { .. }));
    }

    #[test]
    fn test_position_count_must_match_frequency() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions);
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(100, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
        writer.start_term();
        writer.start_doc(0, 2).unwrap();
        writer.add_position(1, None, None).unwrap();
        assert!(writer.finish_doc().is_err());
        writer.add_position(5, None, None).unwrap();
        writer.finish_doc().unwrap();
        assert!(matches!(
            writer.add_position(9, None, None).unwrap_err().kind(),
            ErrorKind::InvalidOperation { .. }
        ));
    }

    #[test]
    fn test_positions_rejected_without_position_indexing() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(100, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
        writer.start_term();
        writer.start_doc(0, 2).unwrap();
        let err = writer.add_position(1, None, None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
    }

    #[test]
    fn test_payload_rejected_when_not_stored() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions);
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(100, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
        writer.start_term();
        writer.start_doc(0, 1).unwrap();
        let err = writer.add_position(1, Some(b"pay"), None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
    }

    #[test]
    fn test_offsets_required_when_indexed() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositionsAndOffsets);
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(100, &store);
        let mut writer =
            FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
        writer.start_term();
        writer.start_doc(0, 3).unwrap();
        assert!(writer.add_position(1, None, None).is_err());
        writer.add_position(1, None, Some((0, 4))).unwrap();
        // offset starts may repeat, but must not go backwards
        writer.add_position(2, None, Some((4, 4))).unwrap();
        let err = writer.add_position(3, None, Some((2, 6))).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OrderViolation { .. }));
    }

    #[test]
    fn test_both_streams_carry_the_prologue() {
        let field = FieldInfo::new("body", 1, IndexOptions::DocsAndFreqsAndPositions);
        let store = write_field(&field, 50, |w| {
            w.start_term();
            w.start_doc(2, 1).unwrap();
            w.add_position(0, None, None).unwrap();
            w.finish_doc().unwrap();
            w.finish_term().unwrap();
        });

        let config = CodecConfig::default();
        for (suffix, codec) in [
            (FREQUENCIES_SUFFIX, FREQ_STREAM_CODEC),
            (POSITIONS_SUFFIX, PROX_STREAM_CODEC),
        ] {
            let bytes = store.sealed_stream(1, suffix).unwrap();
            let mut reader = open_stream(&bytes, codec, 1, suffix).unwrap();
            assert_eq!(reader.read_vint().unwrap(), config.skip_interval);
            assert_eq!(reader.read_vint().unwrap(), config.max_skip_levels);
            assert_eq!(reader.read_vint().unwrap(), config.skip_minimum);
        }
    }

    #[test]
    fn test_unsealed_writer_disposes_streams() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
        let store = MemorySegmentStore::new();
        {
            let context = SegmentWriteContext::new(10, &store);
            let mut writer =
                FieldPostingsWriter::open(&context, &field, &CodecConfig::default()).unwrap();
            writer.start_term();
            writer.start_doc(0, 1).unwrap();
            // dropped without seal
        }
        assert!(store.sealed_stream(0, FREQUENCIES_SUFFIX).is_none());
    }
}
