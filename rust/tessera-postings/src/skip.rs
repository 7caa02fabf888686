//! Multi-level skip list construction for the frequency stream.
//!
//! Level 0 holds one entry per `skip_interval` documents of a term; level `k`
//! one entry per `skip_interval^(k+1)` documents. Entries are buffered in
//! memory while the term is written and flushed at term end, highest level
//! first, because an entry at level `k` carries a child pointer into the
//! level `k-1` buffer, which is only final once that buffer is complete.
//!
//! Flush layout within the frequency stream: for each non-empty level above
//! 0, from the highest down, a varint byte length followed by the level's
//! buffer; then the level-0 buffer, unprefixed. A reader peels the prefixed
//! levels off the front and treats the remainder as level 0.
//!
//! Per-level entry layout: the doc delta (shifted left with a length-changed
//! flag when the field stores payloads or offsets, with the new lengths
//! following), then the frequency and position stream pointer deltas, all
//! relative to the previous entry at the same level. Entries above level 0
//! end with the child pointer.

use tessera_common::Result;
use tessera_format::CodecConfig;
use tessera_io::{IndexOutput, VarintWrite};

/// Number of usable skip levels for a given document count.
///
/// Derived once per segment from the total document count (for the writer)
/// and per term from the document frequency (for a reader peeling levels off
/// a flushed block): a level is usable only if the count reaches its cadence.
pub fn skip_level_count(doc_count: u32, config: &CodecConfig) -> usize {
    let mut levels = 1;
    let mut n = doc_count / config.skip_interval;
    while n >= config.skip_interval && levels < config.max_skip_levels {
        n /= config.skip_interval;
        levels += 1;
    }
    levels as usize
}

#[derive(Default)]
struct SkipLevelState {
    buf: Vec<u8>,
    last_doc: u32,
    last_payload_len: Option<u32>,
    last_offset_len: Option<u32>,
    last_freq_ptr: u64,
    last_prox_ptr: u64,
}

/// Buffers and flushes the skip structure of a single term.
///
/// The owning postings writer calls [`reset_skip`](SkipListWriter::reset_skip)
/// at term start, [`set_skip_data`](SkipListWriter::set_skip_data) followed by
/// [`buffer_skip`](SkipListWriter::buffer_skip) at every skip point, and
/// [`write_skip`](SkipListWriter::write_skip) at term end.
pub struct SkipListWriter {
    skip_interval: u32,
    num_levels: usize,
    store_payloads: bool,
    store_offsets: bool,
    levels: Vec<SkipLevelState>,
    cur_doc: u32,
    cur_payload_len: Option<u32>,
    cur_offset_len: Option<u32>,
    cur_freq_ptr: u64,
    cur_prox_ptr: u64,
}

impl SkipListWriter {
    /// Creates a writer sized for a segment of `doc_count` documents. The
    /// level count is fixed here, not per term.
    pub fn new(
        config: &CodecConfig,
        doc_count: u32,
        store_payloads: bool,
        store_offsets: bool,
    ) -> SkipListWriter {
        let num_levels = skip_level_count(doc_count, config);
        SkipListWriter {
            skip_interval: config.skip_interval,
            num_levels,
            store_payloads,
            store_offsets,
            levels: (0..num_levels).map(|_| Default::default()).collect(),
            cur_doc: 0,
            cur_payload_len: None,
            cur_offset_len: None,
            cur_freq_ptr: 0,
            cur_prox_ptr: 0,
        }
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Reinitializes every level for a new term: buffers emptied, previous
    /// doc reset to 0, previous lengths to "unknown" (forcing the first entry
    /// per level to record them), previous pointers to the streams' current
    /// offsets, so that pointer deltas accumulate from the term start.
    pub fn reset_skip(&mut self, freq_ptr: u64, prox_ptr: u64) {
        for level in &mut self.levels {
            level.buf.clear();
            level.last_doc = 0;
            level.last_payload_len = None;
            level.last_offset_len = None;
            level.last_freq_ptr = freq_ptr;
            level.last_prox_ptr = prox_ptr;
        }
    }

    /// Stages the skip point to buffer next: the last written docID, the
    /// payload/offset lengths in effect, and the stream positions captured
    /// before the upcoming document's bytes.
    pub fn set_skip_data(
        &mut self,
        doc: u32,
        payload_len: Option<u32>,
        offset_len: Option<u32>,
        freq_ptr: u64,
        prox_ptr: u64,
    ) {
        self.cur_doc = doc;
        self.cur_payload_len = payload_len;
        self.cur_offset_len = offset_len;
        self.cur_freq_ptr = freq_ptr;
        self.cur_prox_ptr = prox_ptr;
    }

    /// Buffers the staged skip point at level 0 and at every higher level
    /// whose cadence `doc_freq` reaches. `doc_freq` must be a multiple of the
    /// skip interval.
    pub fn buffer_skip(&mut self, doc_freq: u32) -> Result<()> {
        let mut promote = doc_freq;
        let mut levels = 0;
        while promote % self.skip_interval == 0 && levels < self.num_levels {
            levels += 1;
            promote /= self.skip_interval;
        }

        let mut child_ptr = 0u64;
        for level in 0..levels {
            // the child pointer references the position just past the datum,
            // before the child's own child pointer
            let datum_end = self.write_level_datum(level)?;
            if level != 0 {
                self.levels[level].buf.write_vlong(child_ptr)?;
            }
            child_ptr = datum_end;
        }
        Ok(())
    }

    /// Buffers the staged skip point at level 0 only. Used for the closing
    /// entry of a term whose document frequency is not a multiple of the skip
    /// interval, so that a term with `n` documents always produces
    /// `ceil(n / skip_interval)` level-0 entries.
    pub fn buffer_tail(&mut self) -> Result<()> {
        self.write_level_datum(0)?;
        Ok(())
    }

    fn write_level_datum(&mut self, level: usize) -> Result<u64> {
        let cur_doc = self.cur_doc;
        let cur_payload_len = self.cur_payload_len;
        let cur_offset_len = self.cur_offset_len;
        let state = &mut self.levels[level];
        let delta = u64::from(cur_doc - state.last_doc);

        if self.store_payloads || self.store_offsets {
            if cur_payload_len == state.last_payload_len
                && cur_offset_len == state.last_offset_len
            {
                // lengths unchanged since the previous entry at this level
                state.buf.write_vlong(delta << 1)?;
            } else {
                state.buf.write_vlong(delta << 1 | 1)?;
                if self.store_payloads {
                    state.buf.write_vint(cur_payload_len.unwrap_or(0))?;
                    state.last_payload_len = cur_payload_len;
                }
                if self.store_offsets {
                    state.buf.write_vint(cur_offset_len.unwrap_or(0))?;
                    state.last_offset_len = cur_offset_len;
                }
            }
        } else {
            state.buf.write_vlong(delta)?;
        }

        state.buf.write_vlong(self.cur_freq_ptr - state.last_freq_ptr)?;
        state.buf.write_vlong(self.cur_prox_ptr - state.last_prox_ptr)?;

        state.last_doc = cur_doc;
        state.last_freq_ptr = self.cur_freq_ptr;
        state.last_prox_ptr = self.cur_prox_ptr;
        Ok(state.buf.len() as u64)
    }

    /// Flushes all buffered levels into `out` and returns the stream
    /// position where the skip data begins. Levels with no data are omitted.
    pub fn write_skip<W: IndexOutput + ?Sized>(&mut self, out: &mut W) -> Result<u64> {
        let start = out.position();
        for level in (1..self.num_levels).rev() {
            let buf = std::mem::take(&mut self.levels[level].buf);
            if !buf.is_empty() {
                out.write_vlong(buf.len() as u64)?;
                out.write_all(&buf)?;
            }
        }
        let buf = std::mem::take(&mut self.levels[0].buf);
        out.write_all(&buf)?;
        Ok(start)
    }
}
