//! Field metadata supplied by the segment writer context.

use serde::{Deserialize, Serialize};
use tessera_common::{Result, verify_arg};

/// What a field indexes, from cheapest to richest.
///
/// The ladder is cumulative: offsets imply positions, positions imply
/// frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexOptions {
    /// Documents only; the frequency stream carries plain doc deltas.
    Docs,
    /// Documents and term frequencies.
    DocsAndFreqs,
    /// Documents, frequencies and positions.
    DocsAndFreqsAndPositions,
    /// Documents, frequencies, positions and character offsets.
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    pub fn has_freqs(&self) -> bool {
        *self >= IndexOptions::DocsAndFreqs
    }

    pub fn has_positions(&self) -> bool {
        *self >= IndexOptions::DocsAndFreqsAndPositions
    }

    pub fn has_offsets(&self) -> bool {
        *self >= IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }
}

/// Per-field metadata handed to the encoders by the segment writer context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub ordinal: u32,
    pub index_options: IndexOptions,
    /// Whether per-position payload bytes are stored. Only meaningful when
    /// positions are indexed.
    pub store_payloads: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, ordinal: u32, index_options: IndexOptions) -> FieldInfo {
        FieldInfo {
            name: name.into(),
            ordinal,
            index_options,
            store_payloads: false,
        }
    }

    pub fn with_payloads(mut self) -> FieldInfo {
        self.store_payloads = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(name, !self.name.is_empty());
        verify_arg!(
            store_payloads,
            !self.store_payloads || self.index_options.has_positions()
        );
        Ok(())
    }
}
