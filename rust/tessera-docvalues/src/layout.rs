//! The doc-values layout tag.
//!
//! The encoder selects one physical layout per field from the value
//! statistics and returns its tag to the caller; the tag is stored in
//! collaborator-owned field metadata and handed back to the read side.
//! Nothing in the streams identifies the layout, so the tag is part of the
//! format contract.

use serde::{Deserialize, Serialize};
use tessera_common::error::Error;

/// Physical layout of one field's doc values.
///
/// The `#[repr(u8)]` discriminants are stable: they are persisted in field
/// metadata and must not change between format versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DocValuesLayout {
    /// One signed byte per document.
    Fixed8 = 0,

    /// One signed 16-bit little-endian integer per document.
    Fixed16 = 1,

    /// One signed 32-bit little-endian integer per document.
    Fixed32 = 2,

    /// Min-relative bit-packed integers, degrading to raw 64-bit values for
    /// empty fields or ranges that overflow; a mode byte inside the payload
    /// distinguishes the two forms.
    VarInts = 3,

    /// Equal-length values concatenated at a fixed stride; no index stream.
    BytesFixedStraight = 4,

    /// Variable-length values concatenated, with a bit-packed table of
    /// `doc_count + 1` byte addresses in the index stream.
    BytesVarStraight = 5,

    /// Fixed-stride sorted dictionary plus bit-packed per-document ordinals.
    BytesFixedDeref = 6,

    /// Length-prefixed sorted dictionary plus bit-packed per-document byte
    /// addresses of the dictionary entries.
    BytesVarDeref = 7,

    /// Fixed-stride sorted dictionary plus bit-packed ordinals, with the
    /// ordinal order meaningful for range comparisons.
    BytesFixedSorted = 8,

    /// Concatenated sorted dictionary with a bit-packed address table of
    /// `value_count + 1` entries, plus bit-packed per-document ordinals.
    BytesVarSorted = 9,
}

impl DocValuesLayout {
    /// Whether the layout stores integers rather than byte strings.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DocValuesLayout::Fixed8
                | DocValuesLayout::Fixed16
                | DocValuesLayout::Fixed32
                | DocValuesLayout::VarInts
        )
    }

    /// Whether the layout writes an index stream next to the data stream.
    pub fn has_index_stream(&self) -> bool {
        matches!(
            self,
            DocValuesLayout::BytesVarStraight
                | DocValuesLayout::BytesFixedDeref
                | DocValuesLayout::BytesVarDeref
                | DocValuesLayout::BytesFixedSorted
                | DocValuesLayout::BytesVarSorted
        )
    }

    /// Whether per-document ordinals follow the dictionary's lexicographic
    /// order.
    pub fn is_sorted(&self) -> bool {
        matches!(
            self,
            DocValuesLayout::BytesFixedSorted | DocValuesLayout::BytesVarSorted
        )
    }
}

impl TryFrom<u8> for DocValuesLayout {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DocValuesLayout::Fixed8),
            1 => Ok(DocValuesLayout::Fixed16),
            2 => Ok(DocValuesLayout::Fixed32),
            3 => Ok(DocValuesLayout::VarInts),
            4 => Ok(DocValuesLayout::BytesFixedStraight),
            5 => Ok(DocValuesLayout::BytesVarStraight),
            6 => Ok(DocValuesLayout::BytesFixedDeref),
            7 => Ok(DocValuesLayout::BytesVarDeref),
            8 => Ok(DocValuesLayout::BytesFixedSorted),
            9 => Ok(DocValuesLayout::BytesVarSorted),
            _ => Err(Error::invalid_arg(
                "layout",
                format!("unknown doc-values layout tag {value}"),
            )),
        }
    }
}
