//! The sorted binary layouts.
//!
//! Like the deref layouts the data stream holds each distinct value once,
//! but here ordinal order is meaningful: the dictionary is written in
//! lexicographic byte order, so comparing two documents' ordinals compares
//! their values. Missing documents take the empty string's ordinal, and the
//! empty string joins the dictionary when it is not already a value.

use std::collections::{BTreeMap, BTreeSet};

use tessera_common::Result;
use tessera_format::packed::{PackedWriter, bits_required};
use tessera_io::VarintWrite;

use crate::binary::{self, dictionary_size, lookup};
use crate::layout::DocValuesLayout;
use crate::stats::BinaryStats;

/// The sorted layout choice with its dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SortedPlan<'a> {
    Fixed { dict: BTreeSet<&'a [u8]>, stride: u32 },
    Var { dict: BTreeSet<&'a [u8]> },
}

impl SortedPlan<'_> {
    pub(crate) fn layout(&self) -> DocValuesLayout {
        match self {
            SortedPlan::Fixed { .. } => DocValuesLayout::BytesFixedSorted,
            SortedPlan::Var { .. } => DocValuesLayout::BytesVarSorted,
        }
    }
}

/// Builds the dictionary and picks the sorted layout.
///
/// The fixed variant requires every document present with one shared length;
/// a missing document drags the empty string into the dictionary, which
/// breaks the shared length unless the field is empty strings throughout.
pub(crate) fn plan_layout<'a>(
    values: &[Option<&'a [u8]>],
    stats: &BinaryStats<'_>,
) -> SortedPlan<'a> {
    let mut dict: BTreeSet<&[u8]> = values.iter().flatten().copied().collect();
    if stats.missing_count > 0 {
        dict.insert(&[]);
    }

    if stats.missing_count == 0 {
        if let Some(stride) = stats.fixed_len() {
            return SortedPlan::Fixed { dict, stride };
        }
    }
    SortedPlan::Var { dict }
}

/// Same streams as the fixed deref layout; only the ordinal contract
/// differs.
pub(crate) fn write_fixed<D: std::io::Write, I: std::io::Write>(
    dat: &mut D,
    idx: &mut I,
    values: &[Option<&[u8]>],
    dict: &BTreeSet<&[u8]>,
    stride: u32,
) -> Result<()> {
    binary::write_fixed_deref(dat, idx, values, dict, stride)
}

/// Data stream: the sorted dictionary back to back. Index stream: the total
/// byte length, the packed entry addresses with a trailing sentinel, then
/// one packed ordinal per document.
pub(crate) fn write_var<D: std::io::Write, I: std::io::Write>(
    dat: &mut D,
    idx: &mut I,
    values: &[Option<&[u8]>],
    dict: &BTreeSet<&[u8]>,
) -> Result<()> {
    let mut ords: BTreeMap<&[u8], u64> = BTreeMap::new();
    let mut entry_addresses = Vec::with_capacity(dict.len() + 1);
    let mut address = 0u64;
    for (ord, entry) in dict.iter().enumerate() {
        ords.insert(*entry, ord as u64);
        entry_addresses.push(address);
        address += entry.len() as u64;
        dat.write_all(entry)?;
    }
    entry_addresses.push(address);
    let total_len = address;

    idx.write_vlong(total_len)?;
    let mut addresses = PackedWriter::new(
        idx,
        entry_addresses.len() as u64,
        bits_required(total_len),
    )?;
    for entry_address in entry_addresses {
        addresses.add(entry_address)?;
    }
    addresses.finish()?;

    let value_count = dictionary_size(dict)?;
    let mut packed = PackedWriter::new(
        idx,
        values.len() as u64,
        bits_required(u64::from(value_count.saturating_sub(1))),
    )?;
    for value in values {
        packed.add(lookup(&ords, value.unwrap_or(&[]))?)?;
    }
    packed.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{BinaryStatsFlags, collect_binary};

    fn plan_for<'a>(values: &[Option<&'a [u8]>]) -> SortedPlan<'a> {
        let stats = collect_binary(values, 256, BinaryStatsFlags::LENGTHS);
        plan_layout(values, &stats)
    }

    #[test]
    fn test_fixed_requires_full_presence() {
        let full: [Option<&[u8]>; 3] = [Some(b"xx"), Some(b"yy"), Some(b"xx")];
        assert!(matches!(plan_for(&full), SortedPlan::Fixed { stride: 2, .. }));

        let gap: [Option<&[u8]>; 3] = [Some(b"xx"), None, Some(b"xx")];
        let plan = plan_for(&gap);
        assert!(matches!(plan, SortedPlan::Var { .. }));
    }

    #[test]
    fn test_missing_adds_empty_string_once() {
        let gap: [Option<&[u8]>; 4] = [Some(b"b"), None, Some(b""), None];
        let SortedPlan::Var { dict } = plan_for(&gap) else {
            panic!("expected the var layout");
        };
        assert_eq!(dict.into_iter().collect::<Vec<_>>(), [b"".as_slice(), b"b"]);
    }

    #[test]
    fn test_var_payload_structure() {
        let dict: BTreeSet<&[u8]> = [b"".as_slice(), b"aa", b"b"].into_iter().collect();
        let values: [Option<&[u8]>; 4] = [Some(b"b"), None, Some(b"aa"), Some(b"b")];
        let mut dat = Vec::new();
        let mut idx = Vec::new();
        write_var(&mut dat, &mut idx, &values, &dict).unwrap();

        assert_eq!(dat, b"aab");

        let mut reader = tessera_io::SliceReader::new(&idx);
        assert_eq!(reader.read_vlong().unwrap(), 3);
        let addresses = tessera_format::packed::PackedReader::parse(&mut reader).unwrap();
        assert_eq!(addresses.iter().collect::<Vec<_>>(), [0, 0, 2, 3]);
        let ordinals = tessera_format::packed::PackedReader::parse(&mut reader).unwrap();
        // "" < "aa" < "b"; the missing document takes ordinal 0
        assert_eq!(ordinals.iter().collect::<Vec<_>>(), [2, 0, 1, 2]);
        assert_eq!(reader.remaining(), 0);
    }
}
