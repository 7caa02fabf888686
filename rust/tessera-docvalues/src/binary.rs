//! The straight and deref binary layouts.
//!
//! Straight layouts store every document's bytes in document order; deref
//! layouts store each distinct value once and give every document a packed
//! reference into that dictionary. Fixed variants drop per-value addressing
//! because all values share one length.

use std::collections::{BTreeMap, BTreeSet};

use byteorder::{LittleEndian, WriteBytesExt};
use tessera_common::{Result, error::Error};
use tessera_format::packed::{PackedWriter, bits_required};
use tessera_io::VarintWrite;

use crate::layout::DocValuesLayout;
use crate::stats::BinaryStats;

/// The binary layout choice with the parameters the payload writers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BinaryPlan<'a> {
    FixedStraight { stride: u32 },
    VarStraight { total_len: u64 },
    FixedDeref { dict: BTreeSet<&'a [u8]>, stride: u32 },
    VarDeref { dict: BTreeSet<&'a [u8]> },
}

impl BinaryPlan<'_> {
    pub(crate) fn layout(&self) -> DocValuesLayout {
        match self {
            BinaryPlan::FixedStraight { .. } => DocValuesLayout::BytesFixedStraight,
            BinaryPlan::VarStraight { .. } => DocValuesLayout::BytesVarStraight,
            BinaryPlan::FixedDeref { .. } => DocValuesLayout::BytesFixedDeref,
            BinaryPlan::VarDeref { .. } => DocValuesLayout::BytesVarDeref,
        }
    }
}

/// Picks the binary layout from the scanned statistics.
///
/// A dictionary pays off only when it survived the scan and holds fewer than
/// half as many entries as there are documents; otherwise values are stored
/// straight.
pub(crate) fn plan_layout(stats: BinaryStats<'_>) -> BinaryPlan<'_> {
    let fixed_len = stats.fixed_len();
    let dedup = stats.dedup_selected();
    match (dedup, stats.distinct, fixed_len) {
        (true, Some(dict), Some(stride)) => BinaryPlan::FixedDeref { dict, stride },
        (true, Some(dict), None) => BinaryPlan::VarDeref { dict },
        (_, _, Some(stride)) => BinaryPlan::FixedStraight { stride },
        (_, _, None) => BinaryPlan::VarStraight {
            total_len: stats.total_len,
        },
    }
}

/// Data stream: the stride, then every document's bytes back to back. No
/// index stream.
pub(crate) fn write_fixed_straight<W: std::io::Write>(
    dat: &mut W,
    values: &[Option<&[u8]>],
    stride: u32,
) -> Result<()> {
    dat.write_u32::<LittleEndian>(stride)?;
    for value in values {
        dat.write_all(value.unwrap_or(&[]))?;
    }
    Ok(())
}

/// Data stream: every document's bytes back to back. Index stream: the total
/// byte length, then `doc_count + 1` packed start addresses whose final
/// entry is the total length.
pub(crate) fn write_var_straight<D: std::io::Write, I: std::io::Write>(
    dat: &mut D,
    idx: &mut I,
    values: &[Option<&[u8]>],
    total_len: u64,
) -> Result<()> {
    for value in values {
        dat.write_all(value.unwrap_or(&[]))?;
    }

    idx.write_vlong(total_len)?;
    let mut addresses =
        PackedWriter::new(idx, values.len() as u64 + 1, bits_required(total_len))?;
    let mut address = 0u64;
    for value in values {
        addresses.add(address)?;
        address += value.unwrap_or(&[]).len() as u64;
    }
    addresses.add(address)?;
    addresses.finish()?;
    Ok(())
}

/// Data stream: the stride, then the sorted dictionary back to back. Index
/// stream: the dictionary size, then one packed ordinal per document.
pub(crate) fn write_fixed_deref<D: std::io::Write, I: std::io::Write>(
    dat: &mut D,
    idx: &mut I,
    values: &[Option<&[u8]>],
    dict: &BTreeSet<&[u8]>,
    stride: u32,
) -> Result<()> {
    dat.write_u32::<LittleEndian>(stride)?;
    for entry in dict {
        dat.write_all(entry)?;
    }

    let value_count = dictionary_size(dict)?;
    idx.write_u32::<LittleEndian>(value_count)?;
    let ords: BTreeMap<&[u8], u64> = dict.iter().copied().zip(0u64..).collect();
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

/// Data stream: each dictionary entry behind its short length prefix. Index
/// stream: the total data length, then one packed entry address per
/// document.
pub(crate) fn write_var_deref<D: std::io::Write, I: std::io::Write>(
    dat: &mut D,
    idx: &mut I,
    values: &[Option<&[u8]>],
    dict: &BTreeSet<&[u8]>,
) -> Result<()> {
    let mut addresses: BTreeMap<&[u8], u64> = BTreeMap::new();
    let mut address = 0u64;
    for entry in dict {
        addresses.insert(*entry, address);
        address += prefix_len(entry.len()) + entry.len() as u64;
        write_prefixed(dat, entry)?;
    }
    let total_len = address;

    idx.write_vlong(total_len)?;
    let mut packed =
        PackedWriter::new(idx, values.len() as u64, bits_required(total_len))?;
    for value in values {
        packed.add(lookup(&addresses, value.unwrap_or(&[]))?)?;
    }
    packed.finish()?;
    Ok(())
}

/// Narrows a dictionary size to the on-stream ordinal range.
pub(crate) fn dictionary_size(dict: &BTreeSet<&[u8]>) -> Result<u32> {
    u32::try_from(dict.len()).map_err(|_| {
        Error::unsupported_scale(
            "dictionary",
            "distinct value count exceeds the representable ordinal range",
        )
    })
}

pub(crate) fn lookup(table: &BTreeMap<&[u8], u64>, value: &[u8]) -> Result<u64> {
    table.get(value).copied().ok_or_else(|| {
        Error::invalid_operation("dictionary lookup missed a scanned value")
    })
}

fn prefix_len(len: usize) -> u64 {
    if len < 0x80 { 1 } else { 2 }
}

/// Lengths are kept under 2^15 by the value length cap, so one prefix byte
/// below 128 and two bytes with the high bit set otherwise.
fn write_prefixed<W: std::io::Write>(out: &mut W, value: &[u8]) -> Result<()> {
    let len = value.len();
    if len < 0x80 {
        out.write_u8(len as u8)?;
    } else {
        out.write_u8(0x80 | (len >> 8) as u8)?;
        out.write_u8(len as u8)?;
    }
    out.write_all(value)?;
    Ok(())
}
