//! The numeric doc-values layouts.
//!
//! A field whose range justifies a byte-aligned width stores raw values at
//! 1, 2 or 4 bytes; everything else goes through the var-int layout, which
//! bit-packs `value - min` or degrades to raw 64-bit values when the range
//! cannot be packed.

use byteorder::{LittleEndian, WriteBytesExt};
use tessera_common::Result;
use tessera_format::packed::PackedWriter;

use crate::layout::DocValuesLayout;
use crate::stats::NumericStats;

/// Mode byte of the var-int layout: min-relative bit-packed block.
pub(crate) const VAR_INTS_PACKED: u8 = 0;

/// Mode byte of the var-int layout: one raw 64-bit value per document.
pub(crate) const VAR_INTS_FIXED_64: u8 = 1;

/// The numeric layout choice with the parameters the payload writer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumericPlan {
    Fixed8,
    Fixed16,
    Fixed32,
    Packed { min: i64, bits: u32 },
    Raw64,
}

impl NumericPlan {
    pub(crate) fn layout(&self) -> DocValuesLayout {
        match self {
            NumericPlan::Fixed8 => DocValuesLayout::Fixed8,
            NumericPlan::Fixed16 => DocValuesLayout::Fixed16,
            NumericPlan::Fixed32 => DocValuesLayout::Fixed32,
            NumericPlan::Packed { .. } | NumericPlan::Raw64 => DocValuesLayout::VarInts,
        }
    }
}

/// Picks the numeric layout from the scanned statistics.
///
/// A byte-aligned width is taken only when packing would need more than half
/// of it; narrow ranges pack tighter than any fixed width. Empty fields and
/// ranges that overflow i64 fall back to raw 64-bit values.
pub(crate) fn plan_layout(stats: &NumericStats) -> NumericPlan {
    let (Some(min), Some(max)) = (stats.min, stats.max) else {
        return NumericPlan::Raw64;
    };
    let Some(bits) = stats.range_bits else {
        return NumericPlan::Raw64;
    };

    if min >= i64::from(i8::MIN) && max <= i64::from(i8::MAX) && bits > 4 {
        NumericPlan::Fixed8
    } else if min >= i64::from(i16::MIN) && max <= i64::from(i16::MAX) && bits > 8 {
        NumericPlan::Fixed16
    } else if min >= i64::from(i32::MIN) && max <= i64::from(i32::MAX) && bits > 16 {
        NumericPlan::Fixed32
    } else {
        NumericPlan::Packed { min, bits }
    }
}

/// Writes the data-stream payload. Fixed layouts start with their value size
/// in bytes; the var-int layout with its mode byte.
pub(crate) fn write_payload<W: std::io::Write>(
    out: &mut W,
    plan: &NumericPlan,
    values: &[Option<i64>],
) -> Result<()> {
    match *plan {
        NumericPlan::Fixed8 => {
            out.write_u32::<LittleEndian>(1)?;
            for value in values {
                out.write_i8(value.unwrap_or(0) as i8)?;
            }
        }
        NumericPlan::Fixed16 => {
            out.write_u32::<LittleEndian>(2)?;
            for value in values {
                out.write_i16::<LittleEndian>(value.unwrap_or(0) as i16)?;
            }
        }
        NumericPlan::Fixed32 => {
            out.write_u32::<LittleEndian>(4)?;
            for value in values {
                out.write_i32::<LittleEndian>(value.unwrap_or(0) as i32)?;
            }
        }
        NumericPlan::Packed { min, bits } => {
            out.write_u8(VAR_INTS_PACKED)?;
            out.write_i64::<LittleEndian>(min)?;
            // representation of logical 0; only meaningful when 0 lies
            // inside the value range
            out.write_i64::<LittleEndian>(0i64.wrapping_sub(min))?;
            let mut packed = PackedWriter::new(out, values.len() as u64, bits)?;
            for value in values {
                packed.add(value.unwrap_or(0).wrapping_sub(min) as u64)?;
            }
            packed.finish()?;
        }
        NumericPlan::Raw64 => {
            out.write_u8(VAR_INTS_FIXED_64)?;
            for value in values {
                out.write_i64::<LittleEndian>(value.unwrap_or(0))?;
            }
        }
    }
    Ok(())
}
