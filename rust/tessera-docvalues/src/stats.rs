//! Value statistics driving layout selection.
//!
//! Each field is scanned once before any output stream is opened; the encode
//! pass replays the same slice. Numeric scans treat a missing value as 0 and
//! binary scans as the empty string, so the statistics describe exactly what
//! the layouts will store.

use std::collections::BTreeSet;

use bitflags::bitflags;
use itertools::{Itertools, MinMaxResult};
use tessera_format::packed::bits_required;

bitflags! {
    /// Which statistics a numeric scan collects.
    #[derive(Clone, Copy)]
    pub struct NumericStatsFlags: u32 {
        const MIN_MAX = 1;
        const RANGE_BITS = 2;
    }
}

bitflags! {
    /// Which statistics a binary scan collects.
    #[derive(Clone, Copy)]
    pub struct BinaryStatsFlags: u32 {
        const LENGTHS = 1;
        const DISTINCT_VALUES = 2;
    }
}

/// Statistics over one field's numeric values.
#[derive(Debug, Default)]
pub struct NumericStats {
    /// Number of documents scanned.
    pub doc_count: u32,

    /// Documents without a value; they participate in `min`/`max` as 0.
    pub missing_count: u32,

    /// Minimal value, `None` for an empty field.
    pub min: Option<i64>,

    /// Maximal value, `None` for an empty field.
    pub max: Option<i64>,

    /// Bits needed to pack `value - min`, at least 1. `None` when not
    /// collected, when the field is empty, or when `max - min` overflows.
    pub range_bits: Option<u32>,
}

/// Scans one field's numeric values.
pub fn collect_numeric(values: &[Option<i64>], flags: NumericStatsFlags) -> NumericStats {
    let mut stats = NumericStats {
        doc_count: values.len() as u32,
        missing_count: values.iter().filter(|v| v.is_none()).count() as u32,
        ..NumericStats::default()
    };

    if flags.intersects(NumericStatsFlags::MIN_MAX | NumericStatsFlags::RANGE_BITS) {
        match values.iter().map(|v| v.unwrap_or(0)).minmax() {
            MinMaxResult::NoElements => {}
            MinMaxResult::OneElement(v) => {
                stats.min = Some(v);
                stats.max = Some(v);
            }
            MinMaxResult::MinMax(min, max) => {
                stats.min = Some(min);
                stats.max = Some(max);
            }
        }
    }

    if flags.contains(NumericStatsFlags::RANGE_BITS) {
        stats.range_bits = stats
            .min
            .zip(stats.max)
            .and_then(|(min, max)| max.checked_sub(min))
            .map(|range| bits_required(range as u64));
    }

    stats
}

/// Statistics over one field's binary values. Borrows the scanned values for
/// the distinct set; dropped once the field is written.
#[derive(Debug, Default)]
pub struct BinaryStats<'a> {
    /// Number of documents scanned.
    pub doc_count: u32,

    /// Documents without a value; they participate in lengths and
    /// deduplication as the empty string.
    pub missing_count: u32,

    /// Total byte length across all values.
    pub total_len: u64,

    /// Minimal value length, `None` for an empty field.
    pub min_len: Option<u32>,

    /// Maximal value length, `None` for an empty field.
    pub max_len: Option<u32>,

    /// Distinct values in lexicographic order; `None` once the scan passed
    /// `max_distinct` and abandoned deduplication.
    pub distinct: Option<BTreeSet<&'a [u8]>>,
}

impl BinaryStats<'_> {
    /// The single shared length, when every value has it.
    pub fn fixed_len(&self) -> Option<u32> {
        self.min_len
            .zip(self.max_len)
            .and_then(|(min, max)| (min == max).then_some(min))
    }

    /// Whether a deduplicated dictionary survived the scan and holds fewer
    /// than half as many entries as there are documents.
    pub fn dedup_selected(&self) -> bool {
        self.distinct
            .as_ref()
            .is_some_and(|d| d.len() * 2 < self.doc_count as usize)
    }
}

/// Scans one field's binary values.
pub fn collect_binary<'a>(
    values: &[Option<&'a [u8]>],
    max_distinct: usize,
    mut flags: BinaryStatsFlags,
) -> BinaryStats<'a> {
    let mut stats = BinaryStats {
        doc_count: values.len() as u32,
        ..BinaryStats::default()
    };
    let mut distinct = BTreeSet::new();

    for value in values {
        if value.is_none() {
            stats.missing_count += 1;
        }
        let value = value.unwrap_or(&[]);
        stats.total_len += value.len() as u64;

        if flags.contains(BinaryStatsFlags::LENGTHS) {
            let len = value.len() as u32;
            stats.min_len = Some(stats.min_len.map_or(len, |min| min.min(len)));
            stats.max_len = Some(stats.max_len.map_or(len, |max| max.max(len)));
        }

        if flags.contains(BinaryStatsFlags::DISTINCT_VALUES) {
            distinct.insert(value);
            if distinct.len() > max_distinct {
                // too many distinct values for a dictionary to pay off
                flags.remove(BinaryStatsFlags::DISTINCT_VALUES);
                distinct.clear();
            }
        }
    }

    stats.distinct = flags
        .contains(BinaryStatsFlags::DISTINCT_VALUES)
        .then_some(distinct);
    stats
}
