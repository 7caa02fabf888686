//! Doc-values encoder: one field per call, scanning the values to pick a
//! layout before any stream is opened.
//!
//! Numeric fields land in a byte-aligned fixed width when their range earns
//! it and in the var-int layout otherwise. Binary fields choose between
//! straight and dictionary storage from the scanned length and
//! distinct-value statistics; sorted fields always build the lexicographic
//! dictionary and add per-document ordinals whose order mirrors value order.
//!
//! The returned layout tag is the only state the caller must retain: stored
//! in field metadata, it tells the read side how to interpret the streams.

use tessera_common::{Result, error::Error, verify_arg};
use tessera_format::{
    CodecConfig, FieldInfo, SegmentWriteContext, StreamWriter,
    segment::{DOC_VALUES_DATA_SUFFIX, DOC_VALUES_INDEX_SUFFIX},
};
use tessera_io::IndexOutput;

use crate::binary::{self, BinaryPlan};
use crate::layout::DocValuesLayout;
use crate::numeric;
use crate::sorted::{self, SortedPlan};
use crate::stats::{self, BinaryStatsFlags, NumericStatsFlags};

/// Codec name framing the doc-values data stream.
pub const DATA_STREAM_CODEC: &str = "tessera.docvalues.dat";

/// Codec name framing the doc-values index stream.
pub const INDEX_STREAM_CODEC: &str = "tessera.docvalues.idx";

/// Current version of the doc-values stream format.
pub const DOC_VALUES_FORMAT_VERSION: u32 = 1;

/// Encodes the per-document values of a segment, one field per `write_*`
/// call. Every call runs the full cycle for its field: scan, layout choice,
/// stream writing, seal. No state carries over between fields, so separate
/// writer instances may encode different fields concurrently against one
/// stream factory.
///
/// Value sequences carry exactly one entry per document of the segment, in
/// docID order; `None` marks a document without a value. Streams are sealed
/// only when the whole field succeeded. On any failure the opened streams
/// are dropped unsealed and their bytes are garbage for an external cleanup
/// pass.
pub struct DocValuesWriter<'a> {
    context: &'a SegmentWriteContext<'a>,
    config: CodecConfig,
}

impl<'a> DocValuesWriter<'a> {
    pub fn new(
        context: &'a SegmentWriteContext<'a>,
        config: &CodecConfig,
    ) -> Result<DocValuesWriter<'a>> {
        config.validate()?;
        Ok(DocValuesWriter {
            context,
            config: config.clone(),
        })
    }

    /// Encodes a numeric field. Missing documents are stored as 0 and
    /// participate in the range scan.
    pub fn write_numeric(
        &self,
        field: &FieldInfo,
        values: &[Option<i64>],
    ) -> Result<DocValuesLayout> {
        field.validate()?;
        verify_arg!(values, values.len() == self.context.doc_count as usize);

        let stats = stats::collect_numeric(
            values,
            NumericStatsFlags::MIN_MAX | NumericStatsFlags::RANGE_BITS,
        );
        let plan = numeric::plan_layout(&stats);
        let layout = plan.layout();

        let mut dat = self.open_stream(field, DOC_VALUES_DATA_SUFFIX, DATA_STREAM_CODEC)?;
        numeric::write_payload(&mut dat, &plan, values)?;
        dat.seal()?;

        self.log_sealed(field, layout, dat.position());
        Ok(layout)
    }

    /// Encodes a binary field. Missing documents are stored as the empty
    /// string and participate in the length and distinct-value scans.
    pub fn write_binary(
        &self,
        field: &FieldInfo,
        values: &[Option<&[u8]>],
    ) -> Result<DocValuesLayout> {
        field.validate()?;
        verify_arg!(values, values.len() == self.context.doc_count as usize);
        self.check_value_lengths(field, values)?;

        let stats = stats::collect_binary(
            values,
            self.config.max_distinct_for_dedup,
            BinaryStatsFlags::LENGTHS | BinaryStatsFlags::DISTINCT_VALUES,
        );
        let plan = binary::plan_layout(stats);
        let layout = plan.layout();

        let mut dat = self.open_stream(field, DOC_VALUES_DATA_SUFFIX, DATA_STREAM_CODEC)?;
        let idx = match plan {
            BinaryPlan::FixedStraight { stride } => {
                binary::write_fixed_straight(&mut dat, values, stride)?;
                None
            }
            BinaryPlan::VarStraight { total_len } => {
                let mut idx =
                    self.open_stream(field, DOC_VALUES_INDEX_SUFFIX, INDEX_STREAM_CODEC)?;
                binary::write_var_straight(&mut dat, &mut idx, values, total_len)?;
                Some(idx)
            }
            BinaryPlan::FixedDeref { dict, stride } => {
                let mut idx =
                    self.open_stream(field, DOC_VALUES_INDEX_SUFFIX, INDEX_STREAM_CODEC)?;
                binary::write_fixed_deref(&mut dat, &mut idx, values, &dict, stride)?;
                Some(idx)
            }
            BinaryPlan::VarDeref { dict } => {
                let mut idx =
                    self.open_stream(field, DOC_VALUES_INDEX_SUFFIX, INDEX_STREAM_CODEC)?;
                binary::write_var_deref(&mut dat, &mut idx, values, &dict)?;
                Some(idx)
            }
        };
        dat.seal()?;
        if let Some(mut idx) = idx {
            idx.seal()?;
        }

        self.log_sealed(field, layout, dat.position());
        Ok(layout)
    }

    /// Encodes a sorted field: the lexicographic dictionary plus one ordinal
    /// per document, so ordinal comparisons order documents by value.
    /// Missing documents take the empty string's ordinal; the empty string
    /// joins the dictionary when absent, shifting the real values' ordinals
    /// up by one.
    pub fn write_sorted(
        &self,
        field: &FieldInfo,
        values: &[Option<&[u8]>],
    ) -> Result<DocValuesLayout> {
        field.validate()?;
        verify_arg!(values, values.len() == self.context.doc_count as usize);
        self.check_value_lengths(field, values)?;

        let stats =
            stats::collect_binary(values, self.config.max_distinct_for_dedup, BinaryStatsFlags::LENGTHS);
        let plan = sorted::plan_layout(values, &stats);
        let layout = plan.layout();

        let mut dat = self.open_stream(field, DOC_VALUES_DATA_SUFFIX, DATA_STREAM_CODEC)?;
        let mut idx = self.open_stream(field, DOC_VALUES_INDEX_SUFFIX, INDEX_STREAM_CODEC)?;
        match plan {
            SortedPlan::Fixed { dict, stride } => {
                sorted::write_fixed(&mut dat, &mut idx, values, &dict, stride)?;
            }
            SortedPlan::Var { dict } => {
                sorted::write_var(&mut dat, &mut idx, values, &dict)?;
            }
        }
        dat.seal()?;
        idx.seal()?;

        self.log_sealed(field, layout, dat.position());
        Ok(layout)
    }

    /// Rejects any value longer than the configured cap. Runs before any
    /// output stream is opened so a rejected field leaves no stream behind.
    fn check_value_lengths(&self, field: &FieldInfo, values: &[Option<&[u8]>]) -> Result<()> {
        let limit = u64::from(self.config.max_binary_value_len);
        for value in values.iter().flatten() {
            if value.len() as u64 > limit {
                return Err(Error::value_too_large(
                    format!("field '{}'", field.name),
                    value.len() as u64,
                    limit,
                ));
            }
        }
        Ok(())
    }

    fn open_stream(
        &self,
        field: &FieldInfo,
        suffix: &str,
        codec: &str,
    ) -> Result<StreamWriter<Box<dyn IndexOutput>>> {
        Ok(StreamWriter::open(
            self.context.streams.create_stream(field.ordinal, suffix)?,
            codec,
            DOC_VALUES_FORMAT_VERSION,
        )?)
    }

    fn log_sealed(&self, field: &FieldInfo, layout: DocValuesLayout, data_bytes: u64) {
        log::debug!(
            "sealed doc values for field '{}': {:?}, {} docs, {} data bytes",
            field.name,
            layout,
            self.context.doc_count,
            data_bytes,
        );
    }
}
