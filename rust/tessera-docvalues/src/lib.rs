//! Columnar per-document values for tessera segments: numeric fields at a
//! range-chosen width, binary fields straight or behind a deduplicated
//! dictionary, and sorted fields whose ordinals mirror lexicographic value
//! order. Layout selection is driven by a statistics scan of the field, and
//! verification decoders cover every layout.

pub mod layout;
pub mod read;
pub mod stats;
pub mod writer;

mod binary;
mod numeric;
mod sorted;

pub use layout::DocValuesLayout;
pub use read::{SortedDocValues, read_binary, read_numeric, read_sorted};
pub use writer::DocValuesWriter;
