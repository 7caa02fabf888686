//! Segment stream format definitions shared by the postings and doc-values
//! codecs:
//! - stream framing (codec headers, checksummed footers),
//! - bit-packed integer blocks,
//! - codec configuration,
//! - field metadata and the segment writer context.

pub mod checksum;
pub mod config;
pub mod field;
pub mod packed;
pub mod segment;
pub mod stream;

pub use config::CodecConfig;
pub use field::{FieldInfo, IndexOptions};
pub use segment::{DirectorySegmentStore, MemorySegmentStore, SegmentWriteContext, StreamFactory};
pub use stream::StreamWriter;
