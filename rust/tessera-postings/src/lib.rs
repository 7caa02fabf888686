//! Postings encoding for tessera segments: per-term document, frequency,
//! position, offset and payload streams with delta and varint encoding, the
//! multi-level skip structure over them, and verification decoders for both.

pub mod read;
pub mod skip;
pub mod writer;

pub use read::{Position, Posting, PostingsReader, SkipEntry, SkipListReader};
pub use skip::SkipListWriter;
pub use writer::{FieldPostingsWriter, TermMetadata};
