//! # Tessera: inverted-index segment codec
//!
//! Tessera encodes the per-segment streams of an inverted search index. It
//! covers the codec layer only: the surrounding segment writer drives it
//! field by field and term by term, and records the small metadata values it
//! returns (term metadata, layout tags) to hand back at read time.
//!
//! ## Components
//!
//! * [`postings`] - per-term document, frequency, position, offset and
//!   payload streams with delta and varint encoding, plus the multi-level
//!   skip structure over them
//! * [`docvalues`] - columnar per-document values with statistics-driven
//!   layout selection: fixed-width and packed numerics, straight and
//!   dictionary binary storage, and sorted dictionaries with
//!   order-preserving ordinals
//! * [`format`] - the shared stream framing (codec headers, checksummed
//!   footers), bit-packed integer blocks, codec configuration and the
//!   segment writer context
//! * [`io`] - varint primitives, the positioned slice cursor and the output
//!   stream abstraction
//! * [`common`] - the error type shared by every component
//!
//! Every stream is self-checking: framed with a codec name and version and
//! closed by a checksummed footer, validated before any payload byte is
//! interpreted. Writers are deterministic, so identical input yields
//! byte-identical segments.
//!
//! This crate re-exports the component crates for use through a single
//! dependency.

pub use tessera_common as common;
pub use tessera_docvalues as docvalues;
pub use tessera_format as format;
pub use tessera_io as io;
pub use tessera_postings as postings;
