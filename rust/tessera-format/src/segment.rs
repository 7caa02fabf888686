//! Segment writer context: the seam between the codec and its storage
//! collaborator.
//!
//! The codec never names files. It asks a [`StreamFactory`] for an output
//! stream keyed by field ordinal and suffix, writes through it, and seals it.
//! A stream dropped without sealing is disposed: the factory releases the
//! handle and whatever bytes reached storage are garbage for an external
//! cleanup pass.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tessera_common::{Result, error::Error};
use tessera_io::{FileIndexOutput, IndexOutput};

/// Frequency stream suffix: doc deltas, term frequencies and skip data.
pub const FREQUENCIES_SUFFIX: &str = "frq";

/// Position stream suffix: position deltas, payloads and offsets.
pub const POSITIONS_SUFFIX: &str = "prx";

/// Doc-values data stream suffix.
pub const DOC_VALUES_DATA_SUFFIX: &str = "dat";

/// Doc-values index stream suffix: ordinal and address tables.
pub const DOC_VALUES_INDEX_SUFFIX: &str = "idx";

/// Output-stream factory supplied by the segment writer context.
///
/// `Send + Sync` so that independent fields can be encoded concurrently by
/// separate encoder instances sharing one factory.
pub trait StreamFactory: Send + Sync {
    /// Creates the output stream for `(field_ordinal, suffix)`. Streams are
    /// write-once; creating the same key twice supersedes the earlier
    /// stream.
    fn create_stream(&self, field_ordinal: u32, suffix: &str) -> Result<Box<dyn IndexOutput>>;
}

impl<T: StreamFactory + ?Sized> StreamFactory for Arc<T> {
    fn create_stream(&self, field_ordinal: u32, suffix: &str) -> Result<Box<dyn IndexOutput>> {
        self.as_ref().create_stream(field_ordinal, suffix)
    }
}

/// Everything the encoders consume from the surrounding segment writer.
pub struct SegmentWriteContext<'a> {
    /// Total number of documents in the segment. Doc IDs are within
    /// `0..doc_count` and doc-values sequences carry exactly `doc_count`
    /// entries.
    pub doc_count: u32,
    /// Factory for the per-field output streams.
    pub streams: &'a dyn StreamFactory,
}

impl<'a> SegmentWriteContext<'a> {
    pub fn new(doc_count: u32, streams: &'a dyn StreamFactory) -> SegmentWriteContext<'a> {
        SegmentWriteContext { doc_count, streams }
    }
}

/// In-memory stream factory. Sealed streams are retained and can be fetched
/// back; disposed streams vanish.
#[derive(Default, Clone)]
pub struct MemorySegmentStore {
    sealed: Arc<Mutex<BTreeMap<(u32, String), Vec<u8>>>>,
}

impl MemorySegmentStore {
    pub fn new() -> MemorySegmentStore {
        Default::default()
    }

    /// Contents of a sealed stream, if it was sealed.
    pub fn sealed_stream(&self, field_ordinal: u32, suffix: &str) -> Option<Vec<u8>> {
        self.sealed
            .lock()
            .unwrap()
            .get(&(field_ordinal, suffix.to_string()))
            .cloned()
    }

    /// Keys of all sealed streams, in deterministic order.
    pub fn sealed_keys(&self) -> Vec<(u32, String)> {
        self.sealed.lock().unwrap().keys().cloned().collect()
    }
}

impl StreamFactory for MemorySegmentStore {
    fn create_stream(&self, field_ordinal: u32, suffix: &str) -> Result<Box<dyn IndexOutput>> {
        Ok(Box::new(MemoryStreamOutput {
            key: (field_ordinal, suffix.to_string()),
            buf: Vec::new(),
            store: Arc::clone(&self.sealed),
            sealed: false,
        }))
    }
}

struct MemoryStreamOutput {
    key: (u32, String),
    buf: Vec<u8>,
    store: Arc<Mutex<BTreeMap<(u32, String), Vec<u8>>>>,
    sealed: bool,
}

impl std::io::Write for MemoryStreamOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl IndexOutput for MemoryStreamOutput {
    fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    fn seal(&mut self) -> std::io::Result<()> {
        if !self.sealed {
            self.sealed = true;
            self.store
                .lock()
                .unwrap()
                .insert(self.key.clone(), std::mem::take(&mut self.buf));
        }
        Ok(())
    }
}

/// File-system stream factory writing `<segment>_<field>.<suffix>` files
/// under a root directory.
pub struct DirectorySegmentStore {
    root: PathBuf,
    segment: String,
}

impl DirectorySegmentStore {
    pub fn new(root: impl Into<PathBuf>, segment: impl Into<String>) -> DirectorySegmentStore {
        DirectorySegmentStore {
            root: root.into(),
            segment: segment.into(),
        }
    }

    pub fn stream_path(&self, field_ordinal: u32, suffix: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.{}", self.segment, field_ordinal, suffix))
    }
}

impl StreamFactory for DirectorySegmentStore {
    fn create_stream(&self, field_ordinal: u32, suffix: &str) -> Result<Box<dyn IndexOutput>> {
        let path = self.stream_path(field_ordinal, suffix);
        let output = FileIndexOutput::create(&path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(Box::new(output))
    }
}
