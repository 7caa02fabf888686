//! File-backed `IndexOutput`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::IndexOutput;

/// Buffered file writer with byte-position tracking.
///
/// `seal` flushes the buffer and syncs file contents; durability of the
/// containing directory entry is left to the commit collaborator.
pub struct FileIndexOutput {
    writer: BufWriter<File>,
    position: u64,
}

impl FileIndexOutput {
    /// Creates (truncating) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<FileIndexOutput> {
        let file = File::create(path)?;
        Ok(FileIndexOutput {
            writer: BufWriter::new(file),
            position: 0,
        })
    }
}

impl Write for FileIndexOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl IndexOutput for FileIndexOutput {
    fn position(&self) -> u64 {
        self.position
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}
