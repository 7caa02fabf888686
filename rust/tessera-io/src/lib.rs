//! I/O abstractions for segment stream writing:
//! - `IndexOutput`: sequential, position-tracked writer with a `seal()` operation,
//!   committing the write activity.
//! - `VarintWrite`: variable-length integer extensions for any writer.
//! - `SliceReader`: positioned cursor over an in-memory stream, used by the
//!   read-side verification decoders.
//!
//! Provides two `IndexOutput` implementations: memory-based (`Vec<u8>`) and
//! file-based (`FileIndexOutput`).

pub mod file;
pub mod varint;

pub use file::FileIndexOutput;
pub use varint::{SliceReader, VarintWrite};

/// A sequential, append-only output stream for segment artifacts.
///
/// The codec records byte positions returned by [`position`](IndexOutput::position)
/// as pointers inside the encoded data (term start offsets, skip pointers,
/// dictionary addresses), so implementations must count every byte accepted by
/// `write`.
///
/// Writers are `Send` so that independent fields can be encoded on separate
/// threads, each owning its own streams; they are not `Sync` — a single stream
/// is always driven by one encoder.
pub trait IndexOutput: std::io::Write + Send {
    /// Returns the number of bytes written so far, which is the position that
    /// the next written byte will occupy.
    fn position(&self) -> u64;

    /// Seals the stream, flushing buffered data and committing it to the
    /// underlying medium. A stream that is dropped without being sealed is
    /// considered disposed: its bytes are garbage to be collected externally.
    fn seal(&mut self) -> std::io::Result<()>;
}

impl IndexOutput for Vec<u8> {
    fn position(&self) -> u64 {
        self.len() as u64
    }

    fn seal(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<T> IndexOutput for Box<T>
where
    T: IndexOutput + ?Sized,
{
    fn position(&self) -> u64 {
        self.as_ref().position()
    }

    fn seal(&mut self) -> std::io::Result<()> {
        self.as_mut().seal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_index_output() {
        let mut out: Vec<u8> = Vec::new();
        assert_eq!(out.position(), 0);
        std::io::Write::write_all(&mut out, b"abc").unwrap();
        assert_eq!(out.position(), 3);
        out.seal().unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_boxed_index_output() {
        let mut out: Box<dyn IndexOutput> = Box::new(Vec::new());
        std::io::Write::write_all(&mut out, &[1, 2, 3, 4]).unwrap();
        assert_eq!(out.position(), 4);
        out.seal().unwrap();
    }
}
