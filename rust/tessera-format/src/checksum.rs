//! Stream content checksums.
//!
//! Every segment stream ends with a footer carrying a checksum of all
//! preceding bytes (header included). The checksum is the 64-bit xxh3 hash
//! folded to 32 bits.

/// Computes the checksum of a buffer.
pub fn compute(buf: &[u8]) -> u32 {
    let h = xxhash_rust::xxh3::xxh3_64(buf);
    fold(h)
}

/// Folds a 64-bit xxh3 digest into the 32-bit checksum stored on disk.
pub fn fold(digest: u64) -> u32 {
    (digest as u32) ^ ((digest >> 32) as u32)
}

/// Validates a buffer against an expected checksum.
///
/// `name` identifies the element being validated and is carried in the error.
pub fn validate_buffer(buf: &[u8], checksum: u32, name: Option<&str>) -> tessera_common::Result<()> {
    let actual = compute(buf);
    if actual == checksum {
        Ok(())
    } else {
        Err(tessera_common::error::Error::checksum_mismatch(
            name.unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_common::error::ErrorKind;

    #[test]
    fn test_validate_buffer_valid() {
        let buf = b"postings bytes";
        let checksum = compute(buf);
        assert!(validate_buffer(buf, checksum, Some("frq")).is_ok());
    }

    #[test]
    fn test_validate_buffer_mismatch() {
        let buf = b"postings bytes";
        let checksum = compute(buf) ^ 0x10;
        let result = validate_buffer(buf, checksum, Some("frq"));
        assert!(matches!(
            result.unwrap_err().kind(),
            ErrorKind::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_fold_matches_streaming_digest() {
        let buf = b"incremental";
        let mut hasher = xxhash_rust::xxh3::Xxh3::new();
        hasher.update(&buf[..5]);
        hasher.update(&buf[5..]);
        assert_eq!(fold(hasher.digest()), compute(buf));
    }
}
