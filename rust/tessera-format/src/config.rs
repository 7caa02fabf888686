//! Codec configuration.

use serde::{Deserialize, Serialize};
use tessera_common::{Result, verify_arg};

/// Maximum binary value length the short length prefix of the deref layout
/// can encode (15 bits, with the value `0x7FFF` reserved to keep the 2-byte
/// form unambiguous).
pub const MAX_ENCODABLE_BINARY_LEN: u32 = 0x7FFF - 1;

/// Tuning knobs of the segment codec.
///
/// The skip parameters are recorded in the postings stream prologues; the
/// doc-values thresholds only steer layout selection and leave no trace in
/// the streams beyond the chosen layout itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Document cadence of level-0 skip entries, and the fan-out between
    /// successive skip levels.
    pub skip_interval: u32,

    /// Hard cap on the number of skip levels.
    pub max_skip_levels: u32,

    /// Minimum per-term document frequency below which no skip data is
    /// written for the term.
    pub skip_minimum: u32,

    /// Maximum length of a single binary doc value, in bytes.
    pub max_binary_value_len: u32,

    /// Distinct-value count past which binary dictionary deduplication is
    /// abandoned for a field.
    pub max_distinct_for_dedup: usize,
}

impl Default for CodecConfig {
    fn default() -> CodecConfig {
        CodecConfig {
            skip_interval: 16,
            max_skip_levels: 10,
            skip_minimum: 16,
            max_binary_value_len: MAX_ENCODABLE_BINARY_LEN,
            max_distinct_for_dedup: 256,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<()> {
        verify_arg!(skip_interval, self.skip_interval >= 2);
        verify_arg!(max_skip_levels, self.max_skip_levels >= 1);
        verify_arg!(skip_minimum, self.skip_minimum >= 1);
        verify_arg!(
            max_binary_value_len,
            self.max_binary_value_len <= MAX_ENCODABLE_BINARY_LEN
        );
        verify_arg!(max_distinct_for_dedup, self.max_distinct_for_dedup >= 1);
        Ok(())
    }
}
