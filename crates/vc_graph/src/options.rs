use serde::{Deserialize, Serialize};

use crate::wire::Endian;

/// Objects nested deeper than this are written as deferred placeholders and
/// drained from the root.
pub const DEFAULT_DEFERRAL_THRESHOLD: usize = 50;

/// Payload nesting the reader accepts before it rejects the stream.
pub const DEFAULT_MAX_DEPTH: usize = 256;

// -----------------------------------------------------------------------------
// CodecOptions

/// Tunables of a [`Codec`](crate::Codec).
///
/// Missing fields deserialize to their defaults, so a configuration file only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Writer nesting depth at which reference objects are deferred.
    pub deferral_threshold: usize,
    /// Maximum payload nesting accepted by the reader.
    pub max_depth: usize,
    /// Byte order of fixed-width primitives in written streams.
    pub endian: Endian,
    /// Recorded in the header flags. Informational only.
    pub crlf: bool,
    /// Emit a checkpoint every `n` values. `None` or `Some(0)` disables them.
    pub sentinel_period: Option<u32>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            deferral_threshold: DEFAULT_DEFERRAL_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
            endian: Endian::Little,
            crlf: cfg!(windows),
            sentinel_period: None,
        }
    }
}

impl CodecOptions {
    pub(crate) fn sentinel_period(&self) -> Option<u32> {
        self.sentinel_period.filter(|period| *period > 0)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_partial_config() {
        let options: CodecOptions = ron::from_str("(deferral_threshold: 8, sentinel_period: Some(16))").unwrap();

        assert_eq!(options.deferral_threshold, 8);
        assert_eq!(options.sentinel_period(), Some(16));
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(options.endian, Endian::Little);
    }

    #[test]
    fn json_roundtrip() {
        let options = CodecOptions {
            endian: Endian::Big,
            sentinel_period: Some(0),
            ..Default::default()
        };

        let text = serde_json::to_string(&options).unwrap();
        let back: CodecOptions = serde_json::from_str(&text).unwrap();

        assert_eq!(back, options);
        assert_eq!(back.sentinel_period(), None);
    }
}
