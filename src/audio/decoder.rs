//! Decode wrapper for the long-press audio path
//!
//! Owns one lazily initialized mSBC context. The context is created on the
//! first frame and never reopened: a failed decode drops that frame and
//! nothing else, so isolated corruption self-heals at the cost of one audio
//! chunk.

use crate::audio::msbc::MsbcDecoder;
use crate::error::CodecError;

pub use crate::audio::msbc::{FRAME_LEN, SAMPLES_PER_FRAME};

/// Lazily initialized frame decoder for one logical audio path
#[derive(Default)]
pub struct FrameDecoder {
    context: Option<MsbcDecoder>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one compressed frame into PCM16 samples.
    ///
    /// The caller decides what to do with a failed frame; this keeps the
    /// codec context either way.
    pub fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>, CodecError> {
        let context = self.context.get_or_insert_with(|| {
            tracing::debug!("Initializing mSBC decoder");
            MsbcDecoder::new()
        });
        context.decode(frame)
    }

    /// Whether the codec context has been created yet
    pub fn initialized(&self) -> bool {
        self.context.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_initialization() {
        let decoder = FrameDecoder::new();
        assert!(!decoder.initialized());
    }

    #[test]
    fn test_failed_decode_keeps_context() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&[0u8; 57]).is_err());
        assert!(decoder.initialized(), "bad frame must not reset the context");
    }
}
