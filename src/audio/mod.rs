//! Audio pipeline: mSBC decode and deterministic denoise
//!
//! Compressed frames arrive embedded in HID input reports while a long
//! press is recording. Decode produces little-endian PCM16 at 16 kHz; the
//! denoise filter then strips hum, gates silence, and smooths the block
//! before it is broadcast.

pub mod decoder;
pub mod denoise;
pub mod msbc;

pub use decoder::FrameDecoder;
pub use denoise::Denoiser;

/// Fixed pipeline sample rate in Hz
pub const SAMPLE_RATE: u32 = 16_000;

/// Convert decoded samples to the little-endian byte layout sent on the wire
pub fn pcm_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_bytes_little_endian() {
        assert_eq!(pcm_to_bytes(&[0x1234, 0x5678]), vec![0x34, 0x12, 0x78, 0x56]);
    }
}
