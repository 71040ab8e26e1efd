//! Deterministic cleanup of decoded PCM
//!
//! Three fixed stages applied to each decoded block, in order:
//! 1. Single-pole high-pass at ~100 Hz to strip DC drift and hum
//! 2. Energy gate that zeroes near-silent samples
//! 3. In-place centered moving average over ±3 samples (block edges
//!    untouched); already-averaged samples feed the windows that follow
//!
//! Only the high-pass carries state across blocks; feeding two blocks
//! through one filter is not the same as filtering them independently.

use crate::audio::SAMPLE_RATE;

/// High-pass cutoff frequency in Hz
const CUTOFF_HZ: f32 = 100.0;

/// Samples with absolute value below this are zeroed
const ENERGY_THRESHOLD: i16 = 500;

/// Half-width of the centered smoothing window
const SMOOTH_WINDOW: usize = 3;

/// Per-session denoise filter state
#[derive(Debug, Clone, Default)]
pub struct Denoiser {
    x_prev: f32,
    y_prev: f32,
}

impl Denoiser {
    /// Fresh filter state (both taps at zero, as at session start)
    pub fn new() -> Self {
        Self::default()
    }

    /// Clean one block of PCM16 in place. Output length equals input length.
    pub fn process(&mut self, data: &mut [i16]) {
        for sample in data.iter_mut() {
            let hp = self.high_pass(*sample as f32);
            *sample = energy_gate(hp as i16);
        }
        smooth(data);
    }

    fn high_pass(&mut self, x: f32) -> f32 {
        let rc = 1.0 / (2.0 * std::f32::consts::PI * CUTOFF_HZ);
        let dt = 1.0 / SAMPLE_RATE as f32;
        let alpha = rc / (rc + dt);

        let y = alpha * (self.y_prev + x - self.x_prev);
        self.x_prev = x;
        self.y_prev = y;
        y
    }
}

fn energy_gate(sample: i16) -> i16 {
    if (sample as i32).abs() < ENERGY_THRESHOLD as i32 {
        0
    } else {
        sample
    }
}

/// Centered moving average, in place: the window at sample i reads the
/// already-averaged values at i-3..i-1, so smoothing cascades through the
/// block. The first and last SMOOTH_WINDOW samples are left as-is: no wrap,
/// no reflection.
fn smooth(data: &mut [i16]) {
    if data.len() < 2 * SMOOTH_WINDOW + 1 {
        return;
    }

    for i in SMOOTH_WINDOW..data.len() - SMOOTH_WINDOW {
        let sum: i32 = data[i - SMOOTH_WINDOW..=i + SMOOTH_WINDOW]
            .iter()
            .map(|&s| s as i32)
            .sum();
        data[i] = (sum / (2 * SMOOTH_WINDOW as i32 + 1)) as i16;
    }
}
