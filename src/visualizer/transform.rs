//! Spectral transform context and derived geometry.
//!
//! Owns the fixed-size FFT buffers and the plan bound to them. All sizes are
//! decided at creation time; changing the period size means building a new
//! context (the restart path does exactly that).

use anyhow::{anyhow, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Usable slice of the transform output for the configured frequency range.
///
/// `start_index` is the first bin at or above `min_freq`; `spectro_size` is
/// the number of bins up to `max_freq`, capped at the Nyquist bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumGeometry {
    pub start_index: usize,
    pub spectro_size: usize,
}

impl SpectrumGeometry {
    /// Derives the usable bin range from the stream parameters.
    ///
    /// Bin `k` corresponds to frequency `k * sample_rate / period_size`.
    /// The start bin rounds up and the end bin rounds down so the displayed
    /// range never extends past `[min_freq, max_freq]`.
    ///
    /// # Errors
    /// - If `min_freq >= max_freq`
    /// - If `max_freq` is at or above the Nyquist frequency
    /// - If the range is too narrow to cover a single bin at this period size
    pub fn new(period_size: usize, sample_rate: u32, min_freq: f32, max_freq: f32) -> Result<Self> {
        if period_size == 0 {
            return Err(anyhow!("Period size must be nonzero"));
        }
        if min_freq < 0.0 || min_freq >= max_freq {
            return Err(anyhow!(
                "Invalid frequency range: min {min_freq}Hz must be below max {max_freq}Hz"
            ));
        }
        let nyquist = sample_rate as f32 / 2.0;
        if max_freq > nyquist {
            return Err(anyhow!(
                "Max frequency {max_freq}Hz exceeds Nyquist limit {nyquist}Hz"
            ));
        }

        let sample_ratio = period_size as f64 / sample_rate as f64;
        let start_index = (sample_ratio * min_freq as f64).ceil() as usize;
        let end_index = ((sample_ratio * max_freq as f64).floor() as usize).min(period_size / 2);

        if end_index <= start_index {
            return Err(anyhow!(
                "Frequency range {min_freq}-{max_freq}Hz spans no bins at period size {period_size}"
            ));
        }

        Ok(SpectrumGeometry {
            start_index,
            spectro_size: end_index - start_index,
        })
    }
}

/// Fixed-size FFT state for one open stream.
///
/// The plan, input buffer, scratch buffer, and window function are all sized
/// for one period at creation; `load_channel` and `execute` never allocate.
pub struct TransformContext {
    fft: Arc<dyn Fft<f32>>,
    input: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    period_size: usize,
    geometry: SpectrumGeometry,
}

impl TransformContext {
    /// Creates a transform context bound to the given period size.
    ///
    /// # Errors
    /// - If the geometry parameters are invalid (see [`SpectrumGeometry::new`])
    pub fn new(
        period_size: usize,
        sample_rate: u32,
        min_freq: f32,
        max_freq: f32,
    ) -> Result<Self> {
        let geometry = SpectrumGeometry::new(period_size, sample_rate, min_freq, max_freq)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(period_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        // Hann window, precomputed so the callback only multiplies
        let window: Vec<f32> = (0..period_size)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / period_size as f32).cos())
            })
            .collect();

        Ok(TransformContext {
            fft,
            input: vec![Complex::new(0.0, 0.0); period_size],
            scratch,
            window,
            period_size,
            geometry,
        })
    }

    /// Copies one channel of an interleaved frame into the input buffer.
    ///
    /// Applies the Hann window while copying. Frames shorter than one period
    /// are zero-padded; longer frames are truncated. O(period_size), no
    /// allocation. Channel validity is checked once at stream open, not here.
    pub fn load_channel(&mut self, frame: &[f32], channel: usize, channel_count: usize) {
        let available = if channel_count > 0 {
            frame.len() / channel_count
        } else {
            0
        };

        for i in 0..self.period_size {
            let sample = if i < available {
                frame[i * channel_count + channel]
            } else {
                0.0
            };
            self.input[i] = Complex::new(sample * self.window[i], 0.0);
        }
    }

    /// Executes the bound plan in place over the input buffer.
    pub fn execute(&mut self) {
        self.fft
            .process_with_scratch(&mut self.input, &mut self.scratch);
    }

    /// Magnitude of output bin `k`, normalized so a full-scale sinusoid
    /// reads near 1.0 regardless of period size.
    pub fn magnitude(&self, bin: usize) -> f32 {
        self.input[bin].norm() * 2.0 / self.period_size as f32
    }

    pub fn geometry(&self) -> SpectrumGeometry {
        self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_reference_values() {
        // 512 samples at 44100Hz over 20-20000Hz
        let geo = SpectrumGeometry::new(512, 44100, 20.0, 20000.0).unwrap();
        assert_eq!(geo.start_index, 1);
        assert_eq!(geo.spectro_size, 231);
    }

    #[test]
    fn test_geometry_stays_within_half_spectrum() {
        for &period in &[256usize, 512, 1024, 2048, 4096] {
            for &(min, max) in &[(20.0f32, 20000.0f32), (100.0, 1500.0), (50.0, 8000.0)] {
                let geo = SpectrumGeometry::new(period, 44100, min, max).unwrap();
                assert!(geo.start_index + geo.spectro_size <= period / 2);
                assert!(geo.spectro_size >= 1);
            }
        }
    }

    #[test]
    fn test_geometry_rejects_bad_ranges() {
        assert!(SpectrumGeometry::new(1024, 44100, 20000.0, 20.0).is_err());
        assert!(SpectrumGeometry::new(1024, 44100, 100.0, 100.0).is_err());
        assert!(SpectrumGeometry::new(1024, 44100, 20.0, 30000.0).is_err());
        assert!(SpectrumGeometry::new(0, 44100, 20.0, 20000.0).is_err());
    }

    #[test]
    fn test_recreated_context_has_identical_geometry() {
        // Restart reopens with the same parameters and must derive the same bins
        let a = TransformContext::new(1024, 48000, 20.0, 20000.0).unwrap();
        let b = TransformContext::new(1024, 48000, 20.0, 20000.0).unwrap();
        assert_eq!(a.geometry(), b.geometry());
    }

    #[test]
    fn test_sine_peak_lands_in_expected_bin() {
        let period = 1024;
        let rate = 44100u32;
        let freq = 1000.0f32;
        let mut ctx = TransformContext::new(period, rate, 20.0, 20000.0).unwrap();

        // Mono 1kHz sine at 0.8 amplitude
        let frame: Vec<f32> = (0..period)
            .map(|i| {
                0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin()
            })
            .collect();

        ctx.load_channel(&frame, 0, 1);
        ctx.execute();

        let expected = (freq * period as f32 / rate as f32).round() as usize;
        let peak_bin = (1..period / 2)
            .max_by(|&a, &b| ctx.magnitude(a).partial_cmp(&ctx.magnitude(b)).unwrap())
            .unwrap();

        assert!(
            peak_bin.abs_diff(expected) <= 1,
            "peak at bin {peak_bin}, expected near {expected}"
        );
        // Hann window halves the peak magnitude; 0.8 in should read roughly 0.4
        assert!(ctx.magnitude(peak_bin) > 0.2);
    }

    #[test]
    fn test_load_channel_deinterleaves_and_pads() {
        let mut ctx = TransformContext::new(8, 44100, 1000.0, 20000.0).unwrap();

        // Stereo frame with only 3 frames worth of data: rest must zero-pad
        let frame = [0.5f32, -1.0, 0.5, -1.0, 0.5, -1.0];
        ctx.load_channel(&frame, 1, 2);

        // Window is zero at i=0, so check padding directly
        for i in 3..8 {
            assert_eq!(ctx.input[i].re, 0.0);
        }
        // Right channel picked, not left
        assert!(ctx.input[1].re < 0.0);
    }
}
