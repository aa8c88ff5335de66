//! Per-channel peak volume metering.

/// Writes the peak amplitude of each channel into `levels`.
///
/// `frame` is interleaved; `levels.len()` decides how many channels are
/// metered. Values are `max(|sample|)` over the frame, never clamped, so an
/// unnormalized source can legitimately read above 1.0. Pure and O(samples).
pub fn peak_levels(frame: &[f32], channel_count: usize, levels: &mut [f32]) {
    levels.fill(0.0);
    if channel_count == 0 {
        return;
    }

    for samples in frame.chunks_exact(channel_count) {
        for (channel, &sample) in samples.iter().enumerate().take(levels.len()) {
            let amplitude = sample.abs();
            if amplitude > levels[channel] {
                levels[channel] = amplitude;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_meters_zero() {
        let frame = vec![0.0f32; 128];
        let mut levels = [1.0f32; 2];
        peak_levels(&frame, 2, &mut levels);
        assert_eq!(levels, [0.0, 0.0]);
    }

    #[test]
    fn test_single_sample_peak() {
        let mut frame = vec![0.0f32; 128];
        frame[40] = 0.7; // left channel, frame 20
        let mut levels = [0.0f32; 2];
        peak_levels(&frame, 2, &mut levels);
        assert_eq!(levels[0], 0.7);
        assert_eq!(levels[1], 0.0);
    }

    #[test]
    fn test_channels_metered_independently() {
        let frame = [0.2f32, -0.9, 0.5, 0.1, -0.6, 0.3];
        let mut levels = [0.0f32; 2];
        peak_levels(&frame, 2, &mut levels);
        assert_eq!(levels[0], 0.6);
        assert_eq!(levels[1], 0.9);
    }

    #[test]
    fn test_unnormalized_input_not_clamped() {
        let frame = [1.5f32, -2.0];
        let mut levels = [0.0f32; 1];
        peak_levels(&frame, 1, &mut levels);
        assert_eq!(levels[0], 2.0);
    }
}
