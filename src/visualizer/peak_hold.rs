//! Peak-hold decay state for the spectrum display.
//!
//! Holds the recent maximum magnitude per display column and lets it fall by
//! a fixed step each frame, so the display shows a decaying envelope instead
//! of the raw, jittery per-frame values.

/// Per-column decaying maxima in `[0, 1]`.
///
/// Written only by the audio callback; the renderer reads a cloned snapshot.
#[derive(Debug, Clone)]
pub struct PeakHold {
    columns: Vec<f32>,
    decay_step: f32,
    display_height: f32,
}

impl PeakHold {
    pub fn new(width: usize, decay_step: f32, display_height: usize) -> Self {
        PeakHold {
            columns: vec![0.0; width],
            decay_step,
            display_height: display_height as f32,
        }
    }

    /// Raises the column's held value if the new magnitude exceeds it.
    /// Held values are capped at 1.0 (full display height).
    pub fn update(&mut self, column: usize, magnitude: f32) {
        if column < self.columns.len() && magnitude > self.columns[column] {
            self.columns[column] = magnitude.min(1.0);
        }
    }

    /// Applies one frame of decay to every column.
    ///
    /// A column only decays while its value still covers more than one decay
    /// step of display height; below that it stays put, which keeps silent
    /// columns pinned at zero instead of flickering around it.
    pub fn decay(&mut self) {
        for value in &mut self.columns {
            if *value * self.display_height > self.decay_step {
                *value -= self.decay_step;
            }
        }
    }

    /// Resizes to a new display width, keeping existing columns where possible.
    pub fn resize(&mut self, width: usize) {
        self.columns.resize(width, 0.0);
    }

    pub fn values(&self) -> &[f32] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_subtracts_one_step() {
        let mut hold = PeakHold::new(4, 0.01, 20);
        hold.update(2, 0.5);
        hold.decay();
        assert!((hold.values()[2] - 0.49).abs() < 1e-6);
    }

    #[test]
    fn test_decay_never_goes_negative() {
        let mut hold = PeakHold::new(1, 0.01, 20);
        hold.update(0, 0.05);
        for _ in 0..100 {
            hold.decay();
        }
        // 0.0005 * 20 = 0.01 is not > 0.01, so decay stops there
        assert!(hold.values()[0] >= 0.0);
    }

    #[test]
    fn test_update_overrides_decayed_value() {
        let mut hold = PeakHold::new(1, 0.01, 20);
        hold.update(0, 0.5);
        hold.decay();
        hold.decay();
        hold.update(0, 0.8);
        assert_eq!(hold.values()[0], 0.8);
    }

    #[test]
    fn test_update_clamps_at_full_scale() {
        let mut hold = PeakHold::new(1, 0.01, 20);
        hold.update(0, 3.7);
        assert_eq!(hold.values()[0], 1.0);
    }

    #[test]
    fn test_lower_magnitude_does_not_lower_hold() {
        let mut hold = PeakHold::new(1, 0.01, 20);
        hold.update(0, 0.6);
        hold.update(0, 0.2);
        assert_eq!(hold.values()[0], 0.6);
    }

    #[test]
    fn test_resize_keeps_existing_columns() {
        let mut hold = PeakHold::new(2, 0.01, 20);
        hold.update(1, 0.4);
        hold.resize(4);
        assert_eq!(hold.values().len(), 4);
        assert_eq!(hold.values()[1], 0.4);
        assert_eq!(hold.values()[3], 0.0);
    }
}
