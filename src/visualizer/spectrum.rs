//! Frequency-to-column mapping and magnitude quantization.
//!
//! Display columns cover the configured frequency range through a power-law
//! warp: with exponent 2 (the default) the left half of the screen gets the
//! lower quarter of the range, which reads far better for music and speech
//! than a linear layout.

use super::transform::{SpectrumGeometry, TransformContext};

/// Number of glyph steps available for horizontal bar rendering.
pub const BAR_LEVELS: usize = 8;

/// Maps display columns to transform bins and scales magnitudes for display.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumMapper {
    warp_exponent: f32,
    gain_divisor: f32,
}

impl SpectrumMapper {
    pub fn new(warp_exponent: f32, gain_divisor: f32) -> Self {
        SpectrumMapper {
            warp_exponent: warp_exponent.max(1.0),
            gain_divisor: if gain_divisor > 0.0 { gain_divisor } else { 1.0 },
        }
    }

    /// Transform bin backing display column `column` of `width`.
    ///
    /// Monotonically non-decreasing in `column`; always lands inside the
    /// geometry's usable range. Narrow geometries alias several columns to
    /// the same bin, which is expected at short period sizes.
    pub fn column_bin(&self, column: usize, width: usize, geometry: SpectrumGeometry) -> usize {
        if width == 0 {
            return geometry.start_index;
        }
        let t = (column as f32 / width as f32).powf(self.warp_exponent);
        let offset = ((t * geometry.spectro_size as f32).round() as usize)
            .min(geometry.spectro_size - 1);
        geometry.start_index + offset
    }

    /// Display magnitude for one column: the backing bin's magnitude divided
    /// by the configured gain divisor.
    pub fn column_magnitude(
        &self,
        context: &TransformContext,
        column: usize,
        width: usize,
    ) -> f32 {
        let bin = self.column_bin(column, width, context.geometry());
        context.magnitude(bin) / self.gain_divisor
    }
}

/// Quantizes a magnitude into one of `levels + 1` steps (0 = empty).
///
/// Used for the horizontal volume bars, where each cell renders one of
/// [`BAR_LEVELS`] partial-block glyphs.
pub fn glyph_level(magnitude: f32, levels: usize) -> usize {
    let clamped = magnitude.clamp(0.0, 1.0);
    (clamped * levels as f32).round() as usize
}

/// Whether the grid cell at `row` (0 = top) should be filled for this
/// magnitude, on a grid `height` rows tall.
///
/// A column of magnitude 1.0 fills the whole grid; magnitude 0 fills nothing.
pub fn cell_filled(magnitude: f32, row: usize, height: usize) -> bool {
    if height == 0 {
        return false;
    }
    let threshold = (height - row) as f32 / height as f32;
    magnitude >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> SpectrumGeometry {
        SpectrumGeometry::new(1024, 44100, 20.0, 20000.0).unwrap()
    }

    #[test]
    fn test_column_bin_monotonic_for_warp_exponents() {
        let geo = geometry();
        for &exponent in &[1.0f32, 2.0, 4.0] {
            let mapper = SpectrumMapper::new(exponent, 1.0);
            let mut previous = 0;
            for column in 0..80 {
                let bin = mapper.column_bin(column, 80, geo);
                assert!(bin >= previous, "bin regressed at column {column} (p={exponent})");
                previous = bin;
            }
        }
    }

    #[test]
    fn test_column_bin_stays_in_usable_range() {
        let geo = geometry();
        let mapper = SpectrumMapper::new(2.0, 1.0);
        for column in 0..200 {
            let bin = mapper.column_bin(column, 200, geo);
            assert!(bin >= geo.start_index);
            assert!(bin < geo.start_index + geo.spectro_size);
        }
    }

    #[test]
    fn test_narrow_geometry_aliases_columns() {
        // 64-sample period leaves far fewer bins than columns
        let geo = SpectrumGeometry::new(64, 44100, 20.0, 20000.0).unwrap();
        let mapper = SpectrumMapper::new(2.0, 1.0);
        let bins: Vec<usize> = (0..120).map(|c| mapper.column_bin(c, 120, geo)).collect();
        assert!(bins.windows(2).any(|w| w[0] == w[1]));
        assert!(bins.iter().all(|&b| b < geo.start_index + geo.spectro_size));
    }

    #[test]
    fn test_glyph_level_bounds() {
        assert_eq!(glyph_level(0.0, BAR_LEVELS), 0);
        assert_eq!(glyph_level(1.0, BAR_LEVELS), BAR_LEVELS);
        assert_eq!(glyph_level(2.5, BAR_LEVELS), BAR_LEVELS);
        assert_eq!(glyph_level(-0.3, BAR_LEVELS), 0);
        assert!(glyph_level(0.5, BAR_LEVELS) <= BAR_LEVELS);
    }

    #[test]
    fn test_cell_filled_thresholds() {
        // Top row of a 20-row grid needs full scale
        assert!(cell_filled(1.0, 0, 20));
        assert!(!cell_filled(0.99, 0, 20));
        // Bottom row fills at 1/20
        assert!(cell_filled(0.05, 19, 20));
        assert!(!cell_filled(0.04, 19, 20));
        // Silence fills nothing
        for row in 0..20 {
            assert!(!cell_filled(0.0, row, 20));
        }
    }
}
