//! Live audio visualization feature for osav.
//!
//! Covers the whole pipeline from the capture callback to the terminal:
//! channel extraction, spectral transform, column mapping, peak metering,
//! peak-hold decay, and the stream lifecycle around it.

pub mod meter;
pub mod peak_hold;
pub mod spectrum;
pub mod stream;
pub mod transform;
pub mod ui;

pub use stream::{AudioVisualizer, DisplayFrame, VisualizerParams};
pub use ui::{VisualizerCommand, VisualizerTui};
