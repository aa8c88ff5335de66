//! Audio stream lifecycle and the per-callback analysis pipeline.
//!
//! `AudioVisualizer` owns the cpal input stream and the analysis state behind
//! it. Opening allocates everything the callback will touch (transform
//! buffers, column buffers, peak-hold state); the callback itself only meters,
//! transforms, and maps — it never allocates. Restart tears the stream down
//! before rebuilding, and cpal guarantees no callback is in flight once the
//! stream handle is dropped, so buffers are always freed after the callback
//! has quiesced.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use super::meter::peak_levels;
use super::peak_hold::PeakHold;
use super::spectrum::SpectrumMapper;
use super::transform::{SpectrumGeometry, TransformContext};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Everything needed to open (and reopen) a visualizer stream.
#[derive(Debug, Clone)]
pub struct VisualizerParams {
    /// Device name, numeric index, or "default"
    pub device: String,
    /// Requested sample rate in Hz (device rate wins, see `sample_rate()`)
    pub sample_rate: u32,
    /// Samples per analysis window
    pub period_size: usize,
    /// Which channel feeds the spectrum
    pub channel: usize,
    /// Displayed frequency range in Hz
    pub min_freq: f32,
    pub max_freq: f32,
    /// Power-law warp for the column layout
    pub warp_exponent: f32,
    /// Magnitude divisor before quantization
    pub gain_divisor: f32,
    /// Peak-hold decay per frame, in full-scale units
    pub decay_step: f32,
    /// Spectrum display width in columns
    pub display_width: usize,
    /// Spectrum display height in rows (scales the decay floor)
    pub display_height: usize,
}

/// One coherent snapshot of the display state, cloned under the lock so the
/// renderer never sees a half-updated frame.
#[derive(Debug, Clone, Default)]
pub struct DisplayFrame {
    /// Peak amplitude per input channel, unclamped
    pub channel_volumes: Vec<f32>,
    /// Instantaneous column magnitudes after warp mapping and gain
    pub columns: Vec<f32>,
    /// Decaying per-column maxima in [0, 1]
    pub peak_hold: Vec<f32>,
}

/// Per-callback pipeline state. Single writer: the audio callback.
pub struct AnalysisState {
    transform: TransformContext,
    mapper: SpectrumMapper,
    peak_hold: PeakHold,
    channel_volumes: Vec<f32>,
    columns: Vec<f32>,
    channel: usize,
    channel_count: usize,
}

impl AnalysisState {
    fn new(params: &VisualizerParams, sample_rate: u32, channel_count: usize) -> Result<Self> {
        if params.channel >= channel_count {
            return Err(anyhow!(
                "Configured channel {} not available: device has {} channel(s)",
                params.channel,
                channel_count
            ));
        }

        let transform = TransformContext::new(
            params.period_size,
            sample_rate,
            params.min_freq,
            params.max_freq,
        )?;

        Ok(AnalysisState {
            transform,
            mapper: SpectrumMapper::new(params.warp_exponent, params.gain_divisor),
            peak_hold: PeakHold::new(
                params.display_width,
                params.decay_step,
                params.display_height,
            ),
            channel_volumes: vec![0.0; channel_count],
            columns: vec![0.0; params.display_width],
            channel: params.channel,
            channel_count,
        })
    }

    /// Runs the full pipeline over one interleaved frame: volume metering,
    /// windowed transform, column mapping, peak-hold update, then one decay
    /// step. No allocation.
    pub fn process(&mut self, frame: &[f32]) {
        peak_levels(frame, self.channel_count, &mut self.channel_volumes);

        self.transform
            .load_channel(frame, self.channel, self.channel_count);
        self.transform.execute();

        let width = self.columns.len();
        for column in 0..width {
            let magnitude = self.mapper.column_magnitude(&self.transform, column, width);
            self.columns[column] = magnitude;
            self.peak_hold.update(column, magnitude);
        }

        self.peak_hold.decay();
    }

    pub fn snapshot(&self) -> DisplayFrame {
        DisplayFrame {
            channel_volumes: self.channel_volumes.clone(),
            columns: self.columns.clone(),
            peak_hold: self.peak_hold.values().to_vec(),
        }
    }

    /// Adjusts the display width after a terminal resize.
    fn resize_display(&mut self, width: usize) {
        self.columns.resize(width, 0.0);
        self.peak_hold.resize(width);
    }

    fn geometry(&self) -> SpectrumGeometry {
        self.transform.geometry()
    }
}

/// Owns the input stream and analysis state for one visualizer session.
///
/// Lifecycle: `open` allocates and binds the callback, `start` begins
/// delivery, `stop` closes the stream before anything it uses is freed, and
/// `restart` chains them with identical parameters.
pub struct AudioVisualizer {
    params: VisualizerParams,
    state: Arc<Mutex<AnalysisState>>,
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    channel_count: usize,
}

impl AudioVisualizer {
    /// Opens the configured device and binds the analysis callback.
    ///
    /// The stream is created but not yet delivering; call [`start`].
    ///
    /// # Errors
    /// - If the device cannot be found or queried
    /// - If the device does not supply f32 samples
    /// - If the configured channel or frequency range is invalid
    /// - If stream creation fails
    pub fn open(params: VisualizerParams) -> Result<Self> {
        let (stream, state, sample_rate, channel_count) = build_stream(&params)?;
        Ok(AudioVisualizer {
            params,
            state,
            stream: Some(stream),
            sample_rate,
            channel_count,
        })
    }

    /// Begins periodic callback delivery. Only valid on an open stream.
    pub fn start(&self) -> Result<()> {
        match &self.stream {
            Some(stream) => {
                stream.play()?;
                tracing::debug!("Audio stream started");
                Ok(())
            }
            None => Err(anyhow!("Cannot start: stream is not open")),
        }
    }

    /// Closes the stream. Dropping the cpal handle quiesces the callback
    /// before returning, so the analysis buffers outlive every callback.
    pub fn stop(&mut self) {
        self.stream = None;
        tracing::debug!("Audio stream stopped");
    }

    /// Tears the stream down and reopens it with identical parameters.
    ///
    /// Derived geometry is unchanged across a restart; the peak-hold state
    /// starts over from silence.
    ///
    /// # Errors
    /// Same conditions as [`open`]; a restart failure is fatal to the session.
    pub fn restart(&mut self) -> Result<()> {
        tracing::info!("Restarting audio stream");
        self.stream = None;
        let (stream, state, sample_rate, channel_count) = build_stream(&self.params)?;
        self.state = state;
        self.stream = Some(stream);
        self.sample_rate = sample_rate;
        self.channel_count = channel_count;
        self.start()
    }

    /// Clones a coherent display frame for the renderer.
    pub fn snapshot(&self) -> DisplayFrame {
        self.state.lock().unwrap().snapshot()
    }

    /// Propagates a terminal width change into the analysis state.
    pub fn resize_display(&self, width: usize) {
        self.state.lock().unwrap().resize_display(width);
    }

    /// Actual device sample rate (may differ from the requested rate).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn geometry(&self) -> SpectrumGeometry {
        self.state.lock().unwrap().geometry()
    }
}

/// Resolves the device, validates the configuration once, allocates the
/// analysis state, and builds the input stream bound to it.
fn build_stream(
    params: &VisualizerParams,
) -> Result<(cpal::Stream, Arc<Mutex<AnalysisState>>, u32, usize)> {
    // Get device while suppressing ALSA library warnings
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();

        if params.device == "default" {
            host.default_input_device()
                .ok_or_else(|| anyhow!("No audio input device available"))
        } else {
            find_device_by_name(&host, &params.device)
        }
    })?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Input device: {}", device_name);

    let device_config = device.default_input_config()?;
    let sample_rate = device_config.sample_rate().0;
    let channel_count = device_config.channels() as usize;

    if device_config.sample_format() != cpal::SampleFormat::F32 {
        return Err(anyhow!(
            "Device '{}' does not supply f32 samples (format: {:?})",
            device_name,
            device_config.sample_format()
        ));
    }

    if sample_rate != params.sample_rate {
        tracing::warn!(
            "Requested sample rate {}Hz but device uses {}Hz. Analyzing at device rate.",
            params.sample_rate,
            sample_rate
        );
    }

    tracing::debug!(
        "Device configuration: {}Hz, {} channels, period {} samples",
        sample_rate,
        channel_count,
        params.period_size
    );

    // All validation and allocation happens here, once; the callback only
    // runs the fixed-size pipeline
    let state = Arc::new(Mutex::new(AnalysisState::new(
        params,
        sample_rate,
        channel_count,
    )?));

    let stream_config = cpal::StreamConfig {
        channels: channel_count as u16,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(params.period_size as u32),
    };

    let state_arc = Arc::clone(&state);
    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            state_arc.lock().unwrap().process(data);
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok((stream, state, sample_rate, channel_count))
}

/// Finds an audio input device by name or numeric index.
///
/// # Arguments
/// * `host` - The cpal audio host
/// * `device_spec` - Either "default" for system default, a device name, or a numeric index (0, 1, 2, etc.)
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return Ok(devices.into_iter().nth(index).unwrap());
        } else {
            return Err(anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                devices.len().saturating_sub(1)
            ));
        }
    }

    // Try to find by name
    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'osav list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    // Open /dev/null for writing
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    // Save the current stderr file descriptor
    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    // Redirect stderr to /dev/null
    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    // Execute the closure
    let result = f();

    // Restore the original stderr
    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> VisualizerParams {
        VisualizerParams {
            device: "default".to_string(),
            sample_rate: 44100,
            period_size: 512,
            channel: 0,
            min_freq: 20.0,
            max_freq: 20000.0,
            warp_exponent: 2.0,
            gain_divisor: 1.0,
            decay_step: 0.01,
            display_width: 60,
            display_height: 20,
        }
    }

    fn sine_frame(period: usize, channels: usize, freq: f32, rate: f32, amp: f32) -> Vec<f32> {
        let mut frame = vec![0.0f32; period * channels];
        for i in 0..period {
            let sample = amp * (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin();
            for c in 0..channels {
                frame[i * channels + c] = sample;
            }
        }
        frame
    }

    #[test]
    fn test_analysis_state_rejects_missing_channel() {
        let mut params = test_params();
        params.channel = 2;
        assert!(AnalysisState::new(&params, 44100, 2).is_err());
        params.channel = 1;
        assert!(AnalysisState::new(&params, 44100, 2).is_ok());
    }

    #[test]
    fn test_process_produces_coherent_snapshot() {
        let params = test_params();
        let mut state = AnalysisState::new(&params, 44100, 2).unwrap();

        let frame = sine_frame(512, 2, 440.0, 44100.0, 0.5);
        state.process(&frame);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.channel_volumes.len(), 2);
        assert_eq!(snapshot.columns.len(), 60);
        assert_eq!(snapshot.peak_hold.len(), 60);

        // A 0.5 sine peaks near 0.5 on both channels
        assert!(snapshot.channel_volumes[0] > 0.45);
        assert!(snapshot.channel_volumes[1] > 0.45);
        // Some column picked up the tone
        assert!(snapshot.columns.iter().any(|&m| m > 0.1));
    }

    #[test]
    fn test_silence_produces_zero_frame() {
        let params = test_params();
        let mut state = AnalysisState::new(&params, 44100, 2).unwrap();

        state.process(&vec![0.0f32; 1024]);

        let snapshot = state.snapshot();
        assert!(snapshot.channel_volumes.iter().all(|&v| v == 0.0));
        assert!(snapshot.columns.iter().all(|&m| m < 1e-6));
    }

    #[test]
    fn test_peak_hold_decays_across_silent_frames() {
        let params = test_params();
        let mut state = AnalysisState::new(&params, 44100, 1).unwrap();

        let frame = sine_frame(512, 1, 440.0, 44100.0, 0.8);
        state.process(&frame);
        let held = state.snapshot().peak_hold;
        let peak_column = (0..held.len())
            .max_by(|&a, &b| held[a].partial_cmp(&held[b]).unwrap())
            .unwrap();
        let before = held[peak_column];
        assert!(before > 0.1);

        let silence = vec![0.0f32; 512];
        for _ in 0..10 {
            state.process(&silence);
        }
        let after = state.snapshot().peak_hold[peak_column];
        assert!(after < before);
        assert!((before - after - 10.0 * params.decay_step).abs() < 1e-4);
    }

    #[test]
    fn test_resize_display_adjusts_columns_and_hold() {
        let params = test_params();
        let mut state = AnalysisState::new(&params, 44100, 1).unwrap();
        state.resize_display(80);

        state.process(&sine_frame(512, 1, 1000.0, 44100.0, 0.5));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.columns.len(), 80);
        assert_eq!(snapshot.peak_hold.len(), 80);
    }
}
