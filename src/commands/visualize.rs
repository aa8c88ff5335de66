//! Live visualization session.
//!
//! Runs the stream lifecycle state machine: open the device, start the
//! callback, render snapshots until the user quits, and restart in place on
//! the 'r' key or SIGUSR1. Restart is an explicit loop iteration, never
//! recursion, so repeated restarts cannot grow the stack.

use crate::config;
use crate::ui::ErrorScreen;
use crate::visualizer::{AudioVisualizer, VisualizerCommand, VisualizerParams, VisualizerTui};

/// Reference height for peak-hold decay scaling, in grid rows.
const SPECTRUM_ROWS: usize = 20;

/// Handles the live visualization session.
///
/// # Arguments
/// * `device_override` - Device from the command line, taking precedence over
///   the configured device
///
/// # Errors
/// - If configuration is invalid
/// - If the stream cannot be opened, started, or restarted (all fatal)
pub fn handle_visualize(device_override: Option<String>) -> Result<(), anyhow::Error> {
    tracing::info!("=== osav visualizer started ===");

    let config_data = match config::OsavConfig::load_or_init() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let error_message = format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/osav/osav.toml file and try again."
            );
            show_fatal(&error_message)?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let device = device_override.unwrap_or_else(|| config_data.audio.device.clone());

    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, period={}, range={}-{}Hz, warp={}, gain={}",
        device,
        config_data.audio.sample_rate,
        config_data.audio.period_size,
        config_data.audio.min_freq,
        config_data.audio.max_freq,
        config_data.display.warp_exponent,
        config_data.display.gain_divisor
    );

    let mut tui = VisualizerTui::new()
        .map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    let params = VisualizerParams {
        device,
        sample_rate: config_data.audio.sample_rate,
        period_size: config_data.audio.period_size,
        channel: config_data.audio.channel,
        min_freq: config_data.audio.min_freq,
        max_freq: config_data.audio.max_freq,
        warp_exponent: config_data.display.warp_exponent,
        gain_divisor: config_data.display.gain_divisor,
        decay_step: config_data.display.decay_step,
        display_width: tui.width(),
        display_height: SPECTRUM_ROWS,
    };

    let mut visualizer = match AudioVisualizer::open(params).and_then(|v| {
        v.start()?;
        Ok(v)
    }) {
        Ok(visualizer) => visualizer,
        Err(e) => {
            tracing::error!("Failed to open audio stream: {}", e);
            let _ = tui.cleanup();
            let error_message = format!(
                "Stream Error:\n\n{e}\n\nPlease check your audio configuration and try again."
            );
            show_fatal(&error_message)?;
            return Err(e);
        }
    };

    let geometry = visualizer.geometry();
    tracing::info!(
        "Stream running: {}Hz, {} channels, bins {}..{}",
        visualizer.sample_rate(),
        visualizer.channel_count(),
        geometry.start_index,
        geometry.start_index + geometry.spectro_size
    );

    // SIGUSR1 requests a restart from outside the terminal
    let restart_requested = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, restart_requested.clone())
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    loop {
        let external_restart =
            restart_requested.swap(false, std::sync::atomic::Ordering::Relaxed);

        let command = match tui.handle_input() {
            Ok(command) => command,
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                let _ = tui.cleanup();
                return Err(anyhow::anyhow!("Input handling error: {e}"));
            }
        };

        match command {
            VisualizerCommand::Quit => break,
            VisualizerCommand::Restart => {
                if let Err(e) = restart_session(&mut visualizer, &mut tui) {
                    return Err(e);
                }
            }
            VisualizerCommand::Continue => {
                if external_restart {
                    tracing::info!("Received SIGUSR1: restarting stream via external trigger");
                    if let Err(e) = restart_session(&mut visualizer, &mut tui) {
                        return Err(e);
                    }
                }

                if let Ok(Some(width)) = tui.poll_resize() {
                    tracing::debug!("Terminal resized to {} columns", width);
                    visualizer.resize_display(width);
                }

                let frame = visualizer.snapshot();
                let sample_rate = visualizer.sample_rate();
                tui.render(&frame, sample_rate)
                    .map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;
            }
        }
    }

    tui.cleanup()
        .map_err(|e| anyhow::anyhow!("Failed to clean up terminal: {e}"))?;
    visualizer.stop();
    tracing::info!("Visualizer session ended");

    Ok(())
}

/// Restarts the stream, converting a failure into a fatal, reported error
/// with the terminal restored first.
fn restart_session(
    visualizer: &mut AudioVisualizer,
    tui: &mut VisualizerTui,
) -> Result<(), anyhow::Error> {
    if let Err(e) = visualizer.restart() {
        tracing::error!("Stream restart failed: {}", e);
        let _ = tui.cleanup();
        let error_message =
            format!("Restart Error:\n\n{e}\n\nThe audio stream could not be reopened.");
        show_fatal(&error_message)?;
        return Err(e);
    }
    Ok(())
}

/// Shows a fatal error on the full-screen error display.
fn show_fatal(message: &str) -> Result<(), anyhow::Error> {
    let mut error_screen = ErrorScreen::new()?;
    error_screen.show_error(message)?;
    error_screen.cleanup()?;
    Ok(())
}
