//! Configuration file management for osav.
//!
//! This module handles loading and saving application configuration from TOML
//! files. Configuration is stored in the user's config directory and created
//! with defaults on first run.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Audio capture and analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `osav list-devices`
    /// - device name from `osav list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Requested sample rate in Hz (device rate wins if it differs)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Samples per analysis window; larger gives finer frequency resolution
    /// at the cost of slower display response
    #[serde(default = "default_period_size")]
    pub period_size: usize,
    /// Which input channel feeds the spectrum (0 = first/left)
    #[serde(default)]
    pub channel: usize,
    /// Lower edge of the displayed frequency range in Hz
    #[serde(default = "default_min_freq")]
    pub min_freq: f32,
    /// Upper edge of the displayed frequency range in Hz (must stay below
    /// half the sample rate)
    #[serde(default = "default_max_freq")]
    pub max_freq: f32,
}

/// Spectrum display tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Power-law warp exponent (>= 1). Higher values give low frequencies
    /// more screen columns
    #[serde(default = "default_warp_exponent")]
    pub warp_exponent: f32,
    /// Divisor applied to magnitudes before quantization (display gain)
    #[serde(default = "default_gain_divisor")]
    pub gain_divisor: f32,
    /// Peak-hold decay per frame, in full-scale units
    #[serde(default = "default_decay_step")]
    pub decay_step: f32,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_period_size() -> usize {
    1024
}

fn default_min_freq() -> f32 {
    20.0
}

fn default_max_freq() -> f32 {
    20000.0
}

fn default_warp_exponent() -> f32 {
    2.0
}

fn default_gain_divisor() -> f32 {
    1.0
}

fn default_decay_step() -> f32 {
    0.01
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            device: default_device(),
            sample_rate: default_sample_rate(),
            period_size: default_period_size(),
            channel: 0,
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            warp_exponent: default_warp_exponent(),
            gain_divisor: default_gain_divisor(),
            decay_step: default_decay_step(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsavConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl OsavConfig {
    /// Loads configuration from the user's config directory, writing a
    /// default file on first run.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load_or_init() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            let config = OsavConfig::default();
            config.save()?;
            tracing::info!("Created default config at {}", config_path.display());
            return Ok(config);
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: OsavConfig = toml::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {e}", config_path.display()))?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file.
///
/// # Errors
/// - If the config directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .join(".config")
        .join("osav");

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config directory: {e}"))?;

    Ok(config_dir.join("osav.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_audible_range() {
        let config = OsavConfig::default();
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.audio.period_size, 1024);
        assert!(config.audio.min_freq < config.audio.max_freq);
        assert!(config.audio.max_freq <= config.audio.sample_rate as f32 / 2.0);
        assert!(config.display.warp_exponent >= 1.0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: OsavConfig = toml::from_str(
            r#"
            [audio]
            device = "2"
            period_size = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.device, "2");
        assert_eq!(config.audio.period_size, 512);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.display.gain_divisor, 1.0);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = OsavConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: OsavConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.audio.period_size, config.audio.period_size);
        assert_eq!(parsed.display.decay_step, config.display.decay_step);
    }
}
