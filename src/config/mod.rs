//! Configuration management for osav.
//!
//! This module handles loading and saving application configuration from TOML
//! files. Configuration is stored in the user's config directory.

pub mod file;

pub use file::{AudioConfig, DisplayConfig, OsavConfig};
