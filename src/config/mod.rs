//! Configuration schema definitions and loading.
//!
//! Defines the complete configuration structure for reelfeed, centered on
//! the playback section (pool capacity, preload windows, timeouts, eviction
//! weights). All configurations are serializable to/from TOML format.

mod error;
mod loading;
mod playback;

#[cfg(test)]
mod tests;

pub use error::ConfigError;
pub use playback::{PlaybackConfig, PreloadAheadByNetwork};

use serde::{Deserialize, Serialize};

/// Main configuration structure for reelfeed.
///
/// Represents the complete configuration schema that can be loaded
/// from TOML files. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Playback core configuration.
    pub playback: PlaybackConfig,
}
