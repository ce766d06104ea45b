//! Reelfeed - playback core for short-form vertical-video feeds.
//!
//! This crate decides which videos of a feed are preloaded, which decoder
//! handles are held in memory, which item is currently playing, and which
//! handles are evicted. The host application supplies the platform decoder
//! through the [`services::playback::PlayerFactory`] seam and binds its UI
//! to the ready queue and the state-change event stream.

/// Configuration schema, defaults and TOML loading.
pub mod config;

/// Service implementations.
pub mod services;

/// Structured logging setup.
pub mod tracing_config;

pub use services::playback::{
    PlaybackError, PlaybackService, PlayerFactory, PlayerHandle, VideoDescriptor, VideoId,
};
