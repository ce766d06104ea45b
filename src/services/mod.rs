/// Shared reactive primitives used by services
pub mod common;
/// Video feed playback service
pub mod playback;

pub use playback::*;
