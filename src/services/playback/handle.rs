use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::HandleError;
use super::types::{PlayerStatus, VideoDescriptor};

/// Capability contract over a platform video decoder.
///
/// Each live handle represents an OS/GPU decoder instance bound to one URL.
/// The handle pool is the exclusive owner of every handle it creates; other
/// components see non-owning references and must never call [`dispose`].
///
/// [`dispose`]: PlayerHandle::dispose
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// Establish decode and network resources.
    ///
    /// The pool awaits this under a bounded timeout. After success,
    /// `status().initialized` is true and dimensions are non-zero. After
    /// failure or timeout, the handle must still accept `dispose()`.
    ///
    /// # Errors
    /// Returns error if the decoder cannot be brought up for the URL
    async fn initialize(&self) -> Result<(), HandleError>;

    /// Start rendering frames. Idempotent after initialization.
    ///
    /// # Errors
    /// Returns `NotInitialized` if called before `initialize()` completed
    async fn play(&self) -> Result<(), HandleError>;

    /// Stop rendering frames. Idempotent after initialization.
    ///
    /// # Errors
    /// Returns `NotInitialized` if called before `initialize()` completed
    async fn pause(&self) -> Result<(), HandleError>;

    /// Configure whether playback restarts from zero at the end.
    ///
    /// # Errors
    /// Returns error if the decoder rejects the change
    async fn set_looping(&self, looping: bool) -> Result<(), HandleError>;

    /// Set the playback volume in `0.0..=1.0`.
    ///
    /// # Errors
    /// Returns error if the decoder rejects the change
    async fn set_volume(&self, volume: f64) -> Result<(), HandleError>;

    /// Seek to a position.
    ///
    /// # Errors
    /// Returns error if the decoder rejects the seek
    async fn seek(&self, position: Duration) -> Result<(), HandleError>;

    /// Release all decoder resources.
    ///
    /// Safe to call twice, and safe while `initialize()` is still in
    /// flight; implementations cancel the in-flight work.
    async fn dispose(&self);

    /// Cheap synchronous status snapshot.
    fn status(&self) -> PlayerStatus;
}

/// Creates decoder handles for descriptors.
///
/// The host injects its platform implementation at service construction;
/// tests inject fakes.
pub trait PlayerFactory: Send + Sync {
    /// Construct an uninitialized handle for the descriptor's URL.
    fn create(&self, descriptor: &VideoDescriptor) -> Arc<dyn PlayerHandle>;
}
