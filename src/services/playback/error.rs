use thiserror::Error;

use super::types::{Lifecycle, VideoId};

/// Errors reported by a decoder handle implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// An operation was called before `initialize()` completed.
    #[error("player handle is not initialized")]
    NotInitialized,

    /// The platform decoder reported a failure.
    #[error("player backend error: {0}")]
    Backend(String),
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The descriptor has no playable URL; never pooled, never retried.
    #[error("video {0} has no playable url")]
    UrlAbsent(VideoId),

    /// The handle reported failure during `initialize()`.
    #[error("initialization failed for {id}: {underlying}")]
    InitializationFailed {
        /// Item whose initialization failed.
        id: VideoId,
        /// Failure reported by the handle.
        underlying: String,
    },

    /// The bounded initialization timer elapsed.
    #[error("initialization timed out for {0}")]
    InitializationTimeout(VideoId),

    /// The handle moved to an error status after becoming ready.
    #[error("player for {id} reported an error: {description}")]
    HandleReportedError {
        /// Item whose handle errored.
        id: VideoId,
        /// Error description from the handle.
        description: String,
    },

    /// Preload superseded by a higher-priority item or a window change.
    #[error("preload of {0} was cancelled")]
    Cancelled(VideoId),

    /// The caller raced ahead of initialization. Recoverable by retry.
    #[error("video {0} is not ready for playback")]
    NotReady(VideoId),

    /// A lifecycle transition outside the legal matrix. A caller bug.
    #[error("illegal lifecycle transition for {id}: {from} -> {to}")]
    IllegalTransition {
        /// Item the transition was attempted on.
        id: VideoId,
        /// State before the attempted transition.
        from: Lifecycle,
        /// Rejected target state.
        to: Lifecycle,
    },

    /// The id was never ingested.
    #[error("unknown video {0}")]
    UnknownVideo(VideoId),

    /// A decoder handle operation failed.
    #[error("player handle operation failed: {0}")]
    Handle(#[from] HandleError),
}
