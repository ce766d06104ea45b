use std::fmt;
use std::time::Duration;

/// Unique identifier for a feed video.
///
/// Feed sources produce stable 32-byte hex ids; the newtype keeps them from
/// being confused with URLs or other strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(String);

impl VideoId {
    /// Create a `VideoId` from its stable hex representation.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the hex representation.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of media a feed item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    /// A short animated image (no decoder handle required).
    AnimatedImage,

    /// A streamed video decoded through a platform handle.
    StreamedVideo,
}

/// Immutable metadata for one feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDescriptor {
    /// Stable unique id.
    pub id: VideoId,

    /// Source URL. Absent means the item is non-playable and is skipped.
    pub url: Option<String>,

    /// Media kind.
    pub kind: VideoKind,

    /// Pixel width, when known.
    pub width: Option<u32>,

    /// Pixel height, when known.
    pub height: Option<u32>,

    /// Total duration, when known.
    pub duration: Option<Duration>,
}

impl VideoDescriptor {
    /// Descriptor for a streamed video.
    pub fn streamed(id: VideoId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
            kind: VideoKind::StreamedVideo,
            width: None,
            height: None,
            duration: None,
        }
    }

    /// Descriptor for an animated image.
    pub fn animated(id: VideoId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
            kind: VideoKind::AnimatedImage,
            width: None,
            height: None,
            duration: None,
        }
    }

    /// Descriptor without a playable URL; such items are skipped.
    pub fn without_url(id: VideoId, kind: VideoKind) -> Self {
        Self {
            id,
            url: None,
            kind,
            width: None,
            height: None,
            duration: None,
        }
    }
}

/// Coarse network link classification used to size the preload window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkClass {
    /// Unmetered, fast link.
    Wifi,

    /// Metered mobile data.
    Cellular,

    /// Severely constrained link.
    Constrained,

    /// Link class not known yet.
    Unknown,
}

/// Lifecycle state of a feed item in the state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not yet considered by the scheduler.
    Unseen,

    /// Scheduled for initialization; capacity and window checks passed.
    Queued,

    /// Handle created, awaiting the ready signal.
    Initializing,

    /// Handle usable; member of the ready queue.
    Ready,

    /// Ready and currently the active item.
    Playing,

    /// Terminal for this attempt; retry allowed after backoff.
    Failed,

    /// Handle disposed; may re-enter `Queued` later.
    Evicted,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Unseen => "unseen",
            Lifecycle::Queued => "queued",
            Lifecycle::Initializing => "initializing",
            Lifecycle::Ready => "ready",
            Lifecycle::Playing => "playing",
            Lifecycle::Failed => "failed",
            Lifecycle::Evicted => "evicted",
        };
        write!(f, "{name}")
    }
}

/// Why a lifecycle transition happened, where one state has several causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// The handle reported failure during `initialize()`.
    InitializationFailed,

    /// The bounded initialization timer elapsed.
    InitializationTimeout,

    /// The handle moved to an error status after becoming ready.
    PlayerError,

    /// Superseded by a higher-priority item.
    Cancelled,

    /// The item left the preload window.
    OutOfWindow,

    /// The pool needed the capacity for another item.
    CapacityPressure,

    /// The host signalled memory pressure.
    MemoryPressure,

    /// The descriptor has no playable URL.
    UrlAbsent,

    /// A failed item re-entered the window and is being retried.
    Retry,

    /// The active item changed.
    FocusChange,
}

/// A lifecycle transition observed on the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Item whose state changed.
    pub id: VideoId,

    /// State before the transition.
    pub old_state: Lifecycle,

    /// State after the transition.
    pub new_state: Lifecycle,

    /// Cause, when one state has several.
    pub reason: Option<ChangeReason>,
}

/// Point-in-time status snapshot of a decoder handle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerStatus {
    /// Whether `initialize()` completed successfully.
    pub initialized: bool,

    /// Whether the handle is currently rendering frames.
    pub playing: bool,

    /// Current playback position.
    pub position: Duration,

    /// Whether the handle is in a terminal error state.
    pub has_error: bool,

    /// Description of the error, when `has_error` is set.
    pub error_description: Option<String>,
}
