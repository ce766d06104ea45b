/// Playback coordination: focus, pause, completion, error handling
pub(crate) mod coordinator;

/// Handle status watching
pub(crate) mod monitoring;

/// Bounded handle pool and eviction
pub(crate) mod pool;

/// Network-aware preload scheduling
pub(crate) mod scheduler;
