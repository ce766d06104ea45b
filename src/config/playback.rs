use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::services::playback::NetworkClass;

/// Upper bound applied to every cache target entry.
const CACHE_TARGET_CEILING: usize = 50;

/// Preload look-ahead counts keyed by network class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadAheadByNetwork {
    /// Items preloaded ahead of focus on wifi.
    pub wifi: usize,
    /// Items preloaded ahead of focus on cellular data.
    pub cellular: usize,
    /// Items preloaded ahead of focus on constrained links.
    pub constrained: usize,
    /// Items preloaded ahead of focus when the link class is unknown.
    pub unknown: usize,
}

impl Default for PreloadAheadByNetwork {
    fn default() -> Self {
        Self {
            wifi: 5,
            cellular: 2,
            constrained: 1,
            unknown: 1,
        }
    }
}

impl PreloadAheadByNetwork {
    /// Look-ahead count for the given network class.
    pub fn for_class(&self, class: NetworkClass) -> usize {
        match class {
            NetworkClass::Wifi => self.wifi,
            NetworkClass::Cellular => self.cellular,
            NetworkClass::Constrained => self.constrained,
            NetworkClass::Unknown => self.unknown,
        }
    }
}

/// Playback core configuration.
///
/// Durations are expressed in milliseconds in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Hard cap on live decoder handles.
    pub max_handles: usize,

    /// Maximum simultaneous handle initializations.
    pub max_concurrent_inits: usize,

    /// Bounded timeout for a single handle initialization.
    #[serde(with = "duration_ms")]
    pub init_timeout: Duration,

    /// Preload look-ahead counts per network class.
    pub preload_ahead_by_network: PreloadAheadByNetwork,

    /// Items preloaded behind the focus index.
    pub preload_behind: usize,

    /// Progressive cache target steps; entries are capped at 50.
    pub cache_target_sequence: Vec<usize>,

    /// Delay between eviction and the actual `dispose()` call.
    /// Must be non-zero; a zero value is coerced back to the default.
    #[serde(with = "duration_ms")]
    pub disposal_defer: Duration,

    /// Weight of distance-from-focus in the eviction score.
    pub eviction_distance_weight: f64,

    /// Weight of age-since-last-use in the eviction score.
    pub eviction_age_weight: f64,

    /// Whether re-focusing an item restarts it from position zero.
    pub seek_on_refocus: bool,

    /// Whether handles are configured to loop their video.
    pub loop_playback: bool,

    /// Volume applied to a handle when it becomes ready.
    pub default_volume: f64,

    /// Whether handles start muted regardless of `default_volume`.
    pub start_muted: bool,

    /// Failed initializations are retried at most this many times.
    pub retry_limit: u32,

    /// Minimum delay before a failed item is scheduled again.
    #[serde(with = "duration_ms")]
    pub retry_backoff: Duration,

    /// Settle delay before auto-advancing after a completed item.
    #[serde(with = "duration_ms")]
    pub completion_advance_delay: Duration,

    /// Interval at which ready handles are polled for error status.
    #[serde(with = "duration_ms")]
    pub status_poll_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_handles: 15,
            max_concurrent_inits: 3,
            init_timeout: Duration::from_secs(8),
            preload_ahead_by_network: PreloadAheadByNetwork::default(),
            preload_behind: 1,
            cache_target_sequence: vec![5, 7, 11, 17, 23],
            disposal_defer: Duration::from_millis(200),
            eviction_distance_weight: 1000.0,
            eviction_age_weight: 1.0,
            seek_on_refocus: true,
            loop_playback: true,
            default_volume: 1.0,
            start_muted: false,
            retry_limit: 3,
            retry_backoff: Duration::from_secs(2),
            completion_advance_delay: Duration::from_millis(100),
            status_poll_interval: Duration::from_millis(250),
        }
    }
}

impl PlaybackConfig {
    /// Preset for constrained build targets (e.g. browsers), where decoder
    /// handles and concurrency are far scarcer and networks slower.
    pub fn constrained() -> Self {
        Self {
            max_handles: 3,
            max_concurrent_inits: 1,
            init_timeout: Duration::from_secs(15),
            ..Self::default()
        }
    }

    /// Look-ahead count for the given network class.
    pub fn preload_ahead(&self, class: NetworkClass) -> usize {
        self.preload_ahead_by_network.for_class(class)
    }

    /// Cache target value at the given sequence position, ceiling applied.
    pub fn cache_target_at(&self, position: usize) -> usize {
        self.cache_target_sequence
            .get(position)
            .copied()
            .unwrap_or_else(|| self.cache_target_sequence.last().copied().unwrap_or(1))
            .min(CACHE_TARGET_CEILING)
    }

    /// Normalizes values the rest of the core relies on: a non-zero
    /// disposal defer and a non-empty cache target sequence.
    pub fn normalized(mut self) -> Self {
        if self.disposal_defer.is_zero() {
            self.disposal_defer = Self::default().disposal_defer;
        }
        if self.cache_target_sequence.is_empty() {
            self.cache_target_sequence = Self::default().cache_target_sequence;
        }
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
