//! Unit tests for the config module
//!
//! Tests configuration types, defaults, and parsing.
//! No filesystem dependencies - all in-memory.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::time::Duration;

use super::*;
use crate::services::playback::NetworkClass;

#[test]
fn default_matches_documented_values() {
    let config = Config::default();

    assert_eq!(config.playback.max_handles, 15);
    assert_eq!(config.playback.max_concurrent_inits, 3);
    assert_eq!(config.playback.init_timeout, Duration::from_secs(8));
    assert_eq!(config.playback.preload_behind, 1);
    assert_eq!(config.playback.cache_target_sequence, vec![5, 7, 11, 17, 23]);
    assert_eq!(config.playback.disposal_defer, Duration::from_millis(200));
    assert_eq!(config.playback.retry_limit, 3);
}

#[test]
fn constrained_preset_tightens_budgets() {
    let playback = PlaybackConfig::constrained();

    assert_eq!(playback.max_handles, 3);
    assert_eq!(playback.max_concurrent_inits, 1);
    assert_eq!(playback.init_timeout, Duration::from_secs(15));
    assert_eq!(playback.preload_ahead(NetworkClass::Wifi), 5);
}

#[test]
fn preload_ahead_follows_network_class() {
    let playback = PlaybackConfig::default();

    assert_eq!(playback.preload_ahead(NetworkClass::Wifi), 5);
    assert_eq!(playback.preload_ahead(NetworkClass::Cellular), 2);
    assert_eq!(playback.preload_ahead(NetworkClass::Constrained), 1);
    assert_eq!(playback.preload_ahead(NetworkClass::Unknown), 1);
}

#[test]
fn cache_target_entries_are_capped() {
    let playback = PlaybackConfig {
        cache_target_sequence: vec![5, 120],
        ..PlaybackConfig::default()
    };

    assert_eq!(playback.cache_target_at(0), 5);
    assert_eq!(playback.cache_target_at(1), 50);
    // Positions past the end stick to the last entry.
    assert_eq!(playback.cache_target_at(7), 50);
}

#[test]
fn parses_partial_toml_with_defaults() {
    let config = Config::from_toml_str(
        r#"
[playback]
max_handles = 4
init_timeout = 12000
"#,
    )
    .unwrap();

    assert_eq!(config.playback.max_handles, 4);
    assert_eq!(config.playback.init_timeout, Duration::from_secs(12));
    assert_eq!(config.playback.max_concurrent_inits, 3);
}

#[test]
fn zero_disposal_defer_is_coerced() {
    let config = Config::from_toml_str(
        r#"
[playback]
disposal_defer = 0
"#,
    )
    .unwrap();

    assert_eq!(config.playback.disposal_defer, Duration::from_millis(200));
}

#[test]
fn rejects_malformed_toml() {
    let result = Config::from_toml_str("[playback\nmax_handles = 4");

    assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
}
