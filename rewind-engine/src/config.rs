//! Engine configuration
//!
//! Decode policy and every event-rule threshold live here rather than as
//! constants in the rules: debounce windows and confidence floors are domain
//! tuning, not format facts. Serialized to/from TOML; a missing file or
//! missing section falls back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rewind_format::DecodeOptions;

/// Engine configuration
///
/// Contains decode policy and event-derivation thresholds organized into
/// sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Decode policy (CRC strictness, metadata tolerance)
    #[serde(default)]
    pub decode: DecodeOptions,
    /// Event-derivation thresholds
    #[serde(default)]
    pub events: EventConfig,
}

/// Event-derivation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Consecutive ticks a demolition flag must hold before the event is
    /// confirmed (default: 2)
    #[serde(default = "default_demolition_debounce")]
    pub demolition_debounce_ticks: u32,
    /// Minimum boost gain between consecutive ticks treated as a pad pickup
    /// (default: 10)
    #[serde(default = "default_boost_pickup_min_gain")]
    pub boost_pickup_min_gain: i32,
    /// Absolute y beyond which the ball is inside a goal mouth
    /// (default: 5000.0)
    #[serde(default = "default_goal_mouth_depth")]
    pub goal_mouth_depth: f32,
    /// Trailing window (ticks) consulted by the save rule (default: 30)
    #[serde(default = "default_save_window")]
    pub save_window_ticks: u32,
    /// Confidence assigned to unambiguous events (default: 1.0)
    #[serde(default = "default_full_confidence")]
    pub full_confidence: f32,
    /// Confidence assigned to ambiguous or low-signal events (default: 0.4)
    #[serde(default = "default_low_confidence")]
    pub low_confidence: f32,
    /// Multiplier applied to events derived from partially decoded frames
    /// (default: 0.5)
    #[serde(default = "default_partial_frame_penalty")]
    pub partial_frame_penalty: f32,
}

fn default_demolition_debounce() -> u32 {
    2
}
fn default_boost_pickup_min_gain() -> i32 {
    10
}
fn default_goal_mouth_depth() -> f32 {
    5000.0
}
fn default_save_window() -> u32 {
    30
}
fn default_full_confidence() -> f32 {
    1.0
}
fn default_low_confidence() -> f32 {
    0.4
}
fn default_partial_frame_penalty() -> f32 {
    0.5
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            demolition_debounce_ticks: default_demolition_debounce(),
            boost_pickup_min_gain: default_boost_pickup_min_gain(),
            goal_mouth_depth: default_goal_mouth_depth(),
            save_window_ticks: default_save_window(),
            full_confidence: default_full_confidence(),
            low_confidence: default_low_confidence(),
            partial_frame_penalty: default_partial_frame_penalty(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a configuration file, falling back to defaults if the file does
    /// not exist or cannot be parsed
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Save the configuration to disk
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).unwrap();
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert!(config.decode.strict_crc);
        assert!(!config.decode.tolerate_unknown_metadata);
        assert_eq!(config.events.demolition_debounce_ticks, 2);
        assert_eq!(config.events.boost_pickup_min_gain, 10);
        assert!((config.events.full_confidence - 1.0).abs() < f32::EPSILON);
    }

    // =============================================================
    // TOML serialization tests
    // =============================================================

    #[test]
    fn test_config_serialize_roundtrip() {
        let mut config = EngineConfig::default();
        config.decode.strict_crc = false;
        config.events.demolition_debounce_ticks = 5;
        config.events.goal_mouth_depth = 4800.0;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_deserialize_empty() {
        // Empty TOML should produce defaults
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial_section() {
        // Only set one field, rest should default
        let toml_str = r#"
[events]
save_window_ticks = 60
"#;
        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.events.save_window_ticks, 60);
        assert_eq!(config.events.demolition_debounce_ticks, 2); // default
        assert!(config.decode.strict_crc); // default
    }

    #[test]
    fn test_config_deserialize_decode_section() {
        let toml_str = r#"
[decode]
strict_crc = false
tolerate_unknown_metadata = true
"#;
        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        assert!(!config.decode.strict_crc);
        assert!(config.decode.tolerate_unknown_metadata);
    }

    // =============================================================
    // Load/save tests
    // =============================================================

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("nope.toml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewind.toml");
        let mut config = EngineConfig::default();
        config.events.boost_pickup_min_gain = 25;
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path), config);
    }
}
