//! Preset Store
//!
//! Presets are sparse override sets on top of fixed stage defaults. The
//! store resolves a preset name to a complete `PresetConfig`; a name it
//! does not know resolves to the defaults, never to an error.
//!
//! On disk a preset file is a JSON object keyed by preset name:
//!
//! ```json
//! {
//!   "podcast_voice": { "denoise_strength": "high", "target_loudness": -16.0 },
//!   "music_track":   { "denoise_strength": "off" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dsp::CompressorParams;
use crate::error::{MasteringError, Result};

// ============================================================================
// Stage defaults
// ============================================================================

/// Preset used when the caller does not name one
pub const DEFAULT_PRESET_NAME: &str = "master_auto";

pub const DEFAULT_TARGET_LUFS: f32 = -14.0;
pub const DEFAULT_THRESHOLD_DB: f32 = -18.0;
pub const DEFAULT_RATIO: f32 = 3.5;
pub const DEFAULT_ATTACK_MS: f32 = 10.0;
pub const DEFAULT_RELEASE_MS: f32 = 100.0;
pub const DEFAULT_CEILING_DB: f32 = -0.5;

/// How hard the noise reduction stage works
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenoiseStrength {
    /// Skip noise profiling and noise reduction entirely
    Off,
    #[default]
    Auto,
    Medium,
    High,
}

impl DenoiseStrength {
    /// Fraction of the estimated noise removed from gated bins
    pub fn prop_decrease(&self) -> f32 {
        match self {
            DenoiseStrength::Off => 0.0,
            DenoiseStrength::Auto => 0.75,
            DenoiseStrength::Medium => 0.85,
            DenoiseStrength::High => 1.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, DenoiseStrength::Off)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DenoiseStrength::Off => "off",
            DenoiseStrength::Auto => "auto",
            DenoiseStrength::Medium => "medium",
            DenoiseStrength::High => "high",
        }
    }
}

/// Sparse per-preset overrides; any missing field takes the stage default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresetOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise_strength: Option<DenoiseStrength>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_loudness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_db: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceiling_db: Option<f32>,
}

/// Fully resolved parameters consumed by the pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    pub name: String,
    pub denoise_strength: DenoiseStrength,
    /// Integrated loudness target in LUFS
    pub target_loudness: f32,
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    /// Limiter ceiling in dBFS
    pub ceiling_db: f32,
}

impl PresetConfig {
    /// Apply `overrides` on top of the stage defaults
    pub fn from_overrides(name: &str, overrides: &PresetOverrides) -> Self {
        Self {
            name: name.to_string(),
            denoise_strength: overrides.denoise_strength.unwrap_or_default(),
            target_loudness: overrides.target_loudness.unwrap_or(DEFAULT_TARGET_LUFS),
            threshold_db: overrides.threshold_db.unwrap_or(DEFAULT_THRESHOLD_DB),
            ratio: overrides.ratio.unwrap_or(DEFAULT_RATIO),
            attack_ms: overrides.attack_ms.unwrap_or(DEFAULT_ATTACK_MS),
            release_ms: overrides.release_ms.unwrap_or(DEFAULT_RELEASE_MS),
            ceiling_db: overrides.ceiling_db.unwrap_or(DEFAULT_CEILING_DB),
        }
    }

    /// Check that every value can drive its stage
    ///
    /// # Errors
    /// * `InvalidParameter` - a non-finite level, a ratio below 1, or a
    ///   non-positive time constant
    pub fn validate(&self) -> Result<()> {
        for (param, value) in [
            ("target_loudness", self.target_loudness),
            ("ceiling_db", self.ceiling_db),
        ] {
            if !value.is_finite() {
                return Err(MasteringError::InvalidParameter {
                    param: param.to_string(),
                    value: value.to_string(),
                    expected: "a finite level in dB".to_string(),
                });
            }
        }
        CompressorParams::from_preset(self).validate()
    }

    /// Builder-style loudness target override
    pub fn with_target_loudness(mut self, lufs: f32) -> Self {
        self.target_loudness = lufs;
        self
    }

    /// Builder-style denoise override
    pub fn with_denoise_strength(mut self, strength: DenoiseStrength) -> Self {
        self.denoise_strength = strength;
        self
    }
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self::from_overrides(DEFAULT_PRESET_NAME, &PresetOverrides::default())
    }
}

// ============================================================================
// Store
// ============================================================================

/// Keyed preset lookup with default-on-miss resolution
#[derive(Debug, Clone, Default)]
pub struct PresetStore {
    presets: BTreeMap<String, PresetOverrides>,
}

impl PresetStore {
    /// Create an empty store; every name resolves to the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the built-in presets
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        store.insert(DEFAULT_PRESET_NAME, PresetOverrides::default());
        store.insert(
            "podcast_voice",
            PresetOverrides {
                denoise_strength: Some(DenoiseStrength::High),
                target_loudness: Some(-16.0),
                threshold_db: Some(-20.0),
                ratio: Some(4.0),
                ..Default::default()
            },
        );
        store.insert(
            "music_track",
            PresetOverrides {
                denoise_strength: Some(DenoiseStrength::Off),
                target_loudness: Some(-14.0),
                ratio: Some(3.0),
                release_ms: Some(150.0),
                ceiling_db: Some(-1.0),
                ..Default::default()
            },
        );
        store
    }

    /// Parse presets from a JSON string
    ///
    /// # Errors
    /// * `PresetError` - malformed JSON, an unknown field, or a value no
    ///   stage can run with
    pub fn from_json(json: &str) -> Result<Self> {
        let presets: BTreeMap<String, PresetOverrides> =
            serde_json::from_str(json).map_err(|e| MasteringError::PresetError {
                reason: e.to_string(),
            })?;
        for (name, overrides) in &presets {
            PresetConfig::from_overrides(name, overrides)
                .validate()
                .map_err(|e| MasteringError::PresetError {
                    reason: format!("preset '{}': {}", name, e),
                })?;
        }
        Ok(Self { presets })
    }

    /// Load presets from a JSON file
    ///
    /// A missing file yields the built-in presets; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "Preset file {} not found, using built-in presets",
                path.display()
            );
            return Ok(Self::with_defaults());
        }
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json(&json)?;
        info!("Loaded {} presets from {}", store.len(), path.display());
        Ok(store)
    }

    /// Add or replace a preset
    pub fn insert(&mut self, name: &str, overrides: PresetOverrides) {
        self.presets.insert(name.to_string(), overrides);
    }

    /// Resolve a preset name to a full configuration
    ///
    /// Unknown names resolve to an empty override set, i.e. all defaults.
    pub fn resolve(&self, name: &str) -> PresetConfig {
        match self.presets.get(name) {
            Some(overrides) => PresetConfig::from_overrides(name, overrides),
            None => {
                debug!("Preset '{}' not found, using stage defaults", name);
                PresetConfig::from_overrides(name, &PresetOverrides::default())
            }
        }
    }

    /// Known preset names, sorted
    pub fn list(&self) -> Vec<&str> {
        self.presets.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Serialize the store back to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.presets)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_preset_resolves_to_defaults() {
        let store = PresetStore::with_defaults();
        let config = store.resolve("no_such_preset");

        assert_eq!(config.name, "no_such_preset");
        assert_eq!(config.denoise_strength, DenoiseStrength::Auto);
        assert_eq!(config.target_loudness, DEFAULT_TARGET_LUFS);
        assert_eq!(config.threshold_db, DEFAULT_THRESHOLD_DB);
        assert_eq!(config.ratio, DEFAULT_RATIO);
        assert_eq!(config.ceiling_db, DEFAULT_CEILING_DB);
    }

    #[test]
    fn test_overrides_are_sparse() {
        let store =
            PresetStore::from_json(r#"{"quiet": {"target_loudness": -23.0, "denoise_strength": "off"}}"#)
                .unwrap();
        let config = store.resolve("quiet");

        assert_eq!(config.target_loudness, -23.0);
        assert_eq!(config.denoise_strength, DenoiseStrength::Off);
        assert_eq!(config.attack_ms, DEFAULT_ATTACK_MS);
        assert_eq!(config.release_ms, DEFAULT_RELEASE_MS);
    }

    #[test]
    fn test_malformed_json_is_preset_error() {
        let err = PresetStore::from_json("{ not json").unwrap_err();
        assert_eq!(err.error_code(), "PRESET_ERROR");

        let err = PresetStore::from_json(r#"{"x": {"denoise_strength": "extreme"}}"#).unwrap_err();
        assert_eq!(err.error_code(), "PRESET_ERROR");
    }

    #[test]
    fn test_out_of_range_values_are_preset_errors() {
        for json in [
            r#"{"x": {"ratio": 0.5}}"#,
            r#"{"x": {"attack_ms": 0.0}}"#,
            r#"{"x": {"release_ms": -10.0}}"#,
        ] {
            let err = PresetStore::from_json(json).unwrap_err();
            assert_eq!(err.error_code(), "PRESET_ERROR", "{}", json);
            assert!(err.to_string().contains("preset 'x'"));
        }
    }

    #[test]
    fn test_extreme_but_valid_values_load() {
        let store = PresetStore::from_json(
            r#"{"x": {"ratio": 30.0, "threshold_db": -65.0, "attack_ms": 0.05, "ceiling_db": -20.0}}"#,
        )
        .unwrap();
        let config = store.resolve("x");
        assert_eq!(config.ratio, 30.0);
        assert_eq!(config.ceiling_db, -20.0);
    }

    #[test]
    fn test_builtins_validate() {
        let store = PresetStore::with_defaults();
        for name in store.list() {
            assert!(store.resolve(name).validate().is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_missing_file_falls_back_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::load(&dir.path().join("presets.json")).unwrap();
        assert_eq!(store.list(), vec!["master_auto", "music_track", "podcast_voice"]);
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        std::fs::write(&path, PresetStore::with_defaults().to_json().unwrap()).unwrap();

        let store = PresetStore::load(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.resolve("podcast_voice").denoise_strength,
            DenoiseStrength::High
        );
    }

    #[test]
    fn test_prop_decrease_grows_with_strength() {
        assert!(DenoiseStrength::Auto.prop_decrease() < DenoiseStrength::Medium.prop_decrease());
        assert!(DenoiseStrength::Medium.prop_decrease() < DenoiseStrength::High.prop_decrease());
        assert!(!DenoiseStrength::Off.is_enabled());
    }
}
