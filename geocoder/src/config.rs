//! Layered configuration for the geocoder.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GeocodeError, Result};
use crate::query::SearchTarget;

/// Geocoder configuration that extends the base `Config` from core.
///
/// This configuration includes:
/// - All pool and cache options from `jpaddr_core::Config` (flattened via serde)
/// - The default search target and wildcard character
/// - Character variant rules and prefecture suffixes used by matching
///
/// # Example
///
/// ```rust
/// use jpaddr::GeocoderConfig;
///
/// let config = GeocoderConfig::from_toml_str("workers = 2\nfuzzy_char = \"?\"").unwrap();
/// assert_eq!(config.base.workers, 2);
/// assert_eq!(config.fuzzy_char, Some('?'));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Pool and cache tuning.
    #[serde(flatten)]
    pub base: jpaddr_core::Config,

    /// Input character that matches any single dictionary character.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_char: Option<char>,

    pub search_target: SearchTarget,

    /// Variant rules such as `"舊=旧"` or `"ヶ|ケ=が"`.
    pub variant_rules: Vec<String>,

    /// Suffixes tried when a prefecture name is written without one
    /// (`東京` → `東京都`).
    pub pref_suffixes: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base: jpaddr_core::Config::default(),
            fuzzy_char: None,
            search_target: SearchTarget::All,
            variant_rules: crate::standard_variant_rules(),
            pref_suffixes: "都道府県".to_string(),
        }
    }
}

impl GeocoderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GeocodeError::Config(e.to_string()))
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GeocodeError::Config(e.to_string()))
    }

    /// Get a reference to the base config
    pub fn base(&self) -> &jpaddr_core::Config {
        &self.base
    }

    pub fn pref_suffix_chars(&self) -> Vec<char> {
        self.pref_suffixes.chars().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GeocoderConfig::default();
        assert_eq!(cfg.search_target, SearchTarget::All);
        assert_eq!(cfg.pref_suffix_chars(), vec!['都', '道', '府', '県']);
        assert!(!cfg.variant_rules.is_empty());
    }

    #[test]
    fn test_flattened_toml() {
        let cfg = GeocoderConfig::from_toml_str(
            "workers = 3\ntrie_cache_size = 16\nsearch_target = \"parcel\"\n",
        )
        .unwrap();
        assert_eq!(cfg.base.workers, 3);
        assert_eq!(cfg.base.trie_cache_size, 16);
        assert_eq!(cfg.search_target, SearchTarget::Parcel);
        assert_eq!(cfg.base.inflight_multiplier, 2);

        let text = cfg.to_toml_string().unwrap();
        let back = GeocoderConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = GeocoderConfig::from_toml_str("workers = \"many\"").unwrap_err();
        assert!(matches!(err, GeocodeError::Config(_)));
    }
}
