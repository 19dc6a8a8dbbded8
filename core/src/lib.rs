//! jpaddr-core
//!
//! Language-agnostic building blocks for the jpaddr address engine.
//!
//! Public API:
//! - `CharSequence` - Reversible, soft-deletable character sequence
//! - `TrieMatcher` - Prefix trie with wildcard and suffix-challenge search
//! - `MatchLevel` / `CoordinateLevel` - Ordered resolution ranks
//! - `VariantMap` - Character variant folding (old/new kanji, kana variants)
//! - `SemaphoreManager` - Lock-word array with park/unpark waiting
//! - `Config` - Pool and engine tuning
//! - `utils` - Per-character NFKC and kana folding
use serde::{Deserialize, Serialize};

pub mod char_seq;
pub use char_seq::{Cell, CharSequence};

pub mod trie;
pub use trie::{TrieMatch, TrieMatcher};

pub mod level;
pub use level::{CoordinateLevel, MatchLevel};

pub mod variants;
pub use variants::VariantMap;

pub mod semaphore;
pub use semaphore::{SemaphoreManager, SlotGuard};

/// Tuning for the worker pool and the per-worker engine context.
///
/// Language crates flatten this into their own configuration so a single TOML
/// file drives both layers. Missing keys fall back to `Config::default()`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of worker threads. Each worker owns a private copy of the
    /// dictionaries.
    pub workers: usize,

    /// In-flight task bound is `workers * inflight_multiplier`.
    pub inflight_multiplier: usize,

    /// Number of shared payload slots. 0 means `workers * inflight_multiplier`.
    pub semaphore_slots: usize,

    /// Maximum payload size (bytes) a shared slot holds. Larger payloads are
    /// sent inline with the task message.
    pub slot_capacity: usize,

    /// A worker that does not answer a ping within this many milliseconds is
    /// considered dead.
    pub ping_timeout_ms: u64,

    /// Capacity of the per-worker cache of scoped tries.
    pub trie_cache_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            inflight_multiplier: 2,
            semaphore_slots: 0,
            slot_capacity: 4096,
            ping_timeout_ms: 2000,
            trie_cache_size: 256,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Upper bound on tasks queued or running across the pool.
    pub fn max_inflight(&self) -> usize {
        self.workers.max(1) * self.inflight_multiplier.max(1)
    }

    /// Effective number of shared payload slots.
    pub fn slot_count(&self) -> usize {
        if self.semaphore_slots == 0 {
            self.max_inflight()
        } else {
            self.semaphore_slots
        }
    }
}

/// Utility helpers.
pub mod utils {
    use unicode_normalization::UnicodeNormalization;

    /// NFKC-normalize a single character.
    ///
    /// Most characters map to exactly one character; compatibility ligatures
    /// such as `㍻` expand to several.
    pub fn nfkc_char(ch: char) -> Vec<char> {
        if ch.is_ascii() {
            return vec![ch];
        }
        std::iter::once(ch).nfkc().collect()
    }

    /// Katakana → hiragana. Characters outside the katakana block pass through.
    pub fn katakana_to_hiragana(ch: char) -> char {
        match ch {
            '\u{30A1}'..='\u{30F6}' => char::from_u32(ch as u32 - 0x60).unwrap_or(ch),
            _ => ch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip_toml() {
        let mut cfg = Config::default();
        cfg.workers = 3;
        cfg.trie_cache_size = 8;
        let text = cfg.to_toml_string().unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_config_missing_keys_use_defaults() {
        let cfg = Config::from_toml_str("workers = 4").unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.inflight_multiplier, 2);
        assert_eq!(cfg.max_inflight(), 8);
        assert_eq!(cfg.slot_count(), 8);
    }

    #[test]
    fn test_nfkc_and_kana() {
        assert_eq!(utils::katakana_to_hiragana('カ'), 'か');
        assert_eq!(utils::katakana_to_hiragana('漢'), '漢');
        assert_eq!(utils::nfkc_char('１'), vec!['1']);
    }
}
