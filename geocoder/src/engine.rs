//! Geocoder engine.
//!
//! `Geocoder` owns one `WorkerContext`: the dictionaries built from a
//! `LookupProvider`, the compiled number patterns and the cache of scoped
//! tries. A context is never shared; the worker pool builds one per worker.
use ahash::AHashMap;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use jpaddr_core::{TrieMatcher, VariantMap};

use crate::config::GeocoderConfig;
use crate::error::{GeocodeError, Result};
use crate::normalize::AddressNormalizer;
use crate::provider::{LookupProvider, TownScope};
use crate::query::{Query, SearchTarget};
use crate::records::{CityInfo, CityKey, PrefInfo, PrefKey, TownInfo};
use crate::result::GeocodeResult;
use crate::stages::oaza_chome::town_keys;
use crate::stages::Pipeline;

/// Per-request search options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub target: SearchTarget,
    /// Already normalized wildcard character.
    pub fuzzy_char: Option<char>,
}

/// Regular expressions used by the number stages, compiled once per
/// context.
#[derive(Debug, Clone)]
pub(crate) struct Patterns {
    pub oaza_prefix: Regex,
    pub rsdt_blk: Regex,
    pub rsdt_dsp: Regex,
    pub parcel: Regex,
    pub cleanup: Regex,
}

impl Patterns {
    pub fn compile() -> Result<Self> {
        let re = |p: &str| Regex::new(p).map_err(|e| GeocodeError::Config(e.to_string()));
        Ok(Self {
            oaza_prefix: re(r"^(?:大字|字)")?,
            rsdt_blk: re(r"^(\d+)(?:番地|番|-|の)?")?,
            rsdt_dsp: re(r"^((\d+)号?)(?:(?:-|の)(\d+)号?)?")?,
            parcel: re(r"^(\d+)(?:(?:番地|番|-|の)(\d+))?(?:(?:号|-|の)(\d+))?(?:番地|番|号)?")?,
            cleanup: re(r"^[-,、。・]+")?,
        })
    }
}

/// Tries built once when the context starts.
#[derive(Debug, Default)]
pub(crate) struct Dictionaries {
    pub prefectures: TrieMatcher<PrefInfo>,
    /// `county+city` and bare `city` keys.
    pub cities: TrieMatcher<CityInfo>,
    /// `city+ward` keys of designated-city wards.
    pub city_wards: TrieMatcher<CityInfo>,
    /// Ward keys per (prefecture, designated city name).
    pub wards_by_city: AHashMap<(PrefKey, String), TrieMatcher<CityInfo>>,
    /// Ward keys per prefecture.
    pub wards_by_pref: AHashMap<PrefKey, TrieMatcher<CityInfo>>,
    /// `ward+oaza+chome+koaza` keys.
    pub ward_oaza: TrieMatcher<TownInfo>,
    pub tokyo23_wards: TrieMatcher<CityInfo>,
    pub tokyo23_towns: TrieMatcher<TownInfo>,
}

impl Dictionaries {
    fn build(provider: &dyn LookupProvider, norm: &AddressNormalizer) -> Result<Self> {
        let mut dicts = Dictionaries::default();

        for pref in provider.prefectures()? {
            dicts.prefectures.append(&norm.key(&pref.pref), pref);
        }

        for city in provider.county_and_cities()? {
            if !city.county.is_empty() {
                dicts
                    .cities
                    .append(&norm.key(&format!("{}{}", city.county, city.city)), city.clone());
            }
            dicts.cities.append(&norm.key(&city.city), city);
        }

        for ward in provider.city_and_wards()? {
            let ward_key = norm.key(&ward.ward);
            dicts
                .city_wards
                .append(&norm.key(&format!("{}{}", ward.city, ward.ward)), ward.clone());
            dicts
                .wards_by_city
                .entry((ward.pref_key, ward.city.clone()))
                .or_default()
                .append(&ward_key, ward.clone());
            dicts
                .wards_by_pref
                .entry(ward.pref_key)
                .or_default()
                .append(&ward_key, ward);
        }

        for town in provider.ward_and_oaza()? {
            let ward = norm.key(&town.ward);
            for key in town_keys(norm, &town) {
                dicts.ward_oaza.append(&format!("{}{}", ward, key), town.clone());
            }
        }

        for ward in provider.tokyo23_wards()? {
            dicts.tokyo23_wards.append(&norm.key(&ward.city), ward);
        }
        for town in provider.tokyo23_towns()? {
            for key in town_keys(norm, &town) {
                dicts.tokyo23_towns.append(&key, town.clone());
            }
        }

        Ok(dicts)
    }
}

/// Cache counters for scoped tries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Everything one worker needs to run the pipeline.
pub struct WorkerContext {
    provider: Arc<dyn LookupProvider>,
    pub(crate) normalizer: AddressNormalizer,
    pub(crate) patterns: Patterns,
    pub(crate) pref_suffixes: Vec<char>,
    pub(crate) dicts: Dictionaries,
    town_tries: LruCache<CityKey, Arc<TrieMatcher<TownInfo>>>,
    stats: CacheStats,
}

impl WorkerContext {
    pub fn new(provider: Arc<dyn LookupProvider>, config: &GeocoderConfig) -> Result<Self> {
        let normalizer = AddressNormalizer::new(VariantMap::from_rules(&config.variant_rules));
        let dicts = Dictionaries::build(provider.as_ref(), &normalizer)?;
        let capacity = NonZeroUsize::new(config.base.trie_cache_size.max(1))
            .ok_or_else(|| GeocodeError::Config("trie_cache_size must be positive".into()))?;
        tracing::debug!(
            prefectures = dicts.prefectures.len(),
            cities = dicts.cities.len(),
            wards = dicts.city_wards.len(),
            "dictionaries built"
        );
        Ok(Self {
            provider,
            normalizer,
            patterns: Patterns::compile()?,
            pref_suffixes: config.pref_suffix_chars(),
            dicts,
            town_tries: LruCache::new(capacity),
            stats: CacheStats::default(),
        })
    }

    pub(crate) fn provider(&self) -> &dyn LookupProvider {
        self.provider.as_ref()
    }

    /// Oaza/chome/koaza trie of one city, built on first use.
    pub(crate) fn town_trie(&mut self, city_key: CityKey) -> Result<Arc<TrieMatcher<TownInfo>>> {
        if let Some(trie) = self.town_tries.get(&city_key) {
            self.stats.hits += 1;
            return Ok(Arc::clone(trie));
        }
        self.stats.misses += 1;
        let rows = self.provider.oaza_chomes(&TownScope::city(city_key))?;
        let mut trie = TrieMatcher::new();
        for town in rows {
            for key in town_keys(&self.normalizer, &town) {
                trie.append(&key, town.clone());
            }
        }
        let trie = Arc::new(trie);
        self.town_tries.put(city_key, Arc::clone(&trie));
        Ok(trie)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entries: self.town_tries.len(),
            ..self.stats
        }
    }
}

/// Single-threaded geocoding entry point.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use jpaddr::{Geocoder, GeocoderConfig, InMemoryProvider, MatchLevel, SearchTarget};
///
/// let mut geocoder =
///     Geocoder::new(Arc::new(InMemoryProvider::demo()), &GeocoderConfig::default()).unwrap();
/// let result = geocoder.geocode("東京都千代田区紀尾井町1-3", SearchTarget::All, None).unwrap();
/// assert_eq!(result.match_level, MatchLevel::ResidentialDetail);
/// ```
pub struct Geocoder {
    ctx: WorkerContext,
    pipeline: Pipeline,
    defaults: SearchOptions,
}

impl Geocoder {
    pub fn new(provider: Arc<dyn LookupProvider>, config: &GeocoderConfig) -> Result<Self> {
        let ctx = WorkerContext::new(provider, config)?;
        let mut geocoder = Self {
            ctx,
            pipeline: Pipeline::standard(),
            defaults: SearchOptions::default(),
        };
        geocoder.defaults = geocoder.options(config.search_target, config.fuzzy_char);
        Ok(geocoder)
    }

    /// Resolve one address.
    pub fn geocode(
        &mut self,
        address: &str,
        target: SearchTarget,
        fuzzy_char: Option<char>,
    ) -> Result<GeocodeResult> {
        let opts = self.options(target, fuzzy_char);
        let best = self.resolve_query(address, &opts)?;
        Ok(GeocodeResult::from_query(&best))
    }

    /// Resolve one address with the configured target and wildcard.
    pub fn resolve(&mut self, address: &str) -> Result<GeocodeResult> {
        let opts = self.defaults;
        let best = self.resolve_query(address, &opts)?;
        Ok(GeocodeResult::from_query(&best))
    }

    /// Best query for `address`, before conversion to a result record.
    pub fn resolve_query(&mut self, address: &str, opts: &SearchOptions) -> Result<Query> {
        let seed = Query::create(address, self.ctx.normalizer.normalize(address));
        self.pipeline.run(&mut self.ctx, opts, seed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.ctx.cache_stats()
    }

    pub fn defaults(&self) -> SearchOptions {
        self.defaults
    }

    // The wildcard goes through the same normalization as the input so that
    // e.g. a full-width `？` matches an input `?`.
    fn options(&self, target: SearchTarget, fuzzy_char: Option<char>) -> SearchOptions {
        let fuzzy_char = fuzzy_char.and_then(|c| {
            self.ctx
                .normalizer
                .normalize(&c.to_string())
                .chars()
                .next()
        });
        SearchOptions { target, fuzzy_char }
    }
}
