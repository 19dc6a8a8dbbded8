//! Query state carried through the resolution pipeline.
//!
//! A `Query` is one candidate resolution in progress. Stages never mutate a
//! query they received: `refine` clones it, applies the change to the copy
//! and checks that the match level did not go down.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jpaddr_core::{CharSequence, CoordinateLevel, MatchLevel, TrieMatch};

use crate::records::{
    CityInfo, CityKey, ParcelInfo, ParcelKey, PrefInfo, PrefKey, RsdtBlkInfo, RsdtBlkKey,
    RsdtDspInfo, RsdtDspKey, TownInfo, TownKey,
};

/// Which fine-grained address system a search should resolve into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTarget {
    /// Residential addressing first, parcels for towns without it.
    #[default]
    All,
    /// Residential block / sub-number only.
    Residential,
    /// Parcel numbers only.
    Parcel,
}

impl SearchTarget {
    pub fn wants_residential(self) -> bool {
        self != SearchTarget::Parcel
    }

    pub fn wants_parcel(self) -> bool {
        self != SearchTarget::Residential
    }
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchTarget::All => "all",
            SearchTarget::Residential => "residential",
            SearchTarget::Parcel => "parcel",
        })
    }
}

impl FromStr for SearchTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SearchTarget::All),
            "residential" => Ok(SearchTarget::Residential),
            "parcel" => Ok(SearchTarget::Parcel),
            other => Err(format!("unknown search target: {}", other)),
        }
    }
}

/// Resolved administrative names and identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressFields {
    pub lg_code: Option<String>,
    pub machiaza_id: Option<String>,
    pub pref: Option<String>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub ward: Option<String>,
    pub oaza_cho: Option<String>,
    pub chome: Option<String>,
    pub koaza: Option<String>,
    pub rsdt_addr_flg: Option<bool>,
    pub blk_num: Option<String>,
    pub blk_id: Option<String>,
    pub rsdt_num: Option<String>,
    pub rsdt_id: Option<String>,
    pub rsdt_num2: Option<String>,
    pub rsdt2_id: Option<String>,
    pub prc_num1: Option<String>,
    pub prc_num2: Option<String>,
    pub prc_num3: Option<String>,
    pub prc_id: Option<String>,
}

/// Surrogate keys narrowing later lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedKeys {
    pub pref_key: Option<PrefKey>,
    pub city_key: Option<CityKey>,
    pub town_key: Option<TownKey>,
    pub rsdtblk_key: Option<RsdtBlkKey>,
    pub rsdtdsp_key: Option<RsdtDspKey>,
    pub parcel_key: Option<ParcelKey>,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) input: Arc<str>,
    pub(crate) remainder: CharSequence,
    pub(crate) fields: AddressFields,
    pub(crate) keys: ResolvedKeys,
    pub(crate) match_level: MatchLevel,
    pub(crate) coordinate_level: CoordinateLevel,
    pub(crate) lat: Option<f64>,
    pub(crate) lon: Option<f64>,
    pub(crate) matched_cnt: usize,
    pub(crate) ambiguous_cnt: usize,
}

impl Query {
    /// Seed query for an input line whose normalized form is `normalized`.
    pub fn create(input: &str, normalized: CharSequence) -> Self {
        Self {
            input: Arc::from(input),
            remainder: normalized,
            fields: AddressFields::default(),
            keys: ResolvedKeys::default(),
            match_level: MatchLevel::Unknown,
            coordinate_level: MatchLevel::Unknown,
            lat: None,
            lon: None,
            matched_cnt: 0,
            ambiguous_cnt: 0,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Unconsumed part of the input.
    pub fn remainder(&self) -> &CharSequence {
        &self.remainder
    }

    pub fn fields(&self) -> &AddressFields {
        &self.fields
    }

    pub fn keys(&self) -> &ResolvedKeys {
        &self.keys
    }

    pub fn match_level(&self) -> MatchLevel {
        self.match_level
    }

    pub fn coordinate_level(&self) -> CoordinateLevel {
        self.coordinate_level
    }

    pub fn lat(&self) -> Option<f64> {
        self.lat
    }

    pub fn lon(&self) -> Option<f64> {
        self.lon
    }

    /// Non-ignored input characters consumed so far.
    pub fn matched_cnt(&self) -> usize {
        self.matched_cnt
    }

    /// Wildcards resolved so far.
    pub fn ambiguous_cnt(&self) -> usize {
        self.ambiguous_cnt
    }

    /// The unrecognized rest of the input, as originally written. Only
    /// ignored cells right after the matched part are skipped.
    ///
    /// An unresolved query returns the raw input.
    pub fn other(&self) -> String {
        if self.match_level == MatchLevel::Unknown {
            return self.input.to_string();
        }
        self.remainder.trim_ignored_start().to_original_string()
    }

    /// New query derived from this one.
    pub fn refine<F>(&self, f: F) -> Query
    where
        F: FnOnce(&mut Query),
    {
        let mut next = self.clone();
        f(&mut next);
        debug_assert!(
            next.match_level >= self.match_level,
            "match level went down: {} -> {}",
            self.match_level,
            next.match_level
        );
        next
    }

    /// New query that consumed `found` and reached `level`.
    pub(crate) fn advance<T, F>(&self, found: &TrieMatch<'_, T>, level: MatchLevel, f: F) -> Query
    where
        F: FnOnce(&mut Query),
    {
        self.refine(|q| {
            q.remainder = found.unmatched.clone();
            q.matched_cnt += found.depth;
            q.ambiguous_cnt += found.ambiguous_cnt;
            q.match_level = q.match_level.max(level);
            f(q);
        })
    }

    /// New query that consumed `n` characters in a keyed lookup reaching
    /// `level`.
    pub(crate) fn consume_to<F>(&self, n: usize, level: MatchLevel, f: F) -> Query
    where
        F: FnOnce(&mut Query),
    {
        let (_, rest) = self.remainder.consume(n);
        self.refine(|q| {
            q.remainder = rest;
            q.matched_cnt += n;
            q.match_level = q.match_level.max(level);
            f(q);
        })
    }

    // Coordinates replace the current ones only when they are at least as
    // fine.
    pub(crate) fn set_coordinates(&mut self, level: CoordinateLevel, lat: Option<f64>, lon: Option<f64>) {
        if let (Some(lat), Some(lon)) = (lat, lon) {
            if level >= self.coordinate_level {
                self.coordinate_level = level;
                self.lat = Some(lat);
                self.lon = Some(lon);
            }
        }
    }

    pub(crate) fn apply_pref(&mut self, pref: &PrefInfo) {
        self.keys.pref_key = Some(pref.pref_key);
        self.fields.pref = Some(pref.pref.clone());
        self.fields.lg_code = Some(pref.lg_code.clone());
        self.set_coordinates(MatchLevel::Prefecture, pref.rep_lat, pref.rep_lon);
    }

    pub(crate) fn apply_city(&mut self, city: &CityInfo, level: MatchLevel) {
        self.keys.pref_key = Some(city.pref_key);
        self.keys.city_key = Some(city.city_key);
        self.fields.pref = Some(city.pref.clone());
        self.fields.county = non_empty(&city.county);
        self.fields.city = Some(city.city.clone());
        self.fields.ward = non_empty(&city.ward);
        self.fields.lg_code = Some(city.lg_code.clone());
        self.set_coordinates(level, city.rep_lat, city.rep_lon);
    }

    pub(crate) fn apply_town(&mut self, town: &TownInfo, level: MatchLevel) {
        self.keys.pref_key = Some(town.pref_key);
        self.keys.city_key = Some(town.city_key);
        self.keys.town_key = Some(town.town_key);
        self.fields.pref = Some(town.pref.clone());
        self.fields.county = non_empty(&town.county);
        self.fields.city = Some(town.city.clone());
        self.fields.ward = non_empty(&town.ward);
        self.fields.lg_code = Some(town.lg_code.clone());
        self.fields.machiaza_id = Some(town.machiaza_id.clone());
        self.fields.oaza_cho = non_empty(&town.oaza_cho);
        self.fields.chome = non_empty(&town.chome);
        self.fields.koaza = non_empty(&town.koaza);
        self.fields.rsdt_addr_flg = Some(town.rsdt_addr_flg);
        self.set_coordinates(level, town.rep_lat, town.rep_lon);
    }

    pub(crate) fn apply_rsdt_blk(&mut self, blk: &RsdtBlkInfo) {
        self.keys.rsdtblk_key = Some(blk.rsdtblk_key);
        self.fields.blk_num = Some(blk.blk_num.clone());
        self.fields.blk_id = Some(blk.blk_id.clone());
        self.set_coordinates(MatchLevel::ResidentialBlock, blk.rep_lat, blk.rep_lon);
    }

    pub(crate) fn apply_rsdt_dsp(&mut self, dsp: &RsdtDspInfo) {
        self.keys.rsdtdsp_key = Some(dsp.rsdtdsp_key);
        self.fields.rsdt_num = Some(dsp.rsdt_num.clone());
        self.fields.rsdt_id = Some(dsp.rsdt_id.clone());
        self.fields.rsdt_num2 = non_empty(&dsp.rsdt_num2);
        self.fields.rsdt2_id = non_empty(&dsp.rsdt2_id);
        self.set_coordinates(MatchLevel::ResidentialDetail, dsp.rep_lat, dsp.rep_lon);
    }

    pub(crate) fn apply_parcel(&mut self, parcel: &ParcelInfo) {
        self.keys.parcel_key = Some(parcel.parcel_key);
        self.fields.prc_id = Some(parcel.prc_id.clone());
        self.fields.prc_num1 = Some(parcel.prc_num1.clone());
        self.fields.prc_num2 = non_empty(&parcel.prc_num2);
        self.fields.prc_num3 = non_empty(&parcel.prc_num3);
        self.set_coordinates(MatchLevel::Parcel, parcel.rep_lat, parcel.rep_lon);
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpaddr_core::TrieMatcher;

    fn seed(text: &str) -> Query {
        Query::create(text, CharSequence::from_string(text))
    }

    #[test]
    fn test_seed_is_unknown_with_raw_other() {
        let q = seed("  なにか ");
        assert_eq!(q.match_level(), MatchLevel::Unknown);
        assert_eq!(q.other(), "  なにか ");
        assert_eq!(q.matched_cnt(), 0);
    }

    #[test]
    fn test_advance_consumes_and_leaves_parent() {
        let trie: TrieMatcher<PrefInfo> = vec![(
            "東京都",
            PrefInfo {
                pref_key: 1,
                lg_code: "130001".into(),
                pref: "東京都".into(),
                rep_lat: Some(35.6),
                rep_lon: Some(139.6),
            },
        )]
        .into_iter()
        .collect();
        let parent = seed("東京都ごみ ");
        let found = trie.find(parent.remainder(), None, &[], false);
        let child = parent.advance(&found[0], MatchLevel::Prefecture, |q| q.apply_pref(found[0].value));

        assert_eq!(child.match_level(), MatchLevel::Prefecture);
        assert_eq!(child.coordinate_level(), MatchLevel::Prefecture);
        assert_eq!(child.matched_cnt(), 3);
        assert_eq!(child.fields().pref.as_deref(), Some("東京都"));
        assert_eq!(child.other(), "ごみ ");

        assert_eq!(parent.match_level(), MatchLevel::Unknown);
        assert!(parent.fields().pref.is_none());
    }

    #[test]
    fn test_coarser_coordinates_do_not_replace_finer() {
        let mut q = seed("x");
        q.set_coordinates(MatchLevel::Machiaza, Some(1.0), Some(2.0));
        q.set_coordinates(MatchLevel::City, Some(9.0), Some(9.0));
        assert_eq!(q.coordinate_level(), MatchLevel::Machiaza);
        assert_eq!(q.lat(), Some(1.0));
        q.set_coordinates(MatchLevel::Parcel, None, None);
        assert_eq!(q.coordinate_level(), MatchLevel::Machiaza);
    }

    #[test]
    fn test_search_target_parse() {
        assert_eq!("Parcel".parse::<SearchTarget>(), Ok(SearchTarget::Parcel));
        assert!("street".parse::<SearchTarget>().is_err());
        assert!(SearchTarget::All.wants_parcel() && SearchTarget::All.wants_residential());
        assert!(!SearchTarget::Residential.wants_parcel());
    }
}
