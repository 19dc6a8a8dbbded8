//! Read-only lookup interface consumed by the pipeline, plus an in-memory
//! implementation backed by a JSON dataset.
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GeocodeError, Result};
use crate::records::{
    CityInfo, CityKey, ParcelInfo, PrefInfo, PrefKey, RsdtBlkInfo, RsdtBlkKey, RsdtDspInfo,
    TownInfo, TownKey,
};

/// Optional keys narrowing an oaza/chome/koaza lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TownScope {
    pub pref_key: Option<PrefKey>,
    pub city_key: Option<CityKey>,
    pub town_key: Option<TownKey>,
}

impl TownScope {
    pub fn city(city_key: CityKey) -> Self {
        Self {
            city_key: Some(city_key),
            ..Self::default()
        }
    }
}

/// Source of dictionary rows.
///
/// Implementations are shared read-only between workers, hence `Send + Sync`.
/// Every call returns a bounded row set; errors fail only the request that
/// triggered them.
pub trait LookupProvider: Send + Sync {
    fn prefectures(&self) -> Result<Vec<PrefInfo>>;

    /// Cities, including county-prefixed towns/villages and the parent rows of
    /// designated cities. No ward rows.
    fn county_and_cities(&self) -> Result<Vec<CityInfo>>;

    /// Ward rows of designated cities.
    fn city_and_wards(&self) -> Result<Vec<CityInfo>>;

    /// Towns located in designated-city wards.
    fn ward_and_oaza(&self) -> Result<Vec<TownInfo>>;

    /// The 23 special wards of Tokyo.
    fn tokyo23_wards(&self) -> Result<Vec<CityInfo>>;

    /// Towns located in the 23 special wards of Tokyo.
    fn tokyo23_towns(&self) -> Result<Vec<TownInfo>>;

    fn oaza_chomes(&self, scope: &TownScope) -> Result<Vec<TownInfo>>;

    /// Residential blocks of a town, optionally narrowed to one block number.
    fn rsdt_blks(&self, town_key: TownKey, blk_num: Option<&str>) -> Result<Vec<RsdtBlkInfo>>;

    fn rsdt_dsps(&self, rsdtblk_key: RsdtBlkKey) -> Result<Vec<RsdtDspInfo>>;

    fn parcels(
        &self,
        city_key: CityKey,
        town_key: Option<TownKey>,
        prc_id: &str,
    ) -> Result<Vec<ParcelInfo>>;
}

/// Serialized form of a full dictionary set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub prefectures: Vec<PrefInfo>,
    #[serde(default)]
    pub cities: Vec<CityInfo>,
    #[serde(default)]
    pub towns: Vec<TownInfo>,
    #[serde(default)]
    pub rsdt_blks: Vec<RsdtBlkInfo>,
    #[serde(default)]
    pub rsdt_dsps: Vec<RsdtDspInfo>,
    #[serde(default)]
    pub parcels: Vec<ParcelInfo>,
}

const DEMO_DATASET: &str = include_str!("../data/demo.json");

/// `LookupProvider` over an in-memory `Dataset`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    data: Dataset,
    towns_by_city: AHashMap<CityKey, Vec<usize>>,
    blks_by_town: AHashMap<TownKey, Vec<usize>>,
    dsps_by_blk: AHashMap<RsdtBlkKey, Vec<usize>>,
    ward_cities: AHashMap<CityKey, bool>,
}

impl InMemoryProvider {
    pub fn new(data: Dataset) -> Self {
        let mut towns_by_city: AHashMap<CityKey, Vec<usize>> = AHashMap::new();
        for (idx, town) in data.towns.iter().enumerate() {
            towns_by_city.entry(town.city_key).or_default().push(idx);
        }
        let mut blks_by_town: AHashMap<TownKey, Vec<usize>> = AHashMap::new();
        for (idx, blk) in data.rsdt_blks.iter().enumerate() {
            blks_by_town.entry(blk.town_key).or_default().push(idx);
        }
        let mut dsps_by_blk: AHashMap<RsdtBlkKey, Vec<usize>> = AHashMap::new();
        for (idx, dsp) in data.rsdt_dsps.iter().enumerate() {
            dsps_by_blk.entry(dsp.rsdtblk_key).or_default().push(idx);
        }
        let ward_cities = data
            .cities
            .iter()
            .map(|c| (c.city_key, c.is_ward()))
            .collect();
        Self {
            data,
            towns_by_city,
            blks_by_town,
            dsps_by_blk,
            ward_cities,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: Dataset = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GeocodeError::Provider(format!("open dataset {}: {}", path.display(), e))
        })?;
        let provider = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            prefectures = provider.data.prefectures.len(),
            cities = provider.data.cities.len(),
            towns = provider.data.towns.len(),
            "loaded dataset"
        );
        Ok(provider)
    }

    /// Small built-in dataset covering a few wards of Tokyo, Yokohama,
    /// Fukushima and Kyoto.
    ///
    /// A corrupt embedded dataset is logged and yields an empty provider; use
    /// `try_demo` to get the error instead.
    pub fn demo() -> Self {
        match Self::try_demo() {
            Ok(provider) => provider,
            Err(e) => {
                tracing::error!(error = %e, "embedded demo dataset is corrupt");
                Self::default()
            }
        }
    }

    pub fn try_demo() -> Result<Self> {
        Self::from_json(DEMO_DATASET)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    fn towns_in(&self, city_key: CityKey) -> impl Iterator<Item = &TownInfo> {
        self.towns_by_city
            .get(&city_key)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.data.towns[idx])
    }
}

impl LookupProvider for InMemoryProvider {
    fn prefectures(&self) -> Result<Vec<PrefInfo>> {
        Ok(self.data.prefectures.clone())
    }

    fn county_and_cities(&self) -> Result<Vec<CityInfo>> {
        Ok(self
            .data
            .cities
            .iter()
            .filter(|c| !c.is_ward())
            .cloned()
            .collect())
    }

    fn city_and_wards(&self) -> Result<Vec<CityInfo>> {
        Ok(self
            .data
            .cities
            .iter()
            .filter(|c| c.is_ward())
            .cloned()
            .collect())
    }

    fn ward_and_oaza(&self) -> Result<Vec<TownInfo>> {
        Ok(self
            .data
            .towns
            .iter()
            .filter(|t| self.ward_cities.get(&t.city_key).copied().unwrap_or(false))
            .cloned()
            .collect())
    }

    fn tokyo23_wards(&self) -> Result<Vec<CityInfo>> {
        Ok(self
            .data
            .cities
            .iter()
            .filter(|c| c.is_tokyo23())
            .cloned()
            .collect())
    }

    fn tokyo23_towns(&self) -> Result<Vec<TownInfo>> {
        Ok(self
            .data
            .towns
            .iter()
            .filter(|t| crate::records::is_tokyo23_lg_code(&t.lg_code))
            .cloned()
            .collect())
    }

    fn oaza_chomes(&self, scope: &TownScope) -> Result<Vec<TownInfo>> {
        let matches = |t: &TownInfo| {
            scope.pref_key.map_or(true, |k| t.pref_key == k)
                && scope.town_key.map_or(true, |k| t.town_key == k)
        };
        let rows: Vec<TownInfo> = match scope.city_key {
            Some(city_key) => self.towns_in(city_key).filter(|t| matches(*t)).cloned().collect(),
            None => self.data.towns.iter().filter(|t| matches(*t)).cloned().collect(),
        };
        Ok(rows)
    }

    fn rsdt_blks(&self, town_key: TownKey, blk_num: Option<&str>) -> Result<Vec<RsdtBlkInfo>> {
        Ok(self
            .blks_by_town
            .get(&town_key)
            .into_iter()
            .flatten()
            .map(|&idx| &self.data.rsdt_blks[idx])
            .filter(|b| blk_num.map_or(true, |n| b.blk_num == n))
            .cloned()
            .collect())
    }

    fn rsdt_dsps(&self, rsdtblk_key: RsdtBlkKey) -> Result<Vec<RsdtDspInfo>> {
        Ok(self
            .dsps_by_blk
            .get(&rsdtblk_key)
            .into_iter()
            .flatten()
            .map(|&idx| self.data.rsdt_dsps[idx].clone())
            .collect())
    }

    fn parcels(
        &self,
        city_key: CityKey,
        town_key: Option<TownKey>,
        prc_id: &str,
    ) -> Result<Vec<ParcelInfo>> {
        Ok(self
            .data
            .parcels
            .iter()
            .filter(|p| p.city_key == city_key && p.prc_id == prc_id)
            .filter(|p| town_key.is_none() || p.town_key == town_key)
            .cloned()
            .collect())
    }
}
