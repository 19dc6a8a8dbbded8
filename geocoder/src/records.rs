//! Lookup record types.
//!
//! Flat rows handed out by a `LookupProvider`, one type per dictionary. Each
//! stage builds its trie over the row type it needs, so payloads stay typed
//! all the way through matching.
use serde::{Deserialize, Serialize};

pub type PrefKey = u32;
pub type CityKey = u32;
pub type TownKey = u32;
pub type RsdtBlkKey = u32;
pub type RsdtDspKey = u32;
pub type ParcelKey = u32;

/// Prefecture row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrefInfo {
    pub pref_key: PrefKey,
    pub lg_code: String,
    pub pref: String,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

/// City, county+city, or designated-city ward row.
///
/// `ward` is empty for ordinary cities and for the parent row of a
/// designated city.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CityInfo {
    pub city_key: CityKey,
    pub pref_key: PrefKey,
    pub lg_code: String,
    pub pref: String,
    #[serde(default)]
    pub county: String,
    pub city: String,
    #[serde(default)]
    pub ward: String,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

impl CityInfo {
    pub fn is_ward(&self) -> bool {
        !self.ward.is_empty()
    }

    /// Whether the city is one of the 23 special wards of Tokyo
    /// (local-government codes 13101 to 13123).
    pub fn is_tokyo23(&self) -> bool {
        is_tokyo23_lg_code(&self.lg_code)
    }
}

pub(crate) fn is_tokyo23_lg_code(lg_code: &str) -> bool {
    lg_code
        .get(..5)
        .and_then(|prefix| prefix.parse::<u32>().ok())
        .is_some_and(|code| (13101..=13123).contains(&code))
}

/// Oaza / chome / koaza row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TownInfo {
    pub town_key: TownKey,
    pub city_key: CityKey,
    pub pref_key: PrefKey,
    pub lg_code: String,
    pub machiaza_id: String,
    pub pref: String,
    #[serde(default)]
    pub county: String,
    pub city: String,
    #[serde(default)]
    pub ward: String,
    pub oaza_cho: String,
    #[serde(default)]
    pub chome: String,
    #[serde(default)]
    pub koaza: String,
    /// Whether the town uses residential (jukyo hyoji) addressing.
    #[serde(default)]
    pub rsdt_addr_flg: bool,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

impl TownInfo {
    /// Oaza-only rows resolve to `TownLocal`; rows with chome or koaza to
    /// `Machiaza`.
    pub fn is_detailed(&self) -> bool {
        !self.chome.is_empty() || !self.koaza.is_empty()
    }
}

/// Residential block (rsdt_blk) row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RsdtBlkInfo {
    pub rsdtblk_key: RsdtBlkKey,
    pub town_key: TownKey,
    pub blk_num: String,
    pub blk_id: String,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

/// Residential sub-number (rsdt_dsp) row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RsdtDspInfo {
    pub rsdtdsp_key: RsdtDspKey,
    pub rsdtblk_key: RsdtBlkKey,
    pub rsdt_id: String,
    #[serde(default)]
    pub rsdt2_id: String,
    pub rsdt_num: String,
    #[serde(default)]
    pub rsdt_num2: String,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

/// Parcel (chiban) row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParcelInfo {
    pub parcel_key: ParcelKey,
    pub city_key: CityKey,
    pub town_key: Option<TownKey>,
    /// Three 5-digit zero-padded numbers, e.g. `000020001600000` for 2-16.
    pub prc_id: String,
    pub prc_num1: String,
    #[serde(default)]
    pub prc_num2: String,
    #[serde(default)]
    pub prc_num3: String,
    pub rep_lat: Option<f64>,
    pub rep_lon: Option<f64>,
}

/// Build a parcel id from up to three parcel numbers.
pub fn parcel_id(num1: &str, num2: Option<&str>, num3: Option<&str>) -> String {
    format!(
        "{:0>5}{:0>5}{:0>5}",
        num1,
        num2.unwrap_or("0"),
        num3.unwrap_or("0")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parcel_id() {
        assert_eq!(parcel_id("2", Some("16"), None), "000020001600000");
        assert_eq!(parcel_id("2335", None, None), "023350000000000");
    }

    #[test]
    fn test_tokyo23_codes() {
        assert!(is_tokyo23_lg_code("131016"));
        assert!(is_tokyo23_lg_code("131237"));
        assert!(!is_tokyo23_lg_code("132063"));
        assert!(!is_tokyo23_lg_code("13"));
    }
}
