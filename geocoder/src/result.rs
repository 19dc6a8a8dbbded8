//! Output record of one geocode request.
use serde::{Deserialize, Serialize};

use jpaddr_core::{CoordinateLevel, MatchLevel};

use crate::query::Query;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub input: String,
    /// Resolved address followed by the unrecognized rest.
    pub output: String,
    pub other: String,
    pub match_level: MatchLevel,
    pub coordinate_level: CoordinateLevel,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub lg_code: Option<String>,
    pub machiaza_id: Option<String>,
    pub pref: Option<String>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub ward: Option<String>,
    pub oaza_cho: Option<String>,
    pub chome: Option<String>,
    pub koaza: Option<String>,
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
    pub ambiguous_cnt: usize,
    pub matched_cnt: usize,
}

impl GeocodeResult {
    pub fn from_query(query: &Query) -> Self {
        let f = query.fields().clone();
        let other = query.other();
        let mut result = GeocodeResult {
            input: query.input().to_string(),
            output: String::new(),
            other,
            match_level: query.match_level(),
            coordinate_level: query.coordinate_level(),
            lat: query.lat(),
            lon: query.lon(),
            lg_code: f.lg_code,
            machiaza_id: f.machiaza_id,
            pref: f.pref,
            county: f.county,
            city: f.city,
            ward: f.ward,
            oaza_cho: f.oaza_cho,
            chome: f.chome,
            koaza: f.koaza,
            blk_num: f.blk_num,
            blk_id: f.blk_id,
            rsdt_num: f.rsdt_num,
            rsdt_id: f.rsdt_id,
            rsdt_num2: f.rsdt_num2,
            rsdt2_id: f.rsdt2_id,
            prc_num1: f.prc_num1,
            prc_num2: f.prc_num2,
            prc_num3: f.prc_num3,
            prc_id: f.prc_id,
            ambiguous_cnt: query.ambiguous_cnt(),
            matched_cnt: query.matched_cnt(),
        };
        result.output = result.format_address();
        result
    }

    /// Address text rebuilt from the resolved fields, `other` appended.
    pub fn format_address(&self) -> String {
        if self.match_level == MatchLevel::Unknown {
            return self.other.clone();
        }
        let mut out = String::new();
        let names = [
            &self.pref,
            &self.county,
            &self.city,
            &self.ward,
            &self.oaza_cho,
            &self.chome,
            &self.koaza,
        ];
        for name in names.into_iter().flatten() {
            out.push_str(name);
        }

        let numbers: Vec<&str> = if self.match_level == MatchLevel::Parcel {
            [&self.prc_num1, &self.prc_num2, &self.prc_num3]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect()
        } else {
            [&self.blk_num, &self.rsdt_num, &self.rsdt_num2]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect()
        };
        out.push_str(&numbers.join("-"));
        out.push_str(&self.other);
        out
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_residential() {
        let r = GeocodeResult {
            match_level: MatchLevel::ResidentialDetail,
            pref: Some("東京都".into()),
            city: Some("千代田区".into()),
            oaza_cho: Some("紀尾井町".into()),
            blk_num: Some("1".into()),
            rsdt_num: Some("3".into()),
            other: "ビル5F".into(),
            ..GeocodeResult::default()
        };
        assert_eq!(r.format_address(), "東京都千代田区紀尾井町1-3ビル5F");
    }

    #[test]
    fn test_format_parcel_and_unknown() {
        let r = GeocodeResult {
            match_level: MatchLevel::Parcel,
            pref: Some("福島県".into()),
            city: Some("福島市".into()),
            oaza_cho: Some("杉妻町".into()),
            prc_num1: Some("2".into()),
            prc_num2: Some("16".into()),
            ..GeocodeResult::default()
        };
        assert_eq!(r.format_address(), "福島県福島市杉妻町2-16");

        let unknown = GeocodeResult {
            other: "???".into(),
            ..GeocodeResult::default()
        };
        assert_eq!(unknown.format_address(), "???");
    }

    #[test]
    fn test_json_uses_snake_case_levels() {
        let r = GeocodeResult {
            match_level: MatchLevel::TownLocal,
            ..GeocodeResult::default()
        };
        let json = r.to_json().unwrap();
        assert!(json.contains("\"match_level\":\"town_local\""));
    }
}
