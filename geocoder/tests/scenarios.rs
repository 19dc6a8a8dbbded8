use std::sync::Arc;

use jpaddr::{
    GeocodeResult, Geocoder, GeocoderConfig, InMemoryProvider, MatchLevel, SearchTarget,
};

fn geocoder() -> Geocoder {
    Geocoder::new(Arc::new(InMemoryProvider::demo()), &GeocoderConfig::default()).unwrap()
}

fn geocode(address: &str) -> GeocodeResult {
    geocoder().geocode(address, SearchTarget::All, None).unwrap()
}

#[test]
fn residential_detail_with_coordinates() {
    let r = geocode("東京都千代田区紀尾井町1-3");
    assert_eq!(r.match_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.coordinate_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.lat, Some(35.679107));
    assert_eq!(r.lon, Some(139.736395));
    assert_eq!(r.city.as_deref(), Some("千代田区"));
    assert_eq!(r.oaza_cho.as_deref(), Some("紀尾井町"));
    assert_eq!(r.blk_num.as_deref(), Some("1"));
    assert_eq!(r.rsdt_num.as_deref(), Some("3"));
    assert_eq!(r.matched_cnt, 14);
    assert_eq!(r.other, "");
    assert_eq!(r.output, "東京都千代田区紀尾井町1-3");
}

#[test]
fn chome_without_residential_rows_stays_at_machiaza() {
    let r = geocode("東京都千代田区九段南1丁目2-1");
    assert_eq!(r.match_level, MatchLevel::Machiaza);
    assert_eq!(r.oaza_cho.as_deref(), Some("九段南"));
    assert_eq!(r.chome.as_deref(), Some("一丁目"));
    assert_eq!(r.machiaza_id.as_deref(), Some("0018001"));
    assert_eq!(r.lat, Some(35.693972));
    assert_eq!(r.lon, Some(139.753265));
    assert_eq!(r.other, "2-1");
}

#[test]
fn kanji_chome_number_is_read() {
    let r = geocode("東京都千代田区九段南一丁目");
    assert_eq!(r.match_level, MatchLevel::Machiaza);
    assert_eq!(r.chome.as_deref(), Some("一丁目"));
}

#[test]
fn unresolvable_rest_keeps_prefecture() {
    let r = geocode("東京都あいうえお");
    assert_eq!(r.match_level, MatchLevel::Prefecture);
    assert_eq!(r.pref.as_deref(), Some("東京都"));
    assert_eq!(r.coordinate_level, MatchLevel::Prefecture);
    assert!(r.city.is_none());
}

#[test]
fn city_without_prefecture_resolves_to_parcel() {
    let r = geocode("福島市杉妻町2-16");
    assert_eq!(r.match_level, MatchLevel::Parcel);
    assert_eq!(r.pref.as_deref(), Some("福島県"));
    assert_eq!(r.city.as_deref(), Some("福島市"));
    assert_eq!(r.prc_num1.as_deref(), Some("2"));
    assert_eq!(r.prc_num2.as_deref(), Some("16"));
    assert_eq!(r.prc_id.as_deref(), Some("000020001600000"));
}

#[test]
fn city_of_another_prefecture_is_rejected() {
    let r = geocode("神奈川県府中市");
    assert_eq!(r.match_level, MatchLevel::Prefecture);
    assert_eq!(r.pref.as_deref(), Some("神奈川県"));
    assert_eq!(r.other, "府中市");
}

#[test]
fn tokyo_town_without_ward() {
    let r = geocode("東京都紀尾井町1-3");
    assert_eq!(r.match_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.city.as_deref(), Some("千代田区"));
}

#[test]
fn designated_city_ward_without_city() {
    let r = geocode("神奈川県中区本町1-1-1");
    assert_eq!(r.match_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.city.as_deref(), Some("横浜市"));
    assert_eq!(r.ward.as_deref(), Some("中区"));
    assert_eq!(r.chome.as_deref(), Some("一丁目"));
    assert_eq!(r.rsdt_num.as_deref(), Some("1"));
}

#[test]
fn county_town_with_oaza_prefix_and_variant() {
    let r = geocode("西多摩郡瑞穂町大字箱根ヶ崎2335");
    assert_eq!(r.match_level, MatchLevel::Parcel);
    assert_eq!(r.county.as_deref(), Some("西多摩郡"));
    assert_eq!(r.oaza_cho.as_deref(), Some("箱根ケ崎"));
    assert_eq!(r.prc_num1.as_deref(), Some("2335"));
}

#[test]
fn city_and_ward_without_prefecture() {
    let r = geocode("京都市中京区");
    assert_eq!(r.match_level, MatchLevel::Ward);
    assert_eq!(r.pref.as_deref(), Some("京都府"));
    assert_eq!(r.ward.as_deref(), Some("中京区"));
}

#[test]
fn prefecture_suffix_is_optional() {
    let r = geocode("東京千代田区紀尾井町1-3");
    assert_eq!(r.match_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.pref.as_deref(), Some("東京都"));
}

#[test]
fn fuzzy_char_counts_as_ambiguous() {
    let mut g = geocoder();
    let r = g
        .geocode("東京都千代田区紀?井町1-3", SearchTarget::All, Some('?'))
        .unwrap();
    assert_eq!(r.match_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.ambiguous_cnt, 1);
    assert_eq!(r.oaza_cho.as_deref(), Some("紀尾井町"));
}

#[test]
fn each_wildcard_counts_once() {
    let mut g = geocoder();
    let r = g
        .geocode("東京都千?田区紀?井町1-3", SearchTarget::All, Some('?'))
        .unwrap();
    assert_eq!(r.match_level, MatchLevel::ResidentialDetail);
    assert_eq!(r.ambiguous_cnt, 2);
    assert_eq!(r.city.as_deref(), Some("千代田区"));
    assert_eq!(r.oaza_cho.as_deref(), Some("紀尾井町"));
    assert_eq!(r.rsdt_num.as_deref(), Some("3"));
}

#[test]
fn unmatched_rest_keeps_its_spacing() {
    let r = geocode("東京都 あいうえお ");
    assert_eq!(r.match_level, MatchLevel::Prefecture);
    assert_eq!(r.other, "あいうえお ");
}

#[test]
fn parcel_target_skips_residential_addressing() {
    let mut g = geocoder();
    let r = g
        .geocode("東京都千代田区紀尾井町1-3", SearchTarget::Parcel, None)
        .unwrap();
    assert_eq!(r.match_level, MatchLevel::TownLocal);
    assert!(r.blk_num.is_none());
    assert_eq!(r.other, "1-3");
}

#[test]
fn residential_target_skips_parcels() {
    let mut g = geocoder();
    let r = g
        .geocode("福島市杉妻町2-16", SearchTarget::Residential, None)
        .unwrap();
    assert_eq!(r.match_level, MatchLevel::TownLocal);
    assert!(r.prc_id.is_none());
}

#[test]
fn empty_and_control_input_is_unknown() {
    let mut g = geocoder();
    for input in ["", "\u{7}\u{1b}", "   "] {
        let r = g.geocode(input, SearchTarget::All, None).unwrap();
        assert_eq!(r.match_level, MatchLevel::Unknown);
        assert_eq!(r.other, input);
        assert_eq!(r.output, input);
        assert_eq!(r.matched_cnt, 0);
    }
}

#[test]
fn unmatched_input_is_returned_verbatim() {
    let r = geocode("hello world");
    assert_eq!(r.match_level, MatchLevel::Unknown);
    assert_eq!(r.output, "hello world");
    assert!(r.lat.is_none());
}

#[test]
fn matched_count_never_exceeds_input() {
    let mut g = geocoder();
    for input in [
        "東京都千代田区紀尾井町1-3",
        "福島市杉妻町2-16",
        "西多摩郡瑞穂町大字箱根ヶ崎2335",
        "神奈川県中区本町1-1-1",
    ] {
        let r = g.geocode(input, SearchTarget::All, None).unwrap();
        assert!(r.matched_cnt <= input.chars().count(), "{}", input);
        assert!(r.coordinate_level <= r.match_level, "{}", input);
    }
}

#[test]
fn result_serializes_to_json() {
    let r = geocode("東京都千代田区紀尾井町1-3");
    let value: serde_json::Value = serde_json::from_str(&r.to_json().unwrap()).unwrap();
    assert_eq!(value["match_level"], "residential_detail");
    assert_eq!(value["pref"], "東京都");
}
