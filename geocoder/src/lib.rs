//! jpaddr crate root
//!
//! Japanese address resolution on top of `jpaddr-core`: input
//! normalization, the staged resolution pipeline, the `Geocoder` entry point
//! and a worker pool for bulk workloads.
//!
//! Public API exported here:
//! - `Geocoder` from `engine`
//! - `GeocodeResult` from `result`
//! - `WorkerPool` and `CancelToken` from `pool`
//! - `LookupProvider` and `InMemoryProvider` from `provider`

pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pool;
pub mod provider;
pub mod query;
pub mod records;
pub mod result;
pub mod ring;
pub mod stages;

pub use jpaddr_core::{CoordinateLevel, MatchLevel};

pub use config::GeocoderConfig;
pub use engine::{Geocoder, SearchOptions};
pub use error::{GeocodeError, Result};
pub use normalize::AddressNormalizer;
pub use pool::{CancelToken, WorkerPool};
pub use provider::{Dataset, InMemoryProvider, LookupProvider, TownScope};
pub use query::{Query, SearchTarget};
pub use result::GeocodeResult;

/// Character variant rules applied to both input and dictionary names.
///
/// - Old kanji forms fold to their modern forms (舊 → 旧, 澤 → 沢, ...)
/// - The small/large ケ and ガ spellings of the が particle fold together
/// - ノ and 之 fold to の
pub fn standard_variant_rules() -> Vec<String> {
    let mut rules = Vec::new();

    let kanji = [
        "亞=亜", "惡=悪", "壓=圧", "圍=囲", "醫=医", "榮=栄", "驛=駅", "圓=円", "鹽=塩",
        "櫻=桜", "假=仮", "會=会", "舊=旧", "擧=挙", "區=区", "縣=県", "廣=広", "國=国",
        "齋=斎", "齊=斉", "條=条", "狀=状", "眞=真", "澤=沢", "髙=高", "﨑=崎", "嵜=崎",
        "戶=戸", "邊=辺", "邉=辺", "濱=浜", "瀨=瀬", "德=徳", "當=当", "黑=黒", "龍=竜",
        "藏=蔵", "壽=寿", "檜=桧", "莊=荘", "將=将", "淺=浅", "萬=万", "與=与", "寶=宝",
        "曾=曽", "槇=槙",
    ];
    rules.extend(kanji.iter().map(|s| s.to_string()));

    rules.push("ヶ|ヵ|ケ|ガ|ゖ|ゕ=が".to_string());
    rules.push("ノ|之=の".to_string());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpaddr_core::VariantMap;

    #[test]
    fn test_standard_rules_parse() {
        let vm = VariantMap::from_rules(&standard_variant_rules());
        assert!(vm.len() > 40);
        assert_eq!(vm.fold('舊'), '旧');
        assert_eq!(vm.fold('ヶ'), 'が');
        assert_eq!(vm.fold('之'), 'の');
        assert!(vm.is_equivalent('澤', '沢'));
    }
}
