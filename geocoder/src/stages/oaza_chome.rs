//! CITY / WARD → TOWN_LOCAL or MACHIAZA.
use jpaddr_core::MatchLevel;

use super::{best_group, each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::normalize::AddressNormalizer;
use crate::query::Query;
use crate::records::TownInfo;

/// Level reached by matching `town`.
pub(crate) fn town_level(town: &TownInfo) -> MatchLevel {
    if town.is_detailed() {
        MatchLevel::Machiaza
    } else {
        MatchLevel::TownLocal
    }
}

/// Trie keys of a town row.
///
/// Besides `oaza+chome+koaza`, a chome row is also reachable as
/// `oaza+N-`, the way chome numbers are usually written (`九段南1-2-1`).
pub(crate) fn town_keys(norm: &AddressNormalizer, town: &TownInfo) -> Vec<String> {
    let full = norm.key(&format!("{}{}{}", town.oaza_cho, town.chome, town.koaza));
    let mut keys = vec![full];
    if !town.chome.is_empty() && town.koaza.is_empty() {
        let digits: String = norm
            .key(&town.chome)
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            keys.push(format!("{}{}-", norm.key(&town.oaza_cho), digits));
        }
    }
    keys
}

/// Matches oaza/chome/koaza names within the resolved city or ward. A
/// leading 大字 or 字 is skipped, and a name cut short in the input is
/// accepted when it can only continue one way.
pub struct OazaChomeStage;

impl Stage for OazaChomeStage {
    fn name(&self) -> &'static str {
        "oaza_chome"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        each_query(queries, |q| {
            if !matches!(q.match_level, MatchLevel::City | MatchLevel::Ward) {
                return Ok(Vec::new());
            }
            let Some(city_key) = q.keys.city_key else {
                return Ok(Vec::new());
            };

            let mut remainder = q.remainder.clone();
            let normalized = remainder.to_normalized_string();
            if let Some(prefix) = ctx.patterns.oaza_prefix.find(&normalized) {
                remainder.ignore_prefix(prefix.as_str().chars().count());
            }

            let trie = ctx.town_trie(city_key)?;
            let found = best_group(trie.find(&remainder, opts.fuzzy_char, &[], true));
            Ok(found
                .iter()
                .map(|m| {
                    let level = town_level(m.value);
                    q.advance(m, level, |n| n.apply_town(m.value, level))
                })
                .collect())
        })
    }
}
