//! Ward names written without their designated city.
//!
//! `神奈川県中区本町…` names the ward of 横浜市 directly. Combined
//! `ward+oaza` keys are tried first and resolve down to the town; bare ward
//! keys need a known prefecture, since ward names repeat across the country.
use jpaddr_core::MatchLevel;

use super::oaza_chome::town_level;
use super::{best_group, each_query, same_pref, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

pub struct WardStage;

impl Stage for WardStage {
    fn name(&self) -> &'static str {
        "ward"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        each_query(queries, |q| {
            if q.match_level > MatchLevel::Prefecture {
                return Ok(Vec::new());
            }

            let mut towns = ctx
                .dicts
                .ward_oaza
                .find(&q.remainder, opts.fuzzy_char, &[], false);
            towns.retain(|m| same_pref(q, m.value.pref_key));
            let towns = best_group(towns);
            if !towns.is_empty() {
                return Ok(towns
                    .iter()
                    .map(|m| {
                        let level = town_level(m.value);
                        q.advance(m, level, |n| n.apply_town(m.value, level))
                    })
                    .collect());
            }

            let Some(trie) = q.keys.pref_key.and_then(|k| ctx.dicts.wards_by_pref.get(&k)) else {
                return Ok(Vec::new());
            };
            Ok(best_group(trie.find(&q.remainder, opts.fuzzy_char, &[], false))
                .iter()
                .map(|m| {
                    q.advance(m, MatchLevel::Ward, |n| {
                        n.apply_city(m.value, MatchLevel::Ward)
                    })
                })
                .collect())
        })
    }
}
