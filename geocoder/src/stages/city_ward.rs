//! CITY → WARD for designated cities, and `city+ward` from scratch.
use jpaddr_core::MatchLevel;

use super::{best_group, each_query, same_pref, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

pub struct CityWardStage;

impl Stage for CityWardStage {
    fn name(&self) -> &'static str {
        "city_ward"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        each_query(queries, |q| {
            let found = match q.match_level {
                MatchLevel::City if q.fields.ward.is_none() => {
                    let (Some(pref_key), Some(city)) = (q.keys.pref_key, q.fields.city.clone())
                    else {
                        return Ok(Vec::new());
                    };
                    match ctx.dicts.wards_by_city.get(&(pref_key, city)) {
                        Some(trie) => trie.find(&q.remainder, opts.fuzzy_char, &[], false),
                        None => return Ok(Vec::new()),
                    }
                }
                MatchLevel::Unknown | MatchLevel::Prefecture => {
                    let mut found =
                        ctx.dicts
                            .city_wards
                            .find(&q.remainder, opts.fuzzy_char, &[], false);
                    found.retain(|m| same_pref(q, m.value.pref_key));
                    found
                }
                _ => return Ok(Vec::new()),
            };
            Ok(best_group(found)
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
