//! UNKNOWN / PREFECTURE → CITY.
use jpaddr_core::MatchLevel;

use super::{best_group, each_query, same_pref, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

/// Matches `county+city` or a bare city name. A query whose prefecture is
/// known only accepts cities of that prefecture.
pub struct CountyCityStage;

impl Stage for CountyCityStage {
    fn name(&self) -> &'static str {
        "county_city"
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
            let mut found = ctx.dicts.cities.find(&q.remainder, opts.fuzzy_char, &[], false);
            found.retain(|m| same_pref(q, m.value.pref_key));
            Ok(best_group(found)
                .iter()
                .map(|m| {
                    q.advance(m, MatchLevel::City, |n| {
                        n.apply_city(m.value, MatchLevel::City)
                    })
                })
                .collect())
        })
    }
}
