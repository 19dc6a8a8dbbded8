//! Tokyo addresses that skip the ward name or its 区 suffix.
use jpaddr_core::MatchLevel;

use super::oaza_chome::town_level;
use super::{best_group, each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

const TOKYO_LG_PREFIX: &str = "13";

/// For `東京都` queries still at PREFECTURE level: town names of the 23
/// wards (`東京都紀尾井町…`), then ward names without `区`
/// (`東京都千代田紀尾井町…`).
pub struct Tokyo23Stage;

impl Stage for Tokyo23Stage {
    fn name(&self) -> &'static str {
        "tokyo23"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        each_query(queries, |q| {
            let is_tokyo = q
                .fields
                .lg_code
                .as_deref()
                .is_some_and(|c| c.starts_with(TOKYO_LG_PREFIX));
            if q.match_level != MatchLevel::Prefecture || !is_tokyo {
                return Ok(Vec::new());
            }

            let towns = best_group(ctx.dicts.tokyo23_towns.find(
                &q.remainder,
                opts.fuzzy_char,
                &[],
                false,
            ));
            if !towns.is_empty() {
                return Ok(towns
                    .iter()
                    .map(|m| {
                        let level = town_level(m.value);
                        q.advance(m, level, |n| n.apply_town(m.value, level))
                    })
                    .collect());
            }

            let wards = best_group(ctx.dicts.tokyo23_wards.find(
                &q.remainder,
                opts.fuzzy_char,
                &['区'],
                false,
            ));
            Ok(wards
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
