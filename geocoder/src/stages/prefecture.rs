//! UNKNOWN → PREFECTURE.
use jpaddr_core::MatchLevel;

use super::{best_group, each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

/// Matches a leading prefecture name, completing a missing 都/道/府/県.
///
/// When the suffix was supplied rather than read (`福島市…` → `福島県`), the
/// seed query is kept beside the match so the city stage can still read
/// `福島市`.
pub struct PrefectureStage;

impl Stage for PrefectureStage {
    fn name(&self) -> &'static str {
        "prefecture"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        each_query(queries, |q| {
            if q.match_level != MatchLevel::Unknown {
                return Ok(Vec::new());
            }
            let found = best_group(ctx.dicts.prefectures.find(
                &q.remainder,
                opts.fuzzy_char,
                &ctx.pref_suffixes,
                false,
            ));
            let mut out: Vec<Query> = found
                .iter()
                .map(|m| q.advance(m, MatchLevel::Prefecture, |n| n.apply_pref(m.value)))
                .collect();
            if found.iter().any(|m| m.challenge.is_some()) {
                out.push(q.clone());
            }
            Ok(out)
        })
    }
}
