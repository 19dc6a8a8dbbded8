//! Drops separators left in front of the unmatched text.
use super::{each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;
use jpaddr_core::MatchLevel;

pub struct CleanupStage;

impl Stage for CleanupStage {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        _opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        each_query(queries, |q| {
            if q.match_level == MatchLevel::Unknown {
                return Ok(Vec::new());
            }
            let text = q.remainder.to_normalized_string();
            let Some(sep) = ctx.patterns.cleanup.find(&text) else {
                return Ok(Vec::new());
            };
            let n = sep.as_str().chars().count();
            Ok(vec![q.refine(|next| next.remainder.ignore_prefix(n))])
        })
    }
}
