//! Final selection among the surviving candidates.
use std::cmp::Ordering;

use super::Stage;
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

/// Order of preference: higher match level, then higher coordinate level,
/// then fewer wildcards, then more consumed characters.
pub fn compare(a: &Query, b: &Query) -> Ordering {
    a.match_level
        .cmp(&b.match_level)
        .then_with(|| a.coordinate_level.cmp(&b.coordinate_level))
        .then_with(|| b.ambiguous_cnt.cmp(&a.ambiguous_cnt))
        .then_with(|| a.matched_cnt.cmp(&b.matched_cnt))
}

/// Best query; the first one seen wins ties.
pub fn select_best(queries: Vec<Query>) -> Option<Query> {
    let mut best: Option<Query> = None;
    for query in queries {
        match &best {
            Some(current) if compare(&query, current) != Ordering::Greater => {}
            _ => best = Some(query),
        }
    }
    best
}

pub struct AssembleStage;

impl Stage for AssembleStage {
    fn name(&self) -> &'static str {
        "assemble"
    }

    fn apply(
        &self,
        _ctx: &mut WorkerContext,
        _opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        let total = queries.len();
        let best: Vec<Query> = select_best(queries).into_iter().collect();
        if total > 1 {
            tracing::debug!(candidates = total, "selected best candidate");
        }
        Ok(best)
    }
}
