//! Town level → RESIDENTIAL_BLOCK.
use jpaddr_core::MatchLevel;

use super::{each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;

/// Reads the block number (`1-`, `1番`, `1番地`) of a town that uses
/// residential addressing and looks it up by town key.
pub struct RsdtBlkStage;

impl Stage for RsdtBlkStage {
    fn name(&self) -> &'static str {
        "rsdt_blk"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        if !opts.target.wants_residential() {
            return Ok(queries);
        }
        each_query(queries, |q| {
            if !q.match_level.is_town() || q.fields.rsdt_addr_flg != Some(true) {
                return Ok(Vec::new());
            }
            let Some(town_key) = q.keys.town_key else {
                return Ok(Vec::new());
            };
            let text = q.remainder.to_normalized_string();
            let Some(caps) = ctx.patterns.rsdt_blk.captures(&text) else {
                return Ok(Vec::new());
            };
            let consumed = caps[0].chars().count();
            let blks = ctx.provider().rsdt_blks(town_key, Some(&caps[1]))?;
            Ok(blks
                .iter()
                .map(|blk| {
                    q.consume_to(consumed, MatchLevel::ResidentialBlock, |n| {
                        n.apply_rsdt_blk(blk)
                    })
                })
                .collect())
        })
    }
}
