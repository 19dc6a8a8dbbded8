//! Town level → PARCEL.
use jpaddr_core::MatchLevel;

use super::{each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;
use crate::records::parcel_id;

/// Looks up parcel numbers (`2-16`, `2番地16`, `2335`) for queries still at
/// town level, i.e. towns without residential addressing or whose block
/// lookup found nothing. Up to three numbers are read; when the full id has
/// no row, trailing numbers are dropped one at a time.
pub struct ParcelStage;

impl Stage for ParcelStage {
    fn name(&self) -> &'static str {
        "parcel"
    }

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>> {
        if !opts.target.wants_parcel() {
            return Ok(queries);
        }
        each_query(queries, |q| {
            if !q.match_level.is_town() {
                return Ok(Vec::new());
            }
            let Some(city_key) = q.keys.city_key else {
                return Ok(Vec::new());
            };
            let text = q.remainder.to_normalized_string();
            let Some(caps) = ctx.patterns.parcel.captures(&text) else {
                return Ok(Vec::new());
            };
            let nums: Vec<_> = (1..=3).map_while(|i| caps.get(i)).collect();

            for used in (1..=nums.len()).rev() {
                let prc_id = parcel_id(
                    nums[0].as_str(),
                    nums.get(1).filter(|_| used >= 2).map(|m| m.as_str()),
                    nums.get(2).filter(|_| used >= 3).map(|m| m.as_str()),
                );
                let rows = ctx.provider().parcels(city_key, q.keys.town_key, &prc_id)?;
                if rows.is_empty() {
                    continue;
                }
                let end = if used == nums.len() {
                    caps[0].len()
                } else {
                    nums[used - 1].end()
                };
                let consumed = text[..end].chars().count();
                return Ok(rows
                    .iter()
                    .map(|p| {
                        q.consume_to(consumed, MatchLevel::Parcel, |n| n.apply_parcel(p))
                    })
                    .collect());
            }
            Ok(Vec::new())
        })
    }
}
