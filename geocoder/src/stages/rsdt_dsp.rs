//! RESIDENTIAL_BLOCK → RESIDENTIAL_DETAIL.
use jpaddr_core::MatchLevel;

use super::{each_query, Stage};
use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;
use crate::records::RsdtDspInfo;

/// Reads the residential number (`3`, `3号`, `3-2`) after a resolved block.
/// A second number is consumed only when a row carries it; otherwise it is
/// left for `other`.
pub struct RsdtDspStage;

impl Stage for RsdtDspStage {
    fn name(&self) -> &'static str {
        "rsdt_dsp"
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
            if q.match_level != MatchLevel::ResidentialBlock {
                return Ok(Vec::new());
            }
            let Some(blk_key) = q.keys.rsdtblk_key else {
                return Ok(Vec::new());
            };
            let text = q.remainder.to_normalized_string();
            let Some(caps) = ctx.patterns.rsdt_dsp.captures(&text) else {
                return Ok(Vec::new());
            };
            let num = &caps[2];
            let rows = ctx.provider().rsdt_dsps(blk_key)?;

            let emit = |rows: Vec<&RsdtDspInfo>, consumed: usize| -> Vec<Query> {
                rows.into_iter()
                    .map(|dsp| {
                        q.consume_to(consumed, MatchLevel::ResidentialDetail, |n| {
                            n.apply_rsdt_dsp(dsp)
                        })
                    })
                    .collect()
            };

            if let Some(num2) = caps.get(3) {
                let exact: Vec<&RsdtDspInfo> = rows
                    .iter()
                    .filter(|d| d.rsdt_num == num && d.rsdt_num2 == num2.as_str())
                    .collect();
                if !exact.is_empty() {
                    return Ok(emit(exact, caps[0].chars().count()));
                }
            }
            let single: Vec<&RsdtDspInfo> = rows
                .iter()
                .filter(|d| d.rsdt_num == num && d.rsdt_num2.is_empty())
                .collect();
            Ok(emit(single, caps[1].chars().count()))
        })
    }
}
