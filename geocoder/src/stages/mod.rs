//! Resolution pipeline.
//!
//! Each stage maps a list of queries to a refined list. A stage only acts on
//! queries at the levels it handles; every other query, and every query it
//! fails to match, passes through unchanged, so no stage ever shrinks the
//! list to nothing.
use jpaddr_core::trie::rank_matches;
use jpaddr_core::TrieMatch;

use crate::engine::{SearchOptions, WorkerContext};
use crate::error::Result;
use crate::query::Query;
use crate::records::PrefKey;

pub mod assemble;
pub mod city_ward;
pub mod cleanup;
pub mod county_city;
pub mod oaza_chome;
pub mod parcel;
pub mod prefecture;
pub mod rsdt_blk;
pub mod rsdt_dsp;
pub mod tokyo23;
pub mod ward;

pub use assemble::select_best;

/// One step of the pipeline.
pub trait Stage: Send {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        ctx: &mut WorkerContext,
        opts: &SearchOptions,
        queries: Vec<Query>,
    ) -> Result<Vec<Query>>;
}

/// Ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Prefecture → county/city → city/ward → ward → Tokyo 23 wards →
    /// oaza/chome/koaza → residential block → residential sub-number →
    /// parcel → cleanup → assembly.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(prefecture::PrefectureStage),
            Box::new(county_city::CountyCityStage),
            Box::new(city_ward::CityWardStage),
            Box::new(ward::WardStage),
            Box::new(tokyo23::Tokyo23Stage),
            Box::new(oaza_chome::OazaChomeStage),
            Box::new(rsdt_blk::RsdtBlkStage),
            Box::new(rsdt_dsp::RsdtDspStage),
            Box::new(parcel::ParcelStage),
            Box::new(cleanup::CleanupStage),
            Box::new(assemble::AssembleStage),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage on `seed` and return the selected query.
    pub fn run(&self, ctx: &mut WorkerContext, opts: &SearchOptions, seed: Query) -> Result<Query> {
        let fallback = seed.clone();
        let mut queries = vec![seed];
        for stage in &self.stages {
            let before = queries.len();
            queries = stage.apply(ctx, opts, queries)?;
            tracing::debug!(
                stage = stage.name(),
                before,
                after = queries.len(),
                "stage applied"
            );
        }
        Ok(select_best(queries).unwrap_or(fallback))
    }
}

/// Apply `f` to every query, keeping a query unchanged when `f` yields no
/// refinement for it.
pub(crate) fn each_query<F>(queries: Vec<Query>, mut f: F) -> Result<Vec<Query>>
where
    F: FnMut(&Query) -> Result<Vec<Query>>,
{
    let mut out = Vec::with_capacity(queries.len());
    for query in queries {
        let refined = f(&query)?;
        if refined.is_empty() {
            out.push(query);
        } else {
            out.extend(refined);
        }
    }
    Ok(out)
}

/// Deepest candidates of a search, unambiguous first.
pub(crate) fn best_group<T>(mut found: Vec<TrieMatch<'_, T>>) -> Vec<TrieMatch<'_, T>> {
    rank_matches(&mut found);
    if let Some(depth) = found.first().map(|m| m.depth) {
        found.retain(|m| m.depth == depth);
    }
    found
}

/// A candidate from prefecture `pref_key` fits `query` unless the query
/// already resolved another prefecture.
pub(crate) fn same_pref(query: &Query, pref_key: PrefKey) -> bool {
    query.keys.pref_key.map_or(true, |k| k == pref_key)
}
