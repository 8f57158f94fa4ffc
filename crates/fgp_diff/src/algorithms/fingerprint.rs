//! Fingerprint matcher: decoration, top-down, bottom-up, optional refinement.

use std::time::Instant;

use logging_timer::time;

use super::{ComputeTime, PhaseDurations, tr};
use crate::errors::{Result, Side};
use crate::matchers::Mapper;
use crate::matchers::heuristic::fgp::bottom_up_matcher::{
    BottomUpMatcher, BottomUpStats, nodes_in_unmatched_subtrees,
};
use crate::matchers::heuristic::fgp::feature_table::FeatureTable;
use crate::matchers::heuristic::fgp::fgp_tree::{FgpTree, MatchFlags};
use crate::matchers::heuristic::fgp::scored_mapping::{CostState, Refiner, ScoredMapping};
use crate::matchers::heuristic::fgp::top_down_matcher::TopDownMatcher;
use crate::matchers::heuristic::fgp::{FingerprintMatcherConfig, NodeIdx, RefinementConfig};
use crate::matchers::mapping_store::{MappingStore, VecStore};
use crate::matchers::optimal::zs::ZsMatcher;
use crate::tree::SourceTree;

/// Outcome of the randomised refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementStats {
    pub iterations: usize,
    pub swaps: usize,
    pub before: CostState,
    pub after: CostState,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MatchStats {
    pub durations: PhaseDurations,
    pub src_nodes: usize,
    pub dst_nodes: usize,
    /// Identical subtrees mapped at once by the top-down phase.
    pub top_down_full_mappings: usize,
    pub top_down_mappings: usize,
    pub bottom_up: BottomUpStats,
    pub mappings: usize,
    pub refinement: Option<RefinementStats>,
}

impl ComputeTime for MatchStats {
    fn time(&self) -> f64 {
        self.durations.time()
    }
}

pub struct MatchResult {
    pub mapper: Mapper<VecStore<NodeIdx>>,
    pub stats: MatchStats,
}

pub struct FingerprintMatcher;

impl FingerprintMatcher {
    /// Maps the nodes of `src` to the nodes of `dst`.
    ///
    /// Roots are not linked unconditionally, they are usually matched like
    /// any other node.
    pub fn match_trees<T: SourceTree>(
        src: &T,
        dst: &T,
        config: &FingerprintMatcherConfig,
    ) -> Result<Mapper<VecStore<NodeIdx>>> {
        Self::match_with_stats(src, dst, config).map(|r| r.mapper)
    }

    pub fn match_with_stats<T: SourceTree>(
        src: &T,
        dst: &T,
        config: &FingerprintMatcherConfig,
    ) -> Result<MatchResult> {
        let now = Instant::now();
        let (src_arena, dst_arena) = decorate(src, dst, config)?;
        let decoration_t = now.elapsed();
        let (src_nodes, dst_nodes) = (src_arena.len(), dst_arena.len());
        tr!(decoration_t, src_nodes, dst_nodes);

        let mut flags = MatchFlags::new(src_nodes, dst_nodes);
        let mut mappings = VecStore::<NodeIdx>::default();
        mappings.topit(src_nodes, dst_nodes);

        let now = Instant::now();
        let top_down_full_mappings =
            top_down(&src_arena, &dst_arena, &mut flags, &mut mappings, config)?;
        let top_down_t = now.elapsed();
        let top_down_mappings = mappings.len();
        tr!(top_down_t, top_down_mappings);

        let now = Instant::now();
        let (bottom_up_stats, refinement, refinement_t) = match &config.refinement {
            None => {
                let stats = bottom_up(&src_arena, &dst_arena, &mut flags, &mut mappings, config)?;
                (stats, None, Default::default())
            }
            Some(refinement) => refined_bottom_up(
                &src_arena,
                &dst_arena,
                &mut flags,
                &mut mappings,
                config,
                refinement,
            )?,
        };
        let bottom_up_t = now.elapsed().saturating_sub(refinement_t);
        let bottom_up_mappings = mappings.len();
        tr!(bottom_up_t, refinement_t, bottom_up_mappings);

        let stats = MatchStats {
            durations: PhaseDurations {
                decoration: decoration_t,
                top_down: top_down_t,
                bottom_up: bottom_up_t,
                refinement: refinement_t,
            },
            src_nodes,
            dst_nodes,
            top_down_full_mappings,
            top_down_mappings,
            bottom_up: bottom_up_stats,
            mappings: bottom_up_mappings,
            refinement,
        };
        log::debug!(
            "matched {} of {} x {} nodes in {:.6}s",
            stats.mappings,
            src_nodes,
            dst_nodes,
            stats.time()
        );
        Ok(MatchResult {
            mapper: Mapper {
                src_arena,
                dst_arena,
                mappings,
            },
            stats,
        })
    }
}

/// Builds both arenas against shared fingerprint tables.
#[time("debug")]
fn decorate<T: SourceTree>(
    src: &T,
    dst: &T,
    config: &FingerprintMatcherConfig,
) -> Result<(FgpTree, FgpTree)> {
    let mut table = FeatureTable::new(config.non_locality);
    let mut src = FgpTree::new(src, Side::Src)?;
    let mut dst = FgpTree::new(dst, Side::Dst)?;
    table.add_tree(&mut src);
    table.add_tree(&mut dst);
    log::debug!(
        "{} shape and {} content fingerprints",
        table.shape_fingerprints().len(),
        table.content_fingerprints().len()
    );
    Ok((src, dst))
}

#[time("debug")]
fn top_down(
    src: &FgpTree,
    dst: &FgpTree,
    flags: &mut MatchFlags,
    mappings: &mut VecStore<NodeIdx>,
    config: &FingerprintMatcherConfig,
) -> Result<usize> {
    TopDownMatcher::new(src, dst, flags, mappings).execute(config.top_down_min_depth)
}

#[time("debug")]
fn bottom_up(
    src: &FgpTree,
    dst: &FgpTree,
    flags: &mut MatchFlags,
    mappings: &mut VecStore<NodeIdx>,
    config: &FingerprintMatcherConfig,
) -> Result<BottomUpStats> {
    BottomUpMatcher::new(src, dst, flags, config, &ZsMatcher).execute(mappings)
}

/// Bottom-up into a scored mapping where top-down pairs are fixed, then
/// hill climbing over the nodes the top-down phase left.
#[time("debug")]
fn refined_bottom_up(
    src: &FgpTree,
    dst: &FgpTree,
    flags: &mut MatchFlags,
    mappings: &mut VecStore<NodeIdx>,
    config: &FingerprintMatcherConfig,
    refinement: &RefinementConfig,
) -> Result<(BottomUpStats, Option<RefinementStats>, std::time::Duration)> {
    let mut scored = ScoredMapping::new(src, dst);
    scored.add_mappings(&*mappings, true)?;
    let nodes_a = nodes_in_unmatched_subtrees(src, |n| flags.is_src(n), 0);
    let nodes_b = nodes_in_unmatched_subtrees(dst, |n| flags.is_dst(n), 0);

    let stats = BottomUpMatcher::new(src, dst, flags, config, &ZsMatcher).execute(&mut scored)?;

    let now = Instant::now();
    let before = scored.cost_state();
    let refiner = Refiner::new(&mut scored, nodes_a.clone(), nodes_b, refinement);
    let iterations = refiner.iterations();
    let swaps = refiner.run()?;
    let after = scored.cost_state();
    let refinement_t = now.elapsed();
    log::debug!("refinement: {before} -> {after}, {swaps} swaps in {iterations} iterations");

    for a in nodes_a {
        if let Some(b) = scored.dst_of(a) {
            mappings.link(a, b);
        }
    }
    let refinement = RefinementStats {
        iterations,
        swaps,
        before,
        after,
    };
    Ok((stats, Some(refinement), refinement_t))
}
