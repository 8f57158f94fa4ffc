//! Scores used to rank candidate pairs.
//!
//! The top-down matcher only breaks ties between nodes sharing a
//! fingerprint, with [`content_tie_score`] and [`shape_context_score`].
//! The bottom-up matcher is driven by a [`ScoringStrategy`], chosen with
//! [`ScoringMode`].

use super::context_table::ContextSimilarityTable;
use super::feature_vector::jaccard_from_parts;
use super::fgp_tree::{FgpNode, FgpTree};
use super::{NodeIdx, ScoringMode};
use crate::errors::Result;
use crate::matchers::mapping_store::MonoMappingStore;

const TREE_WEIGHT: f64 = 0.005;
const SIBLING_WEIGHT: f64 = 0.05;

/// Pluggable ranking of bottom-up candidates.
///
/// Priorities are only compared with each other, larger is better.
/// For every pair, `upper_bound` must never be below `score`, the bottom-up
/// matcher relies on it to stop evaluating pairs early.
pub trait ScoringStrategy {
    fn local_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64>;
    fn context_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64>;
    /// Cheap bound on the priority, `None` when the pair is not worth considering.
    fn upper_bound(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>>;
    /// Exact priority, `None` when the pair falls below the threshold.
    fn score(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>>;
}

impl ScoringMode {
    pub fn strategy<'a>(
        &self,
        src: &'a FgpTree,
        dst: &'a FgpTree,
        src_nodes: &[NodeIdx],
        dst_nodes: &[NodeIdx],
        threshold: f64,
    ) -> Box<dyn ScoringStrategy + 'a> {
        match self {
            ScoringMode::AncestryContext { sibling_weight } => Box::new(AncestryScoring {
                table: ContextSimilarityTable::new(
                    src,
                    dst,
                    src_nodes,
                    dst_nodes,
                    *sibling_weight,
                ),
                threshold,
            }),
            ScoringMode::Histogram => Box::new(HistogramScoring {
                src,
                dst,
                threshold,
            }),
            ScoringMode::Cost => Box::new(CostScoring {
                src,
                dst,
                threshold,
            }),
        }
    }
}

pub struct AncestryScoring<'a> {
    table: ContextSimilarityTable<'a>,
    threshold: f64,
}

impl ScoringStrategy for AncestryScoring<'_> {
    fn local_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        self.table.local_similarity(a, b)
    }

    fn context_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        self.table.context_similarity(a, b)
    }

    fn upper_bound(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>> {
        if self.table.local_similarity_upper_bound(a, b) <= self.threshold {
            return Ok(None);
        }
        self.table.in_context_similarity_upper_bound(a, b).map(Some)
    }

    fn score(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>> {
        if self.table.local_similarity(a, b)? < self.threshold {
            return Ok(None);
        }
        self.table.in_context_similarity(a, b).map(Some)
    }
}

pub struct HistogramScoring<'a> {
    src: &'a FgpTree,
    dst: &'a FgpTree,
    threshold: f64,
}

impl ScoringStrategy for HistogramScoring<'_> {
    fn local_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        let (a, b) = (&self.src[a], &self.dst[b]);
        a.node_features.jaccard_similarity(&b.node_features)
    }

    fn context_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        histogram_context(&self.src[a], &self.dst[b])
    }

    fn upper_bound(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>> {
        let ub = histogram_score_upper_bound(&self.src[a], &self.dst[b]);
        Ok((ub > self.threshold).then_some(ub))
    }

    fn score(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>> {
        let score = self.local_similarity(a, b)? + self.context_similarity(a, b)?;
        Ok((score >= self.threshold).then_some(score))
    }
}

/// Ranks by smallest cost, priorities are negated costs.
pub struct CostScoring<'a> {
    src: &'a FgpTree,
    dst: &'a FgpTree,
    threshold: f64,
}

impl ScoringStrategy for CostScoring<'_> {
    fn local_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        let (a, b) = (&self.src[a], &self.dst[b]);
        a.node_features.jaccard_similarity(&b.node_features)
    }

    fn context_similarity(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        histogram_context(&self.src[a], &self.dst[b])
    }

    fn upper_bound(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>> {
        let (a, b) = (&self.src[a], &self.dst[b]);
        if a.node_features.jaccard_similarity_upper_bound(&b.node_features) <= self.threshold {
            return Ok(None);
        }
        Ok(Some(-histogram_cost_lower_bound(a, b)))
    }

    fn score(&mut self, a: NodeIdx, b: NodeIdx) -> Result<Option<f64>> {
        if self.local_similarity(a, b)? < self.threshold {
            return Ok(None);
        }
        Ok(Some(-histogram_cost(&self.src[a], &self.dst[b])))
    }
}

/// `min / max` of two tree weights, close to zero when both are zero.
pub fn tree_weight_similarity(a: f64, b: f64) -> f64 {
    a.min(b) / (a.max(b) + 1.0e-9)
}

fn sibling_similarities(a: &FgpNode, b: &FgpNode) -> Result<(f64, f64)> {
    Ok((
        a.left_sibling_features
            .jaccard_similarity(&b.left_sibling_features)?,
        a.right_sibling_features
            .jaccard_similarity(&b.right_sibling_features)?,
    ))
}

/// Positional similarity used to order nodes sharing a shape fingerprint.
pub fn shape_context_score(a: &FgpNode, b: &FgpNode) -> Result<f64> {
    let (left, right) = sibling_similarities(a, b)?;
    Ok(tree_weight_similarity(a.left_tree_weight, b.left_tree_weight)
        + tree_weight_similarity(a.right_tree_weight, b.right_tree_weight)
        + left * 10.0
        + right * 10.0)
}

/// Score used to order nodes sharing a content fingerprint.
///
/// Identical subtrees only differ by where they sit, so on top of the
/// positional similarity, the similarity of the parents counts, with
/// descendants already mapped across them credited to the intersection.
pub fn content_tie_score<M>(
    src: &FgpTree,
    dst: &FgpTree,
    a: NodeIdx,
    b: NodeIdx,
    mappings: &M,
) -> Result<f64>
where
    M: MonoMappingStore<Src = NodeIdx, Dst = NodeIdx>,
{
    let context = shape_context_score(&src[a], &dst[b])?;
    let (Some(pa), Some(pb)) = (src.parent(a), dst.parent(b)) else {
        return Ok(context);
    };
    let (intersection, union) = src[pa]
        .node_features
        .jaccard_parts(&dst[pb].node_features);
    let additive = mapped_descendants_with_changes(src, dst, pa, pb, mappings) as f64;
    Ok(context + jaccard_from_parts(intersection + additive, union)? * 100.0)
}

/// Descendants of `a` mapped into the subtree of `b` whose contents differ.
pub fn mapped_descendants_with_changes<M>(
    src: &FgpTree,
    dst: &FgpTree,
    a: NodeIdx,
    b: NodeIdx,
    mappings: &M,
) -> usize
where
    M: MonoMappingStore<Src = NodeIdx, Dst = NodeIdx>,
{
    src.descendants(a)
        .filter(|t| {
            mappings.get_dst(t).is_some_and(|m| {
                m != b
                    && dst.is_in_subtree(m, b)
                    && src[*t].content_fingerprint != dst[m].content_fingerprint
            })
        })
        .count()
}

pub fn histogram_context(a: &FgpNode, b: &FgpNode) -> Result<f64> {
    let (left, right) = sibling_similarities(a, b)?;
    Ok(weighted_context(a, b, left, right))
}

fn weighted_context(a: &FgpNode, b: &FgpNode, left: f64, right: f64) -> f64 {
    tree_weight_similarity(a.left_tree_weight, b.left_tree_weight) * TREE_WEIGHT
        + tree_weight_similarity(a.right_tree_weight, b.right_tree_weight) * TREE_WEIGHT
        + left * SIBLING_WEIGHT
        + right * SIBLING_WEIGHT
}

pub fn histogram_score_upper_bound(a: &FgpNode, b: &FgpNode) -> f64 {
    let left = a
        .left_sibling_features
        .jaccard_similarity_upper_bound(&b.left_sibling_features);
    let right = a
        .right_sibling_features
        .jaccard_similarity_upper_bound(&b.right_sibling_features);
    a.node_features
        .jaccard_similarity_upper_bound(&b.node_features)
        + weighted_context(a, b, left, right)
}

fn tree_weight_costs(a: &FgpNode, b: &FgpNode) -> f64 {
    (a.left_tree_weight - b.left_tree_weight).abs() * TREE_WEIGHT
        + (a.right_tree_weight - b.right_tree_weight).abs() * TREE_WEIGHT
}

pub fn histogram_cost(a: &FgpNode, b: &FgpNode) -> f64 {
    a.node_features.cost(&b.node_features)
        + tree_weight_costs(a, b)
        + a.left_sibling_features.cost(&b.left_sibling_features) * SIBLING_WEIGHT
        + a.right_sibling_features.cost(&b.right_sibling_features) * SIBLING_WEIGHT
}

pub fn histogram_cost_lower_bound(a: &FgpNode, b: &FgpNode) -> f64 {
    a.node_features.cost_lower_bound(&b.node_features)
        + tree_weight_costs(a, b)
        + a.left_sibling_features
            .cost_lower_bound(&b.left_sibling_features)
            * SIBLING_WEIGHT
        + a.right_sibling_features
            .cost_lower_bound(&b.right_sibling_features)
            * SIBLING_WEIGHT
}
