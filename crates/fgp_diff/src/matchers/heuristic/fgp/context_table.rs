use super::NodeIdx;
use super::fgp_tree::FgpTree;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimKind {
    InContext = 0,
    UpperBound = 1,
    Local = 2,
}

const KINDS: usize = 3;
const UNSET: f64 = -1.0;

/// Memoized ancestry weighted similarities between two sets of nodes.
///
/// The similarity of `x` and `y` in context is their local similarity times
/// the similarity of their contexts, itself obtained recursively from their
/// ancestors. When the nodes are not at the same distance from their roots,
/// the deeper one climbs alone or both climb, whichever scores best.
pub struct ContextSimilarityTable<'a> {
    src: &'a FgpTree,
    dst: &'a FgpTree,
    src_ids: Vec<Option<u32>>,
    dst_ids: Vec<Option<u32>>,
    n_dst: usize,
    scores: Vec<f64>,
    sibling_weight: f64,
}

impl<'a> ContextSimilarityTable<'a> {
    pub fn new(
        src: &'a FgpTree,
        dst: &'a FgpTree,
        src_nodes: &[NodeIdx],
        dst_nodes: &[NodeIdx],
        sibling_weight: f64,
    ) -> Self {
        let mut src_ids = vec![None; src.len()];
        for (i, x) in src_nodes.iter().enumerate() {
            src_ids[*x as usize] = Some(i as u32);
        }
        let mut dst_ids = vec![None; dst.len()];
        for (i, y) in dst_nodes.iter().enumerate() {
            dst_ids[*y as usize] = Some(i as u32);
        }
        Self {
            src,
            dst,
            src_ids,
            dst_ids,
            n_dst: dst_nodes.len(),
            scores: vec![UNSET; src_nodes.len() * dst_nodes.len() * KINDS],
            sibling_weight,
        }
    }

    pub fn local_similarity(&mut self, x: NodeIdx, y: NodeIdx) -> Result<f64> {
        self.similarity(x, y, SimKind::Local)
    }

    pub fn local_similarity_upper_bound(&self, x: NodeIdx, y: NodeIdx) -> f64 {
        self.src[x]
            .node_features
            .jaccard_similarity_upper_bound(&self.dst[y].node_features)
    }

    pub fn in_context_similarity(&mut self, x: NodeIdx, y: NodeIdx) -> Result<f64> {
        self.similarity(x, y, SimKind::InContext)
    }

    pub fn in_context_similarity_upper_bound(&mut self, x: NodeIdx, y: NodeIdx) -> Result<f64> {
        self.similarity(x, y, SimKind::UpperBound)
    }

    pub fn context_similarity(&mut self, x: NodeIdx, y: NodeIdx) -> Result<f64> {
        self.context(x, y, SimKind::InContext)
    }

    pub fn context_similarity_upper_bound(&mut self, x: NodeIdx, y: NodeIdx) -> Result<f64> {
        self.context(x, y, SimKind::UpperBound)
    }

    fn slot(&self, x: NodeIdx, y: NodeIdx, kind: SimKind) -> Option<usize> {
        let i = self.src_ids[x as usize]? as usize;
        let j = self.dst_ids[y as usize]? as usize;
        Some((i * self.n_dst + j) * KINDS + kind as usize)
    }

    fn similarity(&mut self, x: NodeIdx, y: NodeIdx, kind: SimKind) -> Result<f64> {
        let slot = self.slot(x, y, kind);
        if let Some(score) = slot.map(|s| self.scores[s]).filter(|s| *s >= 0.0) {
            return Ok(score);
        }
        let score = match kind {
            SimKind::Local => self.src[x]
                .node_features
                .jaccard_similarity(&self.dst[y].node_features)?,
            SimKind::InContext => {
                self.similarity(x, y, SimKind::Local)? * self.context(x, y, kind)?
            }
            SimKind::UpperBound => {
                self.local_similarity_upper_bound(x, y) * self.context(x, y, kind)?
            }
        };
        if let Some(s) = slot {
            self.scores[s] = score;
        }
        Ok(score)
    }

    fn context(&mut self, x: NodeIdx, y: NodeIdx, kind: SimKind) -> Result<f64> {
        let ancestry = self.ancestry(x, y, kind)?;
        if self.sibling_weight <= 0.0 {
            return Ok(ancestry);
        }
        let siblings = self.sibling_similarity(x, y, kind)?;
        let w = self.sibling_weight;
        Ok(ancestry / (1.0 + w) + siblings * w / (1.0 + w))
    }

    fn ancestry(&mut self, x: NodeIdx, y: NodeIdx, kind: SimKind) -> Result<f64> {
        let (nx, ny) = (&self.src[x], &self.dst[y]);
        let (px, py) = (nx.parent, ny.parent);
        Ok(match nx.dist_from_root.cmp(&ny.dist_from_root) {
            std::cmp::Ordering::Equal => match (px, py) {
                (Some(px), Some(py)) => self.similarity(px, py, kind)?,
                // roots have nothing to compare
                _ => 1.0,
            },
            std::cmp::Ordering::Greater => match (px, py) {
                (Some(px), None) => self.similarity(px, y, kind)?,
                (Some(px), Some(py)) => {
                    f64::max(self.similarity(px, y, kind)?, self.similarity(px, py, kind)?)
                }
                (None, _) => 1.0,
            },
            std::cmp::Ordering::Less => match (px, py) {
                (None, Some(py)) => self.similarity(x, py, kind)?,
                (Some(px), Some(py)) => {
                    f64::max(self.similarity(x, py, kind)?, self.similarity(px, py, kind)?)
                }
                (_, None) => 1.0,
            },
        })
    }

    /// Mean similarity of the siblings on both sides.
    fn sibling_similarity(&self, x: NodeIdx, y: NodeIdx, kind: SimKind) -> Result<f64> {
        let (nx, ny) = (&self.src[x], &self.dst[y]);
        let (left, right) = match kind {
            SimKind::UpperBound => (
                nx.left_sibling_features
                    .jaccard_similarity_upper_bound(&ny.left_sibling_features),
                nx.right_sibling_features
                    .jaccard_similarity_upper_bound(&ny.right_sibling_features),
            ),
            _ => (
                nx.left_sibling_features
                    .jaccard_similarity(&ny.left_sibling_features)?,
                nx.right_sibling_features
                    .jaccard_similarity(&ny.right_sibling_features)?,
            ),
        };
        Ok((left + right) * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Side;
    use crate::matchers::heuristic::fgp::feature_table::FeatureTable;
    use crate::tests::tree;

    fn decorated(
        a: crate::tree::simple_tree::SimpleTree,
        b: crate::tree::simple_tree::SimpleTree,
    ) -> (FgpTree, FgpTree) {
        let mut table = FeatureTable::default();
        let mut a = FgpTree::new(&a.with_preorder_ids(), Side::Src).unwrap();
        let mut b = FgpTree::new(&b.with_preorder_ids(), Side::Dst).unwrap();
        table.add_tree(&mut a);
        table.add_tree(&mut b);
        (a, b)
    }

    #[test]
    fn context_weights_local_similarity() {
        let (a, b) = decorated(
            tree!(0; [tree!(1, "p"; [tree!(2, "x"; [tree!(3, "l")])]), tree!(4, "q")]),
            tree!(0; [tree!(1, "p"; [tree!(2, "x"; [tree!(3, "l")])]), tree!(4, "r")]),
        );
        let all_a: Vec<_> = (0..a.len() as u32).collect();
        let all_b: Vec<_> = (0..b.len() as u32).collect();
        let mut table = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, 0.0);
        // p(x(l)) is identical on both sides
        assert_eq!(table.local_similarity(1, 1), Ok(1.0));
        let roots = table.local_similarity(0, 0).unwrap();
        assert!(roots < 1.0);
        assert_eq!(table.in_context_similarity(0, 0), Ok(roots));
        assert_eq!(table.context_similarity(1, 1), Ok(roots));
        assert_eq!(table.in_context_similarity(1, 1), Ok(roots));
        assert_eq!(table.in_context_similarity(2, 2), Ok(roots));
        // memoized values are stable
        assert_eq!(table.in_context_similarity(2, 2), Ok(roots));
    }

    #[test]
    fn unequal_depths_take_the_best_ancestry() {
        // x(l) is wrapped in an extra w on the right
        let (a, b) = decorated(
            tree!(0; [tree!(2, "x"; [tree!(3, "l")])]),
            tree!(0; [tree!(5, "w"; [tree!(2, "x"; [tree!(3, "l")])])]),
        );
        let all_a: Vec<_> = (0..a.len() as u32).collect();
        let all_b: Vec<_> = (0..b.len() as u32).collect();
        let mut table = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, 0.0);
        // either w absorbed the extra nesting, or both parents are compared
        let x_vs_w = table.in_context_similarity(1, 1).unwrap();
        let root_vs_w = table.in_context_similarity(0, 1).unwrap();
        let expected = f64::max(x_vs_w, root_vs_w);
        assert_eq!(table.context_similarity(1, 2), Ok(expected));
        let ub = table.in_context_similarity_upper_bound(1, 2).unwrap();
        assert!(ub >= table.in_context_similarity(1, 2).unwrap());
        assert!(table.context_similarity_upper_bound(1, 2).unwrap() >= expected);
    }

    #[test]
    fn nodes_outside_the_table_are_computed_uncached() {
        let (a, b) = decorated(
            tree!(0; [tree!(1, "p"; [tree!(2, "x"; [tree!(3, "l")])])]),
            tree!(0; [tree!(1, "p"; [tree!(2, "x"; [tree!(3, "m")])])]),
        );
        let mut partial = ContextSimilarityTable::new(&a, &b, &[2], &[2], 0.0);
        let all_a: Vec<_> = (0..a.len() as u32).collect();
        let all_b: Vec<_> = (0..b.len() as u32).collect();
        let mut full = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, 0.0);
        assert_eq!(
            partial.in_context_similarity(2, 2),
            full.in_context_similarity(2, 2)
        );
    }

    #[test]
    fn sibling_weight_blends_siblings() {
        let (a, b) = decorated(
            tree!(0; [tree!(4, "s"), tree!(2, "x"; [tree!(3, "l")])]),
            tree!(0; [tree!(4, "t"), tree!(2, "x"; [tree!(3, "l")])]),
        );
        let all_a: Vec<_> = (0..a.len() as u32).collect();
        let all_b: Vec<_> = (0..b.len() as u32).collect();
        let mut plain = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, 0.0);
        let mut blended = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, 1.0);
        let ancestry = plain.context_similarity(2, 2).unwrap();
        // different left siblings, no right siblings, and the roots are blended too
        assert_eq!(blended.context_similarity(2, 2), Ok(ancestry / 4.0));
    }

    #[test]
    fn roots_are_blended_with_empty_siblings() {
        let (a, b) = decorated(
            tree!(0; [tree!(2, "x"; [tree!(3, "l")])]),
            tree!(0; [tree!(2, "x"; [tree!(3, "m")])]),
        );
        let all_a: Vec<_> = (0..a.len() as u32).collect();
        let all_b: Vec<_> = (0..b.len() as u32).collect();
        let mut plain = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, 0.0);
        assert_eq!(plain.context_similarity(0, 0), Ok(1.0));
        for w in [1.0, 0.25] {
            let mut blended = ContextSimilarityTable::new(&a, &b, &all_a, &all_b, w);
            assert_eq!(blended.context_similarity(0, 0), Ok(1.0 / (1.0 + w)));
            assert_eq!(blended.context_similarity_upper_bound(0, 0), Ok(1.0 / (1.0 + w)));
            let local = blended.local_similarity(0, 0).unwrap();
            assert_eq!(blended.in_context_similarity(0, 0), Ok(local / (1.0 + w)));
        }
    }
}
