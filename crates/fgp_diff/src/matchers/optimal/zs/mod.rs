//! Zhang and Shasha edit distance algorithm for labeled trees, 1989
//!
//! works on the post-order [`RemainderTree`] views of two subtrees

use str_distance::DistanceMetric;

use super::{ExactMatcher, RemainderTree};
use crate::matchers::heuristic::fgp::NodeIdx;
use crate::matchers::mapping_store::{MonoMappingStore, VecStore};

/// Unit insertions and deletions, label updates cost their normalized Levenshtein distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZsMatcher;

impl ZsMatcher {
    /// Links post-order positions of `src` to post-order positions of `dst`.
    pub fn match_with<M>(src: &RemainderTree, dst: &RemainderTree) -> M
    where
        M: MonoMappingStore<Src = u32, Dst = u32>,
    {
        let mut mappings = M::default();
        mappings.topit(src.len() + 1, dst.len() + 1);
        let base = MatcherImpl {
            src_arena: src,
            dst_arena: dst,
        };
        let mut dist = base.compute_dist();
        base.compute_mappings(&mut mappings, &mut dist);
        mappings
    }
}

impl ExactMatcher for ZsMatcher {
    fn match_remainders(&self, src: &RemainderTree, dst: &RemainderTree) -> Vec<(NodeIdx, NodeIdx)> {
        Self::match_with::<VecStore<u32>>(src, dst)
            .iter()
            .map(|(i, j)| (src.node(i as usize), dst.node(j as usize)))
            .collect()
    }
}

struct MatcherImpl<'a, 'b> {
    src_arena: &'b RemainderTree<'a>,
    dst_arena: &'b RemainderTree<'a>,
}

struct ZsMatcherDist {
    tree: Vec<Vec<f64>>,
    forest: Vec<Vec<f64>>,
}

impl ZsMatcherDist {
    fn f_dist(&self, row: usize, col: usize) -> f64 {
        self.forest[row][col]
    }
}

impl MatcherImpl<'_, '_> {
    fn get_deletion_cost(&self, _di: usize) -> f64 {
        1.0
    }

    fn get_insertion_cost(&self, _dj: usize) -> f64 {
        1.0
    }

    fn get_update_cost(&self, di: usize, dj: usize) -> f64 {
        let n1 = &self.src_arena.tree()[self.src_arena.node(di)];
        let n2 = &self.dst_arena.tree()[self.dst_arena.node(dj)];
        if n1.kind != n2.kind {
            return f64::MAX;
        }
        match (n1.label.as_deref(), n2.label.as_deref()) {
            (l1, l2) if l1 == l2 => 0.0,
            (Some(l1), Some(l2)) => {
                str_distance::Levenshtein::default().normalized(l1.chars(), l2.chars())
            }
            _ => 1.0,
        }
    }

    fn compute_dist(&self) -> ZsMatcherDist {
        let mut dist = ZsMatcherDist {
            tree: vec![vec![0.0; self.dst_arena.len() + 1]; self.src_arena.len() + 1],
            forest: vec![vec![0.0; self.dst_arena.len() + 1]; self.src_arena.len() + 1],
        };
        let dst_kr: Vec<_> = self.dst_arena.iter_kr().collect();
        for i in self.src_arena.iter_kr() {
            for &j in &dst_kr {
                self.forest_dist(&mut dist, i, j)
            }
        }
        dist
    }

    fn forest_dist(&self, dist: &mut ZsMatcherDist, i: usize, j: usize) {
        let sa = self.src_arena;
        let da = self.dst_arena;
        let lldsrc = sa.lld(i);
        let llddst = da.lld(j);
        dist.forest[lldsrc][llddst] = 0.0;
        for di in lldsrc..=i {
            let lldsrc2 = sa.lld(di);
            let cost_del = self.get_deletion_cost(di);
            dist.forest[di + 1][llddst] = dist.forest[di][llddst] + cost_del;
            for dj in llddst..=j {
                let llddst2 = da.lld(dj);
                let cost_ins = self.get_insertion_cost(dj);
                dist.forest[lldsrc][dj + 1] = dist.forest[lldsrc][dj] + cost_ins;
                if lldsrc2 == lldsrc && llddst2 == llddst {
                    let cost_upd = self.get_update_cost(di, dj);
                    dist.forest[di + 1][dj + 1] = f64::min(
                        f64::min(
                            dist.forest[di][dj + 1] + cost_del,
                            dist.forest[di + 1][dj] + cost_ins,
                        ),
                        dist.forest[di][dj] + cost_upd,
                    );
                    dist.tree[di + 1][dj + 1] = dist.forest[di + 1][dj + 1];
                } else {
                    dist.forest[di + 1][dj + 1] = f64::min(
                        f64::min(
                            dist.forest[di][dj + 1] + cost_del,
                            dist.forest[di + 1][dj] + cost_ins,
                        ),
                        dist.f_dist(lldsrc2, llddst2) + dist.tree[di + 1][dj + 1],
                    );
                }
            }
        }
    }

    /// Backtracks through the distance matrices, rows and columns are shifted by one.
    fn compute_mappings<M>(&self, mappings: &mut M, dist: &mut ZsMatcherDist)
    where
        M: MonoMappingStore<Src = u32, Dst = u32>,
    {
        let sa = self.src_arena;
        let da = self.dst_arena;
        let mut root_node_pair = true;
        let mut tree_pairs: Vec<(usize, usize)> = vec![(sa.root() + 1, da.root() + 1)];
        while let Some((last_row, last_col)) = tree_pairs.pop() {
            if !root_node_pair {
                self.forest_dist(dist, last_row - 1, last_col - 1);
            }
            root_node_pair = false;

            let first_row = sa.lld(last_row - 1);
            let first_col = da.lld(last_col - 1);
            let mut row = last_row;
            let mut col = last_col;

            while row > first_row || col > first_col {
                if row > first_row && dist.f_dist(row - 1, col) + 1.0 == dist.f_dist(row, col) {
                    // deleted from src
                    row -= 1;
                } else if col > first_col
                    && dist.f_dist(row, col - 1) + 1.0 == dist.f_dist(row, col)
                {
                    // inserted in dst
                    col -= 1;
                } else if sa.lld(row - 1) == sa.lld(last_row - 1)
                    && da.lld(col - 1) == da.lld(last_col - 1)
                {
                    // both subforests are trees
                    let (src, dst) = (
                        &sa.tree()[sa.node(row - 1)],
                        &da.tree()[da.node(col - 1)],
                    );
                    if src.kind == dst.kind {
                        mappings.link((row - 1) as u32, (col - 1) as u32);
                    } else {
                        log::trace!("zs kept incompatible nodes {} {} apart", src.kind, dst.kind);
                    }
                    row -= 1;
                    col -= 1;
                } else {
                    tree_pairs.push((row, col));
                    row = sa.lld(row - 1);
                    col = da.lld(col - 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Side;
    use crate::matchers::heuristic::fgp::fgp_tree::FgpTree;
    use crate::tests::examples::example_zs_paper;
    use crate::tests::tree;
    use crate::tree::simple_tree::SimpleTree;

    fn arenas(src: SimpleTree, dst: SimpleTree) -> (FgpTree, FgpTree) {
        (
            FgpTree::new(&src.with_preorder_ids(), Side::Src).unwrap(),
            FgpTree::new(&dst.with_preorder_ids(), Side::Dst).unwrap(),
        )
    }

    fn run(src: &FgpTree, dst: &FgpTree) -> Vec<(NodeIdx, NodeIdx)> {
        let mut pairs = ZsMatcher.match_remainders(
            &RemainderTree::new(src, 0, |_| false),
            &RemainderTree::new(dst, 0, |_| false),
        );
        pairs.sort();
        pairs
    }

    #[test]
    fn identical_trees() {
        let t = tree!(0, "a"; [tree!(1, "b"; [tree!(2, "c")]), tree!(2, "d")]);
        let (src, dst) = arenas(t.clone(), t);
        assert_eq!(run(&src, &dst), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn relabeled_leaf_is_updated() {
        let (src, dst) = arenas(
            tree!(0, "a"; [tree!(2, "b"), tree!(2, "c")]),
            tree!(0, "a"; [tree!(2, "b"), tree!(2, "d")]),
        );
        assert_eq!(run(&src, &dst), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn different_kinds_are_not_mapped() {
        let (src, dst) = arenas(
            tree!(0, "a"; [tree!(2, "b")]),
            tree!(0, "a"; [tree!(3, "b")]),
        );
        assert_eq!(run(&src, &dst), vec![(0, 0)]);
    }

    #[test]
    fn zs_paper() {
        let (src, dst) = example_zs_paper();
        let (src, dst) = arenas(src, dst);
        let pairs = run(&src, &dst);
        // f and e are kept, b changed kind
        assert!(pairs.contains(&(0, 0)));
        assert!(pairs.contains(&(5, 5)));
        assert!(!pairs.contains(&(4, 4)));
        for (a, b) in &pairs {
            assert_eq!(src[*a].kind, dst[*b].kind);
        }
        let mut srcs: Vec<_> = pairs.iter().map(|(a, _)| a).collect();
        srcs.dedup();
        assert_eq!(srcs.len(), pairs.len());
    }
}
