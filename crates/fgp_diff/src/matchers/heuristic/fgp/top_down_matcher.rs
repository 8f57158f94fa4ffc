use std::collections::BTreeMap;

use super::fgp_tree::{FgpNode, FgpTree, MatchFlags};
use super::scoring::{content_tie_score, shape_context_score};
use super::{FingerprintIdx, NodeIdx};
use crate::errors::Result;
use crate::matchers::mapping_store::MonoMappingStore;

/// Nodes waiting to be considered, bucketed by height.
#[derive(Debug)]
pub struct DepthNodeQueue {
    max_depth: usize,
    by_depth: Vec<Vec<NodeIdx>>,
}

impl DepthNodeQueue {
    pub fn new(tree: &FgpTree) -> Self {
        let root = tree.root();
        let max_depth = tree[root].depth;
        let mut by_depth = vec![vec![]; max_depth + 1];
        by_depth[max_depth].push(root);
        Self {
            max_depth,
            by_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn push_nodes(&mut self, tree: &FgpTree, nodes: &[NodeIdx]) {
        for &n in nodes {
            let depth = tree[n].depth;
            self.by_depth[depth].push(n);
            self.max_depth = self.max_depth.max(depth);
        }
    }

    /// Empty once only the zero bucket is left.
    pub fn pop_nodes_at_max_depth(&mut self) -> Vec<NodeIdx> {
        if self.max_depth == 0 {
            return vec![];
        }
        let nodes = std::mem::take(&mut self.by_depth[self.max_depth]);
        while self.max_depth > 0 && self.by_depth[self.max_depth].is_empty() {
            self.max_depth -= 1;
        }
        nodes
    }

    /// Replaces the highest nodes by their children.
    fn open_max_depth(&mut self, tree: &FgpTree) {
        for n in self.pop_nodes_at_max_depth() {
            self.push_nodes(tree, tree.children(n));
        }
    }
}

/// Nodes of both sides sharing a fingerprint, walked in ascending fingerprint order.
///
/// Nodes without a fingerprint land in the `None` group and are never paired.
#[derive(Debug, Default)]
struct FingerprintGroups {
    groups: BTreeMap<Option<FingerprintIdx>, (Vec<NodeIdx>, Vec<NodeIdx>)>,
}

impl FingerprintGroups {
    fn put_in_a(&mut self, fg: Option<FingerprintIdx>, n: NodeIdx) {
        self.groups.entry(fg).or_default().0.push(n);
    }

    fn put_in_b(&mut self, fg: Option<FingerprintIdx>, n: NodeIdx) {
        self.groups.entry(fg).or_default().1.push(n);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Content,
    Shape,
}

impl Pass {
    fn fingerprint(self, n: &FgpNode) -> Option<FingerprintIdx> {
        match self {
            Pass::Content => n.content_fingerprint,
            Pass::Shape => n.shape_fingerprint,
        }
    }
}

/// Matches identical subtrees, from the highest ones down.
///
/// At each height, nodes are first grouped by content fingerprint then, for
/// those left, by shape fingerprint. A pair found in a group is mapped with
/// all its descendants, position by position. Nodes left unmatched by both
/// passes are opened and their children considered further down.
pub struct TopDownMatcher<'a, M> {
    src: &'a FgpTree,
    dst: &'a FgpTree,
    flags: &'a mut MatchFlags,
    mappings: &'a mut M,
    full_mappings: usize,
}

impl<'a, M> TopDownMatcher<'a, M>
where
    M: MonoMappingStore<Src = NodeIdx, Dst = NodeIdx>,
{
    pub fn new(
        src: &'a FgpTree,
        dst: &'a FgpTree,
        flags: &'a mut MatchFlags,
        mappings: &'a mut M,
    ) -> Self {
        Self {
            src,
            dst,
            flags,
            mappings,
            full_mappings: 0,
        }
    }

    /// Runs until both queues are down to `min_depth`, returns the number of mapped subtree pairs.
    pub fn execute(mut self, min_depth: usize) -> Result<usize> {
        let mut qa = DepthNodeQueue::new(self.src);
        let mut qb = DepthNodeQueue::new(self.dst);
        while qa.max_depth() > min_depth {
            while qa.max_depth() != qb.max_depth() {
                if qa.max_depth() > qb.max_depth() {
                    qa.open_max_depth(self.src);
                } else {
                    qb.open_max_depth(self.dst);
                }
            }
            if qa.max_depth() <= min_depth {
                break;
            }
            let depth = qa.max_depth();
            let nodes_a = qa.pop_nodes_at_max_depth();
            let nodes_b = qb.pop_nodes_at_max_depth();
            log::trace!(
                "top-down at height {depth}: {} x {} nodes",
                nodes_a.len(),
                nodes_b.len()
            );

            let mut by_content = FingerprintGroups::default();
            for a in nodes_a {
                by_content.put_in_a(self.src[a].content_fingerprint, a);
            }
            for b in nodes_b {
                by_content.put_in_b(self.dst[b].content_fingerprint, b);
            }

            let mut by_shape = FingerprintGroups::default();
            for (fg, (group_a, group_b)) in by_content.groups {
                if fg.is_some() {
                    self.match_group(&group_a, &group_b, Pass::Content)?;
                }
                for a in group_a.into_iter().filter(|a| !self.flags.is_src(*a)) {
                    by_shape.put_in_a(Pass::Shape.fingerprint(&self.src[a]), a);
                }
                for b in group_b.into_iter().filter(|b| !self.flags.is_dst(*b)) {
                    by_shape.put_in_b(Pass::Shape.fingerprint(&self.dst[b]), b);
                }
            }

            for (fg, (group_a, group_b)) in by_shape.groups {
                if fg.is_some() {
                    self.match_group(&group_a, &group_b, Pass::Shape)?;
                }
                for a in group_a.into_iter().filter(|a| !self.flags.is_src(*a)) {
                    qa.push_nodes(self.src, self.src.children(a));
                }
                for b in group_b.into_iter().filter(|b| !self.flags.is_dst(*b)) {
                    qb.push_nodes(self.dst, self.dst.children(b));
                }
            }
        }
        log::debug!("top-down matched {} subtree pairs", self.full_mappings);
        Ok(self.full_mappings)
    }

    fn match_group(&mut self, group_a: &[NodeIdx], group_b: &[NodeIdx], pass: Pass) -> Result<()> {
        match (group_a, group_b) {
            ([], _) | (_, []) => {}
            ([a], [b]) => self.add_full_mapping(*a, *b),
            _ => {
                let mut scored = Vec::with_capacity(group_a.len() * group_b.len());
                for &a in group_a {
                    for &b in group_b {
                        scored.push((self.tie_score(a, b, pass)?, a, b));
                    }
                }
                scored.sort_by(|(s1, a1, b1), (s2, a2, b2)| {
                    s2.total_cmp(s1).then(a1.cmp(a2)).then(b1.cmp(b2))
                });
                for (score, a, b) in scored {
                    if !self.flags.is_src(a) && !self.flags.is_dst(b) {
                        log::trace!("tie {a} {b} resolved with {score}");
                        self.add_full_mapping(a, b);
                    }
                }
            }
        }
        Ok(())
    }

    fn tie_score(&self, a: NodeIdx, b: NodeIdx, pass: Pass) -> Result<f64> {
        match pass {
            Pass::Content => content_tie_score(self.src, self.dst, a, b, &*self.mappings),
            Pass::Shape => shape_context_score(&self.src[a], &self.dst[b]),
        }
    }

    /// Maps both subtrees position by position, they share a shape.
    fn add_full_mapping(&mut self, a: NodeIdx, b: NodeIdx) {
        let range_a = a..a + self.src[a].subtree_size as NodeIdx;
        let range_b = b..b + self.dst[b].subtree_size as NodeIdx;
        for (x, y) in range_a.zip(range_b) {
            self.mappings.link(x, y);
        }
        self.flags.mark_subtree(self.src, a);
        self.flags.mark_subtree(self.dst, b);
        self.full_mappings += 1;
    }
}
