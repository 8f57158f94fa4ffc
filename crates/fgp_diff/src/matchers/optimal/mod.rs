//! Optimal matchers, only affordable on small trees.

use crate::matchers::heuristic::fgp::NodeIdx;
use crate::matchers::heuristic::fgp::fgp_tree::FgpTree;

pub mod zs;

/// Matches two small trees exactly, used on what is left of approximately matched pairs.
pub trait ExactMatcher {
    /// Returns pairs of arena positions.
    fn match_remainders(&self, src: &RemainderTree, dst: &RemainderTree) -> Vec<(NodeIdx, NodeIdx)>;
}

/// Post-order view of a subtree where matched descendants are cut off, with their own subtrees.
///
/// The root is always kept.
#[derive(Debug)]
pub struct RemainderTree<'a> {
    tree: &'a FgpTree,
    nodes: Vec<NodeIdx>,
    llds: Vec<usize>,
}

impl<'a> RemainderTree<'a> {
    pub fn new(tree: &'a FgpTree, root: NodeIdx, is_matched: impl Fn(NodeIdx) -> bool) -> Self {
        let mut remainder = Self {
            tree,
            nodes: vec![],
            llds: vec![],
        };
        remainder.visit(root, is_matched);
        remainder
    }

    /// Post-order walk with an explicit stack, each frame holds the next
    /// child to visit and the leftmost leaf found so far.
    fn visit(&mut self, root: NodeIdx, is_matched: impl Fn(NodeIdx) -> bool) {
        let mut stack: Vec<(NodeIdx, usize, Option<usize>)> = vec![(root, 0, None)];
        while let Some((n, next, lld)) = stack.pop() {
            if let Some(&c) = self.tree.children(n).get(next) {
                stack.push((n, next + 1, lld));
                if !is_matched(c) {
                    stack.push((c, 0, None));
                }
                continue;
            }
            let i = self.nodes.len();
            let lld = lld.unwrap_or(i);
            self.nodes.push(n);
            self.llds.push(lld);
            if let Some((_, _, parent_lld)) = stack.last_mut() {
                parent_lld.get_or_insert(lld);
            }
        }
    }

    pub fn tree(&self) -> &'a FgpTree {
        self.tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Post-order position of the root.
    pub fn root(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Arena position of the `i`th node in post-order.
    pub fn node(&self, i: usize) -> NodeIdx {
        self.nodes[i]
    }

    /// Leftmost leaf descendant.
    pub fn lld(&self, i: usize) -> usize {
        self.llds[i]
    }

    /// Highest node of each leftmost path, ascending, the root comes last.
    pub fn iter_kr(&self) -> impl Iterator<Item = usize> + '_ {
        let mut seen = bitvec::bitbox![0; self.len()];
        let mut kr = vec![];
        for i in (0..self.len()).rev() {
            let l = self.llds[i];
            if !seen[l] {
                seen.set(l, true);
                kr.push(i);
            }
        }
        kr.into_iter().rev()
    }
}
