use std::ops::{Index, Range};
use std::rc::Rc;

use bitvec::boxed::BitBox;
use hashbrown::HashMap;

use super::feature_vector::FeatureVector;
use super::{FingerprintIdx, NodeIdx};
use crate::errors::{MatchError, Result, Side};
use crate::tree::{SourceTree, TypeTag};

/// A node of a decorated tree.
#[derive(Debug, Clone)]
pub struct FgpNode {
    pub source_id: usize,
    pub kind: TypeTag,
    pub label: Option<String>,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    /// height of the subtree rooted here, leaves have 1
    pub depth: usize,
    pub dist_from_root: usize,
    pub subtree_size: usize,
    pub shape_fingerprint: Option<FingerprintIdx>,
    pub content_fingerprint: Option<FingerprintIdx>,
    /// shared between all the subtrees with the same content fingerprint
    pub node_features: Rc<FeatureVector>,
    pub left_sibling_features: FeatureVector,
    pub right_sibling_features: FeatureVector,
    pub left_tree_weight: f64,
    pub right_tree_weight: f64,
}

/// Lookup from the ids of an input tree to positions in its decorated arena.
#[derive(Debug, Default)]
pub struct NodeMapping {
    by_source_id: HashMap<usize, NodeIdx>,
}

impl NodeMapping {
    pub fn get(&self, source_id: usize) -> Option<NodeIdx> {
        self.by_source_id.get(&source_id).copied()
    }
}

/// Decorated mirror of an input tree, stored in pre-order.
///
/// The descendants of `i` are exactly `i+1..i+subtree_size`, which most
/// subtree queries rely on.
#[derive(Debug)]
pub struct FgpTree {
    side: Side,
    nodes: Vec<FgpNode>,
    mapping: NodeMapping,
}

impl FgpTree {
    pub fn new<T: SourceTree>(root: &T, side: Side) -> Result<Self> {
        let mut tree = Self {
            side,
            nodes: vec![],
            mapping: NodeMapping::default(),
        };
        tree.push_nodes(root)?;
        tree.compute_sizes();
        Ok(tree)
    }

    /// Pre-order walk with an explicit stack, input trees can be very deep.
    fn push_nodes<T: SourceTree>(&mut self, root: &T) -> Result<()> {
        let mut stack: Vec<(&T, Option<NodeIdx>, usize)> = vec![(root, None, 0)];
        while let Some((node, parent, dist_from_root)) = stack.pop() {
            let idx = self.nodes.len() as NodeIdx;
            if self.mapping.by_source_id.insert(node.id(), idx).is_some() {
                return Err(MatchError::DuplicateSourceId {
                    side: self.side,
                    id: node.id(),
                });
            }
            self.nodes.push(FgpNode {
                source_id: node.id(),
                kind: node.kind(),
                label: node.label().map(|l| l.to_owned()),
                parent,
                children: vec![],
                depth: 0,
                dist_from_root,
                subtree_size: 0,
                shape_fingerprint: None,
                content_fingerprint: None,
                node_features: Default::default(),
                left_sibling_features: FeatureVector::new(),
                right_sibling_features: FeatureVector::new(),
                left_tree_weight: 0.0,
                right_tree_weight: 0.0,
            });
            if let Some(p) = parent {
                self.nodes[p as usize].children.push(idx);
            }
            let children: Vec<&T> = node.children().collect();
            stack.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|c| (c, Some(idx), dist_from_root + 1)),
            );
        }
        Ok(())
    }

    /// Heights and sizes, children always come after their parent.
    fn compute_sizes(&mut self) {
        for i in (0..self.nodes.len()).rev() {
            let (depth, size) = self.nodes[i]
                .children
                .iter()
                .map(|c| &self.nodes[*c as usize])
                .fold((0, 0), |(d, s), c| (d.max(c.depth), s + c.subtree_size));
            let n = &mut self.nodes[i];
            n.depth = depth + 1;
            n.subtree_size = size + 1;
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn root(&self) -> NodeIdx {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, i: NodeIdx) -> Option<NodeIdx> {
        self[i].parent
    }

    pub fn children(&self, i: NodeIdx) -> &[NodeIdx] {
        &self[i].children
    }

    /// Arena positions of the strict descendants of `i`, in pre-order.
    pub fn descendants(&self, i: NodeIdx) -> Range<NodeIdx> {
        i + 1..i + self[i].subtree_size as NodeIdx
    }

    pub fn is_in_subtree(&self, x: NodeIdx, root: NodeIdx) -> bool {
        root <= x && x < root + self[root].subtree_size as NodeIdx
    }

    pub fn post_order(&self) -> Vec<NodeIdx> {
        let mut out = Vec::with_capacity(self.len());
        if self.is_empty() {
            return out;
        }
        let mut stack = vec![(self.root(), 0)];
        while let Some((n, i)) = stack.pop() {
            let cs = &self[n].children;
            if i < cs.len() {
                stack.push((n, i + 1));
                stack.push((cs[i], 0));
            } else {
                out.push(n);
            }
        }
        out
    }

    /// Decorated node of a source id.
    pub fn idx_of(&self, source_id: usize) -> Result<NodeIdx> {
        self.mapping
            .get(source_id)
            .ok_or(MatchError::UnknownSourceNode {
                side: self.side,
                id: source_id,
            })
    }

    pub fn node_mapping(&self) -> &NodeMapping {
        &self.mapping
    }

    pub(super) fn node_mut(&mut self, i: NodeIdx) -> &mut FgpNode {
        &mut self.nodes[i as usize]
    }
}

impl Index<NodeIdx> for FgpTree {
    type Output = FgpNode;

    fn index(&self, i: NodeIdx) -> &FgpNode {
        &self.nodes[i as usize]
    }
}

/// Matched flags of both decorated trees.
#[derive(Debug)]
pub struct MatchFlags {
    src: BitBox,
    dst: BitBox,
}

impl MatchFlags {
    pub fn new(src_len: usize, dst_len: usize) -> Self {
        Self {
            src: bitvec::bitbox![0; src_len],
            dst: bitvec::bitbox![0; dst_len],
        }
    }

    pub fn is_src(&self, i: NodeIdx) -> bool {
        self.src[i as usize]
    }

    pub fn is_dst(&self, i: NodeIdx) -> bool {
        self.dst[i as usize]
    }

    pub fn mark(&mut self, a: NodeIdx, b: NodeIdx) {
        self.src.set(a as usize, true);
        self.dst.set(b as usize, true);
    }

    /// Flags `root` and all its descendants.
    pub fn mark_subtree(&mut self, tree: &FgpTree, root: NodeIdx) {
        let flags = match tree.side() {
            Side::Src => &mut self.src,
            Side::Dst => &mut self.dst,
        };
        let end = root as usize + tree[root].subtree_size;
        flags[root as usize..end].fill(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::tree;

    #[test]
    fn arena_in_preorder() {
        let t = tree!(0; [tree!(1, "a"; [tree!(2, "b")]), tree!(1, "c")]).with_preorder_ids();
        let fgp = FgpTree::new(&t, Side::Src).unwrap();
        assert_eq!(fgp.len(), 4);
        assert_eq!(fgp[0].depth, 3);
        assert_eq!(fgp[0].subtree_size, 4);
        assert_eq!(fgp[1].depth, 2);
        assert_eq!(fgp[2].depth, 1);
        assert_eq!(fgp[2].dist_from_root, 2);
        assert_eq!(fgp.children(0), &[1, 3]);
        assert_eq!(fgp.parent(2), Some(1));
        assert_eq!(fgp.parent(0), None);
        assert_eq!(fgp.descendants(1), 2..3);
        assert!(fgp.is_in_subtree(2, 1));
        assert!(!fgp.is_in_subtree(3, 1));
        assert_eq!(fgp.post_order(), vec![2, 1, 3, 0]);
        assert_eq!(fgp[3].label.as_deref(), Some("c"));
        assert_eq!(fgp.idx_of(3), Ok(3));
        assert_eq!(
            fgp.idx_of(9),
            Err(MatchError::UnknownSourceNode {
                side: Side::Src,
                id: 9
            })
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let t = tree!(0; [tree!(1, "a"), tree!(1, "b")]);
        assert_eq!(
            FgpTree::new(&t, Side::Dst).err(),
            Some(MatchError::DuplicateSourceId {
                side: Side::Dst,
                id: 0
            })
        );
    }

    #[test]
    fn mark_subtree() {
        let t = tree!(0; [tree!(1, "a"; [tree!(2, "b")]), tree!(1, "c")]).with_preorder_ids();
        let fgp = FgpTree::new(&t, Side::Src).unwrap();
        let mut flags = MatchFlags::new(4, 1);
        flags.mark_subtree(&fgp, 1);
        assert!(!flags.is_src(0));
        assert!(flags.is_src(1));
        assert!(flags.is_src(2));
        assert!(!flags.is_src(3));
        assert!(!flags.is_dst(0));
    }
}
