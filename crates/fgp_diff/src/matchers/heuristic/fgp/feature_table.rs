use std::rc::Rc;

use super::feature_vector::FeatureVector;
use super::fgp_tree::FgpTree;
use super::fingerprint_table::{self, FingerprintTable};
use super::{FingerprintIdx, NonLocality};

/// Decorates trees with fingerprints and feature vectors.
///
/// The fingerprint tables and the feature cache are shared by every tree
/// added, so identical subtrees of both trees get identical indices and
/// share one feature vector.
#[derive(Debug, Default)]
pub struct FeatureTable {
    shape_fingerprints: FingerprintTable,
    content_fingerprints: FingerprintTable,
    features_by_content: Vec<Option<Rc<FeatureVector>>>,
    non_locality: NonLocality,
}

impl FeatureTable {
    pub fn new(non_locality: NonLocality) -> Self {
        Self {
            non_locality,
            ..Default::default()
        }
    }

    pub fn shape_fingerprints(&self) -> &FingerprintTable {
        &self.shape_fingerprints
    }

    pub fn content_fingerprints(&self) -> &FingerprintTable {
        &self.content_fingerprints
    }

    pub fn add_tree(&mut self, tree: &mut FgpTree) {
        let post_order = tree.post_order();
        self.update_fingerprints(tree, &post_order);
        self.features_by_content
            .resize(self.content_fingerprints.len(), None);
        self.build_features_bottom_up(tree, &post_order);
        build_tree_weights_top_down(tree);
    }

    fn update_fingerprints(&mut self, tree: &mut FgpTree, post_order: &[u32]) {
        let mut shape_digests = vec![String::new(); tree.len()];
        let mut content_digests = vec![String::new(); tree.len()];
        for &i in post_order {
            let n = &tree[i];
            let shape = fingerprint_table::shape_signature(
                n.kind,
                n.children.iter().map(|c| shape_digests[*c as usize].as_str()),
            );
            let content = fingerprint_table::content_signature(
                n.kind,
                n.label.as_deref().unwrap_or(""),
                n.children
                    .iter()
                    .map(|c| content_digests[*c as usize].as_str()),
            );
            let shape = fingerprint_table::digest(&shape);
            let content = fingerprint_table::digest(&content);
            let node = tree.node_mut(i);
            node.shape_fingerprint = Some(self.shape_fingerprints.index_for(&shape));
            node.content_fingerprint = Some(self.content_fingerprints.index_for(&content));
            shape_digests[i as usize] = shape;
            content_digests[i as usize] = content;
        }
    }

    fn build_features_bottom_up(&mut self, tree: &mut FgpTree, post_order: &[u32]) {
        for &i in post_order {
            let children = tree[i].children.clone();
            if !children.is_empty() {
                let mut left = FeatureVector::new();
                for &c in &children {
                    tree.node_mut(c).left_sibling_features = left.clone();
                    left = left.add(&tree[c].node_features);
                }
                let mut right = FeatureVector::new();
                for &c in children.iter().rev() {
                    tree.node_mut(c).right_sibling_features = right.clone();
                    right = right.add(&tree[c].node_features);
                }
            }
            let fg = content_index(tree, i);
            let features = match &self.features_by_content[fg as usize] {
                Some(features) => features.clone(),
                None => {
                    let factor = self.non_locality.factor(children.len());
                    let mut features = FeatureVector::unit(fg, 1.0);
                    for &c in &children {
                        features = features.add(&tree[c].node_features.scale(factor));
                    }
                    let features = Rc::new(features);
                    self.features_by_content[fg as usize] = Some(features.clone());
                    features
                }
            };
            tree.node_mut(i).node_features = features;
        }
    }
}

fn content_index(tree: &FgpTree, i: u32) -> FingerprintIdx {
    // fingerprints are all assigned before features are built
    tree[i].content_fingerprint.unwrap_or_default()
}

/// Left and right masses, accumulated from the root down.
fn build_tree_weights_top_down(tree: &mut FgpTree) {
    for i in 0..tree.len() as u32 {
        let (left, right) = match tree.parent(i) {
            None => (0.0, 0.0),
            Some(p) => (
                tree[p].left_tree_weight + tree[i].left_sibling_features.sum(),
                tree[p].right_tree_weight + tree[i].right_sibling_features.sum(),
            ),
        };
        let n = tree.node_mut(i);
        n.left_tree_weight = left;
        n.right_tree_weight = right;
    }
}
