//! Seeded random trees and edited copies of them, for benches and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::simple_tree::SimpleTree;
use super::{SourceTree, TypeTag};

const KINDS: TypeTag = 8;
const LABELS: usize = 64;

fn random_leaf(rng: &mut StdRng) -> SimpleTree {
    let kind = rng.random_range(1..KINDS);
    let label = format!("l{}", rng.random_range(0..LABELS));
    SimpleTree::new(kind, Some(&label), vec![])
}

/// Follows random children from the root, stopping early with probability `1 - go_down`.
fn random_node<'a>(
    rng: &mut StdRng,
    root: &'a mut SimpleTree,
    go_down: f64,
) -> &'a mut SimpleTree {
    let mut node = root;
    while node.children().next().is_some() && rng.random_bool(go_down) {
        let i = rng.random_range(0..node.children().count());
        node = &mut node.children_mut()[i];
    }
    node
}

/// Tree of `size` nodes, numbered in pre-order.
pub fn random_tree(seed: u64, size: usize) -> SimpleTree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut root = SimpleTree::new(0, None, vec![]);
    for _ in 1..size {
        let leaf = random_leaf(&mut rng);
        let parent = random_node(&mut rng, &mut root, 0.8);
        let at = rng.random_range(0..=parent.children_mut().len());
        parent.children_mut().insert(at, leaf);
    }
    root.with_preorder_ids()
}

/// Copy of `tree` after `edits` random relabels, deletions, insertions and moves,
/// numbered in pre-order.
pub fn edited(tree: &SimpleTree, seed: u64, edits: usize) -> SimpleTree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = tree.clone();
    for _ in 0..edits {
        let node = random_node(&mut rng, &mut tree, 0.7);
        match rng.random_range(0..4) {
            0 if node.children().next().is_none() => {
                let label = format!("l{}", rng.random_range(0..LABELS));
                node.set_label(Some(&label));
            }
            1 if node.children().next().is_some() => {
                let i = rng.random_range(0..node.children_mut().len());
                node.children_mut().remove(i);
            }
            3 if node.children().next().is_some() => {
                let i = rng.random_range(0..node.children_mut().len());
                let moved = node.children_mut().remove(i);
                let parent = random_node(&mut rng, &mut tree, 0.7);
                let at = rng.random_range(0..=parent.children_mut().len());
                parent.children_mut().insert(at, moved);
            }
            _ => {
                let leaf = random_leaf(&mut rng);
                let at = rng.random_range(0..=node.children_mut().len());
                node.children_mut().insert(at, leaf);
            }
        }
    }
    tree.with_preorder_ids()
}

/// Source tree and an edited copy of it.
pub fn tree_pair(seed: u64, size: usize, edits: usize) -> (SimpleTree, SimpleTree) {
    let src = random_tree(seed, size);
    let dst = edited(&src, seed.wrapping_add(1), edits);
    (src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded() {
        let (src, dst) = tree_pair(42, 200, 10);
        assert_eq!(src.size(), 200);
        assert_eq!(tree_pair(42, 200, 10), (src.clone(), dst));
        assert_eq!(edited(&src, 1, 0), src);
        assert_ne!(random_tree(43, 200), src);
    }
}
