use std::collections::HashSet;

use crate::algorithms::fingerprint::FingerprintMatcher;
use crate::errors::{MatchError, Side};
use crate::matchers::heuristic::fgp::scored_mapping::ScoredMapping;
use crate::matchers::heuristic::fgp::{FingerprintMatcherConfig, RefinementConfig, ScoringMode};
use crate::matchers::mapping_store::MappingStore;
use crate::tests::examples::*;
use crate::tests::tree;
use crate::tree::SourceTree;
use crate::tree::simple_tree::{DisplayTree, SimpleTree};

fn pairs_with(
    src: SimpleTree,
    dst: SimpleTree,
    config: &FingerprintMatcherConfig,
) -> Vec<(usize, usize)> {
    let src = src.with_preorder_ids();
    let dst = dst.with_preorder_ids();
    let mapper = FingerprintMatcher::match_trees(&src, &dst, config).unwrap();
    let mut pairs = mapper.source_pairs();
    pairs.sort();
    pairs
}

fn pairs((src, dst): (SimpleTree, SimpleTree)) -> Vec<(usize, usize)> {
    pairs_with(src, dst, &FingerprintMatcherConfig::default())
}

#[test]
fn single_nodes() {
    assert_eq!(pairs(example_single()), vec![(0, 0)]);
    assert_eq!(pairs(example_single_relabeled()), vec![(0, 0)]);
}

#[test]
fn relabeled_leaf() {
    assert_eq!(pairs(example_simple()), vec![(0, 0), (1, 1), (2, 2)]);
}

#[test]
fn renamed_root_keeps_its_children() {
    assert_eq!(pairs(example_renamed_root()), vec![(0, 0), (1, 1), (2, 2)]);
}

#[test]
fn moved_subtree_follows_its_content() {
    // g(d,e) is now h(d,e), the roots are too different to be matched
    assert_eq!(pairs(example_move()), vec![(1, 2), (2, 3), (3, 4), (4, 1)]);
}

#[test]
fn move_to_grandchild_is_a_single_move() {
    let (src, dst) = example_move_to_grandchild();
    let (src, dst) = (src.with_preorder_ids(), dst.with_preorder_ids());
    let result =
        FingerprintMatcher::match_with_stats(&src, &dst, &FingerprintMatcherConfig::default())
            .unwrap();
    let mut pairs = result.mapper.source_pairs();
    pairs.sort();
    assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    // b is only recovered below the roots
    assert_eq!(result.stats.bottom_up.last_chance, 1);

    let mapper = &result.mapper;
    let mut scored = ScoredMapping::new(&mapper.src_arena, &mapper.dst_arena);
    scored.add_mappings(mapper.mappings(), false).unwrap();
    let state = scored.cost_state();
    assert_eq!((state.deletes, state.inserts, state.updates), (0, 0, 0));
    assert_eq!(state.moves, 1);
    assert_eq!(scored.cost(), 3.0);
}

#[test]
fn gumtree_paper() {
    let (src, dst) = example_gumtree();
    let (src, dst) = (src.with_preorder_ids(), dst.with_preorder_ids());
    let result =
        FingerprintMatcher::match_with_stats(&src, &dst, &FingerprintMatcherConfig::default())
            .unwrap();
    log::debug!("\n{}{}", DisplayTree::new(&src), DisplayTree::new(&dst));
    let mut pairs = result.mapper.source_pairs();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![(0, 0), (1, 5), (2, 6), (3, 1), (4, 2), (5, 3), (6, 7)]
    );
    // b(c,d), e(f) and g
    assert_eq!(result.stats.top_down_full_mappings, 3);
    assert_eq!(result.stats.top_down_mappings, 6);
    assert_eq!(result.stats.bottom_up.accepted, 1);
    // h was inserted
    assert_eq!(result.mapper.src_of_source(4), None);
}

#[test]
fn similarity_threshold_gates_bottom_up() {
    let (src, dst) = example_gumtree();
    let config = FingerprintMatcherConfig {
        similarity_threshold: 0.5,
        ..Default::default()
    };
    let pairs = pairs_with(src, dst, &config);
    assert_eq!(pairs.len(), 6);
    assert!(!pairs.contains(&(0, 0)));
}

#[test]
fn ambiguous_subtrees_go_to_the_closest_position() {
    let pairs = pairs(example_gumtree_ambiguous());
    assert!(pairs.contains(&(3, 1)));
    assert!(pairs.contains(&(4, 2)));
    assert!(pairs.contains(&(5, 3)));
    // the second b(c,d) is inserted as a whole
    assert!(pairs.iter().all(|(_, b)| *b != 9 && *b != 10));
}

#[test]
fn bottom_up_matches_containers() {
    assert_eq!(
        pairs(example_bottom_up()),
        vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6), (7, 7), (8, 8)]
    );
}

#[test]
fn last_chance_recovers_leaves() {
    let (src, dst) = example_bottom_up();
    let (src, dst) = (src.with_preorder_ids(), dst.with_preorder_ids());
    let config = FingerprintMatcherConfig {
        top_down_min_depth: 1,
        ..Default::default()
    };
    let result = FingerprintMatcher::match_with_stats(&src, &dst, &config).unwrap();
    assert_eq!(result.stats.top_down_mappings, 0);
    assert_eq!(result.stats.bottom_up.accepted, 2);
    assert_eq!(result.stats.bottom_up.last_chance, 6);
    let mut pairs = result.mapper.source_pairs();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6), (7, 7), (8, 8)]
    );
}

#[test]
fn last_chance_size_ceiling() {
    let (src, dst) = example_bottom_up();
    let config = FingerprintMatcherConfig {
        top_down_min_depth: 1,
        last_chance_size_threshold: 1,
        ..Default::default()
    };
    assert_eq!(pairs_with(src, dst, &config), vec![(1, 1), (4, 4)]);
}

#[test]
fn duplicate_ids_are_rejected() {
    let src = tree!(0; [tree!(1, "a"), tree!(1, "b")]);
    let dst = tree!(0; [tree!(1, "a")]).with_preorder_ids();
    let result = FingerprintMatcher::match_trees(&src, &dst, &FingerprintMatcherConfig::default());
    assert!(matches!(
        result,
        Err(MatchError::DuplicateSourceId {
            side: Side::Src,
            id: 0
        })
    ));
}

fn configs() -> Vec<FingerprintMatcherConfig> {
    let modes = [
        ScoringMode::default(),
        ScoringMode::AncestryContext {
            sibling_weight: 0.5,
        },
        ScoringMode::Histogram,
        ScoringMode::Cost,
    ];
    let mut configs = vec![];
    for scoring in modes {
        for refinement in [None, Some(RefinementConfig::default())] {
            configs.push(FingerprintMatcherConfig {
                scoring: scoring.clone(),
                refinement,
                ..Default::default()
            });
        }
    }
    configs
}

fn kinds_by_id(t: &SimpleTree, out: &mut Vec<u16>) {
    out.push(t.kind());
    for c in t.children() {
        kinds_by_id(c, out);
    }
}

#[test]
fn mappings_are_injective_and_typed() {
    for config in configs() {
        for (name, src, dst) in all_examples() {
            let mapper = FingerprintMatcher::match_trees(&src, &dst, &config).unwrap();
            let pairs = mapper.source_pairs();
            assert_eq!(pairs.len(), mapper.mappings().len(), "{name} {config:?}");
            let srcs: HashSet<_> = pairs.iter().map(|(a, _)| a).collect();
            let dsts: HashSet<_> = pairs.iter().map(|(_, b)| b).collect();
            assert_eq!(srcs.len(), pairs.len(), "{name} {config:?}");
            assert_eq!(dsts.len(), pairs.len(), "{name} {config:?}");

            let (mut src_kinds, mut dst_kinds) = (vec![], vec![]);
            kinds_by_id(&src, &mut src_kinds);
            kinds_by_id(&dst, &mut dst_kinds);
            for (a, b) in &pairs {
                assert_eq!(src_kinds[*a], dst_kinds[*b], "{name} {a} {b} {config:?}");
                assert_eq!(mapper.dst_of_source(*a), Some(*b));
                assert_eq!(mapper.src_of_source(*b), Some(*a));
            }
        }
    }
}

#[test]
fn identical_subtrees_are_kept_whatever_the_scoring() {
    for config in configs() {
        let (src, dst) = example_gumtree();
        let pairs = pairs_with(src, dst, &config);
        for pair in [(3, 1), (4, 2), (5, 3), (6, 7)] {
            assert!(pairs.contains(&pair), "{pair:?} {config:?}");
        }
    }
}
