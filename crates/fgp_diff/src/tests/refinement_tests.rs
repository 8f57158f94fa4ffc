use crate::algorithms::fingerprint::FingerprintMatcher;
use crate::matchers::Mapper;
use crate::matchers::heuristic::fgp::scored_mapping::ScoredMapping;
use crate::matchers::heuristic::fgp::{FingerprintMatcherConfig, RefinementConfig};
use crate::matchers::mapping_store::VecStore;
use crate::tests::examples::*;

fn refined(seed: u64) -> FingerprintMatcherConfig {
    FingerprintMatcherConfig {
        refinement: Some(RefinementConfig {
            seed,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn cost_of(mapper: &Mapper<VecStore<u32>>) -> f64 {
    let mut scored = ScoredMapping::new(&mapper.src_arena, &mapper.dst_arena);
    scored.add_mappings(mapper.mappings(), false).unwrap();
    scored.cost()
}

#[test]
fn relabeled_single_node_is_one_update() {
    let (src, dst) = example_single_relabeled();
    let (src, dst) = (src.with_preorder_ids(), dst.with_preorder_ids());
    let mapper = FingerprintMatcher::match_trees(&src, &dst, &refined(1)).unwrap();
    let mut scored = ScoredMapping::new(&mapper.src_arena, &mapper.dst_arena);
    scored.add_mappings(mapper.mappings(), false).unwrap();
    let state = scored.cost_state();
    assert_eq!(state.updates, 1);
    assert_eq!((state.deletes, state.inserts, state.moves), (0, 0, 0));
}

#[test]
fn refinement_does_not_raise_the_cost() {
    for (name, src, dst) in all_examples() {
        let plain =
            FingerprintMatcher::match_trees(&src, &dst, &FingerprintMatcherConfig::default())
                .unwrap();
        let result = FingerprintMatcher::match_with_stats(&src, &dst, &refined(12345)).unwrap();
        let stats = result.stats.refinement.unwrap();
        assert!(stats.after.cost() <= stats.before.cost(), "{name}");
        // the refined mapping is the one that was scored
        assert_eq!(cost_of(&result.mapper), stats.after.cost(), "{name}");
        assert!(cost_of(&result.mapper) <= cost_of(&plain), "{name}");
    }
}

#[test]
fn refinement_is_reproducible() {
    for (name, src, dst) in all_examples() {
        let first = FingerprintMatcher::match_trees(&src, &dst, &refined(7)).unwrap();
        let second = FingerprintMatcher::match_trees(&src, &dst, &refined(7)).unwrap();
        assert_eq!(first.source_pairs(), second.source_pairs(), "{name}");
    }
}

#[test]
fn refinement_keeps_top_down_pairs() {
    let (src, dst) = example_action();
    let (src, dst) = (src.with_preorder_ids(), dst.with_preorder_ids());
    let plain =
        FingerprintMatcher::match_with_stats(&src, &dst, &FingerprintMatcherConfig::default())
            .unwrap();
    let result = FingerprintMatcher::match_with_stats(&src, &dst, &refined(3)).unwrap();
    assert_eq!(plain.stats.top_down_mappings, result.stats.top_down_mappings);
    let refined_pairs = result.mapper.source_pairs();
    // b(c,d) is found top-down whatever happens next
    for pair in [(3, 1), (4, 2), (5, 3)] {
        assert!(refined_pairs.contains(&pair), "{pair:?}");
    }
}
