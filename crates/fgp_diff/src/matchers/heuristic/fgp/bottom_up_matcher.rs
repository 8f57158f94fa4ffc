use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use super::fgp_tree::{FgpTree, MatchFlags};
use super::scored_mapping::ScoredMapping;
use super::scoring::ScoringStrategy;
use super::{FingerprintMatcherConfig, NodeIdx};
use crate::errors::{MatchError, Result};
use crate::matchers::mapping_store::{MappingStore, VecStore};
use crate::matchers::optimal::{ExactMatcher, RemainderTree};

/// Receives the pairs accepted by the bottom-up phase.
pub trait MatchSink {
    fn add_match(&mut self, a: NodeIdx, b: NodeIdx) -> Result<()>;
}

impl MatchSink for VecStore<NodeIdx> {
    fn add_match(&mut self, a: NodeIdx, b: NodeIdx) -> Result<()> {
        self.link(a, b);
        Ok(())
    }
}

impl MatchSink for ScoredMapping<'_> {
    fn add_match(&mut self, a: NodeIdx, b: NodeIdx) -> Result<()> {
        self.link(a, b, false)
    }
}

/// Candidate pair in a max-heap, smaller ids win ties.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPair {
    pub score: f64,
    pub a: NodeIdx,
    pub b: NodeIdx,
}

impl PartialEq for ScoredPair {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredPair {}

impl PartialOrd for ScoredPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.a.cmp(&self.a))
            .then_with(|| other.b.cmp(&self.b))
    }
}

/// Pair accepted by [`select_pairs`], with the sum of the heights of both nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedPair {
    pub height: usize,
    pub a: NodeIdx,
    pub b: NodeIdx,
}

/// Unmatched nodes at least `min_height` high, the search stops at matched
/// nodes and at nodes that are too low.
pub fn nodes_in_unmatched_subtrees(
    tree: &FgpTree,
    is_matched: impl Fn(NodeIdx) -> bool,
    min_height: usize,
) -> Vec<NodeIdx> {
    let mut nodes = vec![];
    let mut queue = VecDeque::from([tree.root()]);
    while let Some(n) = queue.pop_front() {
        if !is_matched(n) && tree[n].depth >= min_height {
            nodes.push(n);
            queue.extend(tree.children(n));
        }
    }
    nodes
}

/// Picks the best pairs without scoring every candidate exactly.
///
/// Candidates enter a heap ordered by their upper bound. A second heap
/// holds exactly scored pairs, its head is accepted as soon as it beats the
/// best remaining upper bound. Both heaps must be exhausted at the end.
pub fn select_pairs(
    src: &FgpTree,
    dst: &FgpTree,
    flags: &mut MatchFlags,
    strategy: &mut (impl ScoringStrategy + ?Sized),
    nodes_a: &[NodeIdx],
    nodes_b: &[NodeIdx],
) -> Result<(Vec<AcceptedPair>, usize)> {
    let mut by_upper_bound = BinaryHeap::new();
    for &a in nodes_a {
        for &b in nodes_b {
            if let Some(score) = strategy.upper_bound(a, b)? {
                by_upper_bound.push(ScoredPair { score, a, b });
            }
        }
    }
    let candidates = by_upper_bound.len();
    log::debug!(
        "bottom-up: {} x {} nodes, {candidates} candidates",
        nodes_a.len(),
        nodes_b.len()
    );

    let mut by_score: BinaryHeap<ScoredPair> = BinaryHeap::new();
    let mut accepted = vec![];
    let compatible = |flags: &MatchFlags, p: &ScoredPair| {
        !flags.is_src(p.a) && !flags.is_dst(p.b) && src[p.a].kind == dst[p.b].kind
    };
    while !by_upper_bound.is_empty() || !by_score.is_empty() {
        while let Some(best) = by_score.peek().copied() {
            if by_upper_bound.peek().is_some_and(|ub| best.score <= ub.score) {
                break;
            }
            by_score.pop();
            if compatible(flags, &best) {
                log::trace!("bottom-up accepts {} {} with {}", best.a, best.b, best.score);
                flags.mark(best.a, best.b);
                accepted.push(AcceptedPair {
                    height: src[best.a].depth + dst[best.b].depth,
                    a: best.a,
                    b: best.b,
                });
            }
        }
        while let Some(ub) = by_upper_bound.peek().copied() {
            if by_score.peek().is_some_and(|best| best.score > ub.score) {
                break;
            }
            by_upper_bound.pop();
            if !compatible(flags, &ub) {
                continue;
            }
            if let Some(score) = strategy.score(ub.a, ub.b)? {
                by_score.push(ScoredPair { score, ..ub });
            }
        }
    }
    if !by_upper_bound.is_empty() {
        return Err(MatchError::HeapNotExhausted {
            heap: "upper bound",
            remaining: by_upper_bound.len(),
        });
    }
    if !by_score.is_empty() {
        return Err(MatchError::HeapNotExhausted {
            heap: "score",
            remaining: by_score.len(),
        });
    }
    Ok((accepted, candidates))
}

/// Counts of a bottom-up run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BottomUpStats {
    pub src_nodes: usize,
    pub dst_nodes: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub last_chance: usize,
}

/// Matches the nodes left by the top-down phase by similarity, then recovers
/// what it can below each accepted pair with an exact matcher.
pub struct BottomUpMatcher<'a, E> {
    src: &'a FgpTree,
    dst: &'a FgpTree,
    flags: &'a mut MatchFlags,
    config: &'a FingerprintMatcherConfig,
    exact: &'a E,
}

impl<'a, E: ExactMatcher> BottomUpMatcher<'a, E> {
    pub fn new(
        src: &'a FgpTree,
        dst: &'a FgpTree,
        flags: &'a mut MatchFlags,
        config: &'a FingerprintMatcherConfig,
        exact: &'a E,
    ) -> Self {
        Self {
            src,
            dst,
            flags,
            config,
            exact,
        }
    }

    pub fn execute<S: MatchSink>(mut self, sink: &mut S) -> Result<BottomUpStats> {
        let height = self.config.bottom_up_height_threshold;
        let nodes_a = nodes_in_unmatched_subtrees(self.src, |n| self.flags.is_src(n), height);
        let nodes_b = nodes_in_unmatched_subtrees(self.dst, |n| self.flags.is_dst(n), height);
        let mut strategy = self.config.scoring.strategy(
            self.src,
            self.dst,
            &nodes_a,
            &nodes_b,
            self.config.similarity_threshold,
        );
        let (mut accepted, candidates) = select_pairs(
            self.src,
            self.dst,
            self.flags,
            strategy.as_mut(),
            &nodes_a,
            &nodes_b,
        )?;

        // smaller pairs first, so large ones do not preempt them
        accepted.sort_by_key(|p| p.height);
        let mut last_chance = 0;
        for p in &accepted {
            last_chance += self.last_chance_match(p.a, p.b, sink)?;
            sink.add_match(p.a, p.b)?;
        }
        let stats = BottomUpStats {
            src_nodes: nodes_a.len(),
            dst_nodes: nodes_b.len(),
            candidates,
            accepted: accepted.len(),
            last_chance,
        };
        log::debug!("{stats:?}");
        Ok(stats)
    }

    /// Maps unmatched descendants of `a` and `b` exactly, when both remainders are small enough.
    fn last_chance_match<S: MatchSink>(
        &mut self,
        a: NodeIdx,
        b: NodeIdx,
        sink: &mut S,
    ) -> Result<usize> {
        let flags = &*self.flags;
        let src_rem = RemainderTree::new(self.src, a, |n| flags.is_src(n));
        let dst_rem = RemainderTree::new(self.dst, b, |n| flags.is_dst(n));
        let product = src_rem.len() * dst_rem.len();
        let candidates = if product < self.config.last_chance_size_threshold {
            self.exact.match_remainders(&src_rem, &dst_rem)
        } else {
            log::warn!(
                "last-chance skipped for {a} {b}: {} x {} nodes",
                src_rem.len(),
                dst_rem.len()
            );
            vec![]
        };

        let mut linked = 0;
        for (x, y) in candidates {
            if x == a || y == b {
                continue;
            }
            let (nx, ny) = (&self.src[x], &self.dst[y]);
            if nx.kind != ny.kind || self.flags.is_src(x) || self.flags.is_dst(y) {
                continue;
            }
            let parent_kinds = (
                nx.parent.map(|p| self.src[p].kind),
                ny.parent.map(|p| self.dst[p].kind),
            );
            if parent_kinds.0 != parent_kinds.1 {
                continue;
            }
            sink.add_match(x, y)?;
            self.flags.mark(x, y);
            linked += 1;
        }

        self.flags.mark(a, b);
        self.flags.mark_subtree(self.src, a);
        self.flags.mark_subtree(self.dst, b);
        Ok(linked)
    }
}
