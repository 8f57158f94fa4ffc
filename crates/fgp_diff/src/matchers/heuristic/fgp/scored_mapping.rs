//! Mapping that keeps track of the edit cost it implies, and a randomised
//! local search lowering that cost.

use std::fmt::Display;

use bitvec::boxed::BitBox;
use enumset::{EnumSet, EnumSetType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::NodeIdx;
use super::RefinementConfig;
use super::fgp_tree::FgpTree;
use crate::errors::{MatchError, Result, Side};
use crate::matchers::mapping_store::{MappingStore, MonoMappingStore, VecStore};

/// Edit operations implied on a node by the current mapping.
#[derive(Debug, EnumSetType)]
pub enum EditOp {
    Delete,
    Insert,
    Update,
    Move,
}

/// Running counters of a [`ScoredMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CostState {
    pub deletes: usize,
    pub inserts: usize,
    pub updates: usize,
    pub moves: usize,
}

impl CostState {
    /// Moves weigh three times as much as other operations.
    pub fn cost(&self) -> f64 {
        (self.deletes + self.inserts + self.updates) as f64 + self.moves as f64 * 3.0
    }

    fn counter(&mut self, op: EditOp) -> &mut usize {
        match op {
            EditOp::Delete => &mut self.deletes,
            EditOp::Insert => &mut self.inserts,
            EditOp::Update => &mut self.updates,
            EditOp::Move => &mut self.moves,
        }
    }
}

impl Display for CostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Del {}, ins {}, upd {}, mov {}",
            self.deletes, self.inserts, self.updates, self.moves
        )
    }
}

/// One-to-one mapping between two decorated trees, with the edit operations
/// it implies maintained incrementally.
///
/// Unmapped src nodes are deleted, unmapped dst nodes are inserted. A mapped
/// dst node is updated when labels differ, and moved when the parents of the
/// pair are not mapped together. Linking or unlinking a pair only touches the
/// pair and the mappings between their children.
pub struct ScoredMapping<'a> {
    src: &'a FgpTree,
    dst: &'a FgpTree,
    mappings: VecStore<NodeIdx>,
    src_fixed: BitBox,
    dst_fixed: BitBox,
    src_ops: Vec<EnumSet<EditOp>>,
    dst_ops: Vec<EnumSet<EditOp>>,
    state: CostState,
}

impl<'a> ScoredMapping<'a> {
    pub fn new(src: &'a FgpTree, dst: &'a FgpTree) -> Self {
        let mut mappings = VecStore::default();
        mappings.topit(src.len(), dst.len());
        Self {
            src,
            dst,
            mappings,
            src_fixed: bitvec::bitbox![0; src.len()],
            dst_fixed: bitvec::bitbox![0; dst.len()],
            src_ops: vec![EditOp::Delete.into(); src.len()],
            dst_ops: vec![EditOp::Insert.into(); dst.len()],
            state: CostState {
                deletes: src.len(),
                inserts: dst.len(),
                ..Default::default()
            },
        }
    }

    pub fn cost(&self) -> f64 {
        self.state.cost()
    }

    pub fn cost_state(&self) -> CostState {
        self.state
    }

    pub fn mappings(&self) -> &VecStore<NodeIdx> {
        &self.mappings
    }

    pub fn dst_of(&self, a: NodeIdx) -> Option<NodeIdx> {
        self.mappings.get_dst(&a)
    }

    pub fn src_of(&self, b: NodeIdx) -> Option<NodeIdx> {
        self.mappings.get_src(&b)
    }

    pub fn src_ops(&self, a: NodeIdx) -> EnumSet<EditOp> {
        self.src_ops[a as usize]
    }

    pub fn dst_ops(&self, b: NodeIdx) -> EnumSet<EditOp> {
        self.dst_ops[b as usize]
    }

    pub fn is_fixed(&self, a: NodeIdx, b: NodeIdx) -> bool {
        self.src_fixed[a as usize] || self.dst_fixed[b as usize]
    }

    /// Links every pair of `mappings`.
    pub fn add_mappings<M>(&mut self, mappings: &M, fixed: bool) -> Result<()>
    where
        M: MonoMappingStore<Src = NodeIdx, Dst = NodeIdx>,
    {
        for (a, b) in mappings.iter() {
            self.link(a, b, fixed)?;
        }
        Ok(())
    }

    /// Links `a` and `b`, dropping the previous links of both.
    ///
    /// Fixed nodes can't be relinked.
    pub fn link(&mut self, a: NodeIdx, b: NodeIdx, fixed: bool) -> Result<()> {
        if self.is_fixed(a, b) {
            return Err(MatchError::FixedNodeRelink { a, b });
        }
        if let Some(old_b) = self.dst_of(a) {
            self.unregister(a, old_b);
        }
        if let Some(old_a) = self.src_of(b) {
            self.unregister(old_a, b);
        }
        self.register(a, b);
        self.src_fixed.set(a as usize, fixed);
        self.dst_fixed.set(b as usize, fixed);
        Ok(())
    }

    /// Removes the link between `a` and `b`, if any.
    pub fn unlink(&mut self, a: NodeIdx, b: NodeIdx) -> Result<()> {
        if !self.mappings.has(&a, &b) {
            return Ok(());
        }
        if self.is_fixed(a, b) {
            return Err(MatchError::FixedNodeRelink { a, b });
        }
        self.unregister(a, b);
        Ok(())
    }

    /// Exact change of cost if `a` and `b` were linked, the mapping is left untouched.
    pub fn link_delta(&mut self, a: NodeIdx, b: NodeIdx) -> Result<f64> {
        if self.mappings.has(&a, &b) {
            return Ok(0.0);
        }
        let before = self.cost();
        let old_b = self.dst_of(a);
        let old_a = self.src_of(b);
        self.link(a, b, false)?;
        let after = self.cost();
        self.unregister(a, b);
        if let Some(old_b) = old_b {
            self.register(a, old_b);
        }
        if let Some(old_a) = old_a {
            self.register(old_a, b);
        }
        Ok(after - before)
    }

    fn register(&mut self, a: NodeIdx, b: NodeIdx) {
        self.mappings.link(a, b);
        let mut ops = EnumSet::empty();
        if self.src[a].label != self.dst[b].label {
            ops |= EditOp::Update;
        }
        if self.would_link_move(a, b) {
            ops |= EditOp::Move;
        }
        self.remove_ops(Side::Src, a, EditOp::Delete.into());
        self.remove_ops(Side::Dst, b, EditOp::Insert.into());
        self.add_ops(Side::Dst, b, ops);
        for child in self.mapped_children(a, b) {
            self.remove_ops(Side::Dst, child, EditOp::Move.into());
        }
    }

    fn unregister(&mut self, a: NodeIdx, b: NodeIdx) {
        self.mappings.cut(a, b);
        self.add_ops(Side::Src, a, EditOp::Delete.into());
        self.add_ops(Side::Dst, b, EditOp::Insert.into());
        self.remove_ops(Side::Dst, b, EditOp::Update | EditOp::Move);
        for child in self.mapped_children(a, b) {
            self.add_ops(Side::Dst, child, EditOp::Move.into());
        }
    }

    fn would_link_move(&self, a: NodeIdx, b: NodeIdx) -> bool {
        match (self.src.parent(a), self.dst.parent(b)) {
            (None, None) => false,
            (Some(pa), Some(pb)) => !self.mappings.has(&pa, &pb),
            _ => true,
        }
    }

    /// Children of `b` mapped from children of `a`.
    fn mapped_children(&self, a: NodeIdx, b: NodeIdx) -> Vec<NodeIdx> {
        self.src
            .children(a)
            .iter()
            .filter_map(|ca| self.mappings.get_dst(ca))
            .filter(|cb| self.dst.parent(*cb) == Some(b))
            .collect()
    }

    fn ops_mut(&mut self, side: Side, i: NodeIdx) -> &mut EnumSet<EditOp> {
        match side {
            Side::Src => &mut self.src_ops[i as usize],
            Side::Dst => &mut self.dst_ops[i as usize],
        }
    }

    fn add_ops(&mut self, side: Side, i: NodeIdx, ops: EnumSet<EditOp>) {
        let current = self.ops_mut(side, i);
        let added = ops - *current;
        *current |= ops;
        for op in added {
            *self.state.counter(op) += 1;
        }
    }

    fn remove_ops(&mut self, side: Side, i: NodeIdx, ops: EnumSet<EditOp>) {
        let current = self.ops_mut(side, i);
        let removed = ops & *current;
        *current -= ops;
        for op in removed {
            *self.state.counter(op) -= 1;
        }
    }
}

/// Greedy stochastic hill climbing over a [`ScoredMapping`].
///
/// Each step samples a node of either population and a few random candidates
/// on the other side, then relinks the node with the candidate lowering the
/// cost the most, if any does.
pub struct Refiner<'m, 'a> {
    mapping: &'m mut ScoredMapping<'a>,
    nodes_a: Vec<NodeIdx>,
    nodes_b: Vec<NodeIdx>,
    rng: StdRng,
    swaps_per_node: usize,
    trials_per_swap: usize,
}

impl<'m, 'a> Refiner<'m, 'a> {
    pub fn new(
        mapping: &'m mut ScoredMapping<'a>,
        nodes_a: Vec<NodeIdx>,
        nodes_b: Vec<NodeIdx>,
        config: &RefinementConfig,
    ) -> Self {
        Self {
            mapping,
            nodes_a,
            nodes_b,
            rng: StdRng::seed_from_u64(config.seed),
            swaps_per_node: config.swaps_per_node,
            trials_per_swap: config.trials_per_swap,
        }
    }

    pub fn mapping(&self) -> &ScoredMapping<'a> {
        self.mapping
    }

    pub fn iterations(&self) -> usize {
        (self.nodes_a.len() + self.nodes_b.len()) * self.swaps_per_node
    }

    /// Runs every iteration, returns the number of accepted relinks.
    pub fn run(mut self) -> Result<usize> {
        let mut swaps = 0;
        for _ in 0..self.iterations() {
            if self.step()? {
                swaps += 1;
            }
        }
        Ok(swaps)
    }

    /// One iteration, true if a relink was accepted.
    pub fn step(&mut self) -> Result<bool> {
        let (na, nb) = (self.nodes_a.len(), self.nodes_b.len());
        if na == 0 || nb == 0 {
            return Ok(false);
        }
        let picked = self.rng.random_range(0..na + nb);
        let best = if picked < na {
            let a = self.nodes_a[picked];
            let mut best = None;
            let mut best_delta = 0.0;
            for _ in 0..self.trials_per_swap {
                let b = self.nodes_b[self.rng.random_range(0..nb)];
                if !self.is_candidate(a, b, self.mapping.dst_of(a), b, Side::Dst) {
                    continue;
                }
                let delta = self.mapping.link_delta(a, b)?;
                if delta < best_delta {
                    best = Some((a, b));
                    best_delta = delta;
                }
            }
            best
        } else {
            let b = self.nodes_b[picked - na];
            let mut best = None;
            let mut best_delta = 0.0;
            for _ in 0..self.trials_per_swap {
                let a = self.nodes_a[self.rng.random_range(0..na)];
                if !self.is_candidate(a, b, self.mapping.src_of(b), a, Side::Src) {
                    continue;
                }
                let delta = self.mapping.link_delta(a, b)?;
                if delta < best_delta {
                    best = Some((a, b));
                    best_delta = delta;
                }
            }
            best
        };
        match best {
            Some((a, b)) => {
                log::trace!("refinement relinks {a} {b}");
                self.mapping.link(a, b, false)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Siblings of the current partner are not candidates, nor are
    /// nodes of another kind or fixed ones.
    fn is_candidate(
        &self,
        a: NodeIdx,
        b: NodeIdx,
        existing: Option<NodeIdx>,
        candidate: NodeIdx,
        side: Side,
    ) -> bool {
        let tree = match side {
            Side::Src => self.mapping.src,
            Side::Dst => self.mapping.dst,
        };
        if let Some(existing) = existing {
            let parent = tree.parent(existing);
            if parent.is_some() && parent == tree.parent(candidate) {
                return false;
            }
        }
        self.mapping.src[a].kind == self.mapping.dst[b].kind && !self.mapping.is_fixed(a, b)
    }
}
