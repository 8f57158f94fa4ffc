//! Matchers associate nodes in pairs of trees.
//!
//! The produced mappings are partial injections between the nodes of a
//! source and a destination tree. Interpreting them, a downstream edit script
//! generator derives the inserts, deletes, moves and updates that turn one
//! tree into the other.

pub mod heuristic;
pub mod mapping_store;
pub mod optimal;

use crate::matchers::heuristic::fgp::NodeIdx;
use crate::matchers::heuristic::fgp::fgp_tree::FgpTree;
use crate::matchers::mapping_store::{MappingStore, MonoMappingStore};

/// Both arenas and the mappings computed over them.
#[derive(Debug)]
pub struct Mapping<Dsrc, Ddst, M> {
    pub src_arena: Dsrc,
    pub dst_arena: Ddst,
    pub mappings: M,
}

impl<Dsrc, Ddst, M: MappingStore> Mapping<Dsrc, Ddst, M> {
    pub fn mappings(&self) -> &M {
        &self.mappings
    }
}

/// Mappings over both decorated trees, as produced by the fingerprint matcher.
pub type Mapper<M> = Mapping<FgpTree, FgpTree, M>;

impl<M: MonoMappingStore<Src = NodeIdx, Dst = NodeIdx>> Mapping<FgpTree, FgpTree, M> {
    /// Mapped pairs in the ids of the input trees, ordered by source node.
    pub fn source_pairs(&self) -> Vec<(usize, usize)> {
        self.mappings
            .iter()
            .map(|(a, b)| (self.src_arena[a].source_id, self.dst_arena[b].source_id))
            .collect()
    }

    pub fn src_of_source(&self, dst_id: usize) -> Option<usize> {
        let b = self.dst_arena.node_mapping().get(dst_id)?;
        let a = self.mappings.get_src(&b)?;
        Some(self.src_arena[a].source_id)
    }

    pub fn dst_of_source(&self, src_id: usize) -> Option<usize> {
        let a = self.src_arena.node_mapping().get(src_id)?;
        let b = self.mappings.get_dst(&a)?;
        Some(self.dst_arena[b].source_id)
    }
}
