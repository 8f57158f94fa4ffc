use thiserror::Error;

use crate::matchers::heuristic::fgp::NodeIdx;

/// Which of the two trees a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Src,
    Dst,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Src => write!(f, "src"),
            Side::Dst => write!(f, "dst"),
        }
    }
}

/// Failures of a matching run.
///
/// None of these are transient: each one points at a logic defect or at
/// an input that breaks the tree model contract, so callers should not retry.
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("bottom-up pruning ended with {remaining} pairs left in the {heap} heap")]
    HeapNotExhausted { heap: &'static str, remaining: usize },
    #[error("cannot relink fixed nodes (src {a}, dst {b})")]
    FixedNodeRelink { a: NodeIdx, b: NodeIdx },
    #[error("jaccard union is zero while intersection is {intersection}")]
    InconsistentJaccard { intersection: f64, union: f64 },
    #[error("no decorated {side} node for source id {id}")]
    UnknownSourceNode { side: Side, id: usize },
    #[error("source id {id} appears more than once in the {side} tree")]
    DuplicateSourceId { side: Side, id: usize },
}

pub type Result<T, E = MatchError> = std::result::Result<T, E>;
