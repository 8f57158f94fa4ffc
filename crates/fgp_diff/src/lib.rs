//! Fingerprint based approximate matching of ordered labeled trees.
//!
//! Subtrees are hashed into shape and content fingerprints, then matched in
//! two phases: identical subtrees top-down, remaining nodes bottom-up using
//! sparse feature vector similarities with branch-and-bound pruning.
//! An optional randomised pass refines the final mapping against an
//! edit cost model.

pub mod errors;
pub mod matchers;
pub mod tree;
/// end-to-end entry points
pub mod algorithms;

pub use algorithms::fingerprint::{FingerprintMatcher, MatchStats};
pub use errors::{MatchError, Result};
pub use matchers::heuristic::fgp::{
    FingerprintMatcherConfig, NonLocality, RefinementConfig, ScoringMode,
};

#[cfg(test)]
mod tests;
