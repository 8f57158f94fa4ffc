//! Fingerprint matcher family.
//!
//! Both input trees are decorated into flat arenas ([`fgp_tree::FgpTree`])
//! carrying subtree fingerprints and sparse feature vectors. Identical
//! subtrees are then matched top-down ([`top_down_matcher`]), the rest is
//! matched bottom-up by similarity with lazily refined scores
//! ([`bottom_up_matcher`]), optionally followed by a randomised cost driven
//! refinement ([`scored_mapping`]).

use serde::{Deserialize, Serialize};

pub mod bottom_up_matcher;
pub mod context_table;
pub mod feature_table;
pub mod feature_vector;
pub mod fgp_tree;
pub mod fingerprint_table;
pub mod scored_mapping;
pub mod scoring;
pub mod top_down_matcher;

/// Position of a decorated node in its arena, in pre-order.
pub type NodeIdx = u32;

/// Dense index handed out by a [`fingerprint_table::FingerprintTable`].
pub type FingerprintIdx = u32;

/// Environment variable overriding the similarity threshold.
pub const SIM_THRESHOLD_ENV: &str = "FGSIM";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintMatcherConfig {
    /// Minimum similarity for a bottom-up match.
    pub similarity_threshold: f64,
    /// Nodes lower than this are left out of the bottom-up phase.
    pub bottom_up_height_threshold: usize,
    /// Last-chance matching only runs when the product of both remainder sizes is below this.
    pub last_chance_size_threshold: usize,
    /// Top-down matching stops at this height.
    pub top_down_min_depth: usize,
    pub scoring: ScoringMode,
    pub non_locality: NonLocality,
    /// `None` disables the randomised refinement.
    pub refinement: Option<RefinementConfig>,
}

impl Default for FingerprintMatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            bottom_up_height_threshold: 2,
            last_chance_size_threshold: 500_000,
            top_down_min_depth: 0,
            scoring: ScoringMode::default(),
            non_locality: NonLocality::default(),
            refinement: None,
        }
    }
}

impl FingerprintMatcherConfig {
    /// Reads [`SIM_THRESHOLD_ENV`] once into the returned config.
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(SIM_THRESHOLD_ENV).ok();
        self.with_similarity_override(value.as_deref())
    }

    pub(crate) fn with_similarity_override(mut self, value: Option<&str>) -> Self {
        let Some(value) = value else {
            return self;
        };
        match value.trim().parse::<f64>() {
            Ok(threshold) if threshold.is_finite() => {
                log::debug!("similarity threshold set from {SIM_THRESHOLD_ENV} to {threshold}");
                self.similarity_threshold = threshold;
            }
            _ => log::warn!("ignoring unparsable {SIM_THRESHOLD_ENV}={value:?}"),
        }
        self
    }
}

/// How bottom-up candidates are ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoringMode {
    /// Local jaccard similarity weighted by the similarity of the ancestries,
    /// optionally blended with the similarity of the siblings.
    AncestryContext { sibling_weight: f64 },
    /// Local jaccard similarity plus small positional terms.
    Histogram,
    /// Smallest feature cost first, positional costs included.
    Cost,
}

impl Default for ScoringMode {
    fn default() -> Self {
        ScoringMode::AncestryContext {
            sibling_weight: 0.0,
        }
    }
}

/// Scaling applied to child features when they are accumulated into their parent,
/// `(1/child_count)^balance_exp * scaling`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonLocality {
    pub scaling: f64,
    pub balance_exp: f64,
}

impl Default for NonLocality {
    fn default() -> Self {
        Self {
            scaling: 1.0,
            balance_exp: 0.0,
        }
    }
}

impl NonLocality {
    pub fn factor(&self, child_count: usize) -> f64 {
        (1.0 / child_count as f64).powf(self.balance_exp) * self.scaling
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    pub seed: u64,
    pub swaps_per_node: usize,
    pub trials_per_swap: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            swaps_per_node: 15,
            trials_per_swap: 35,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_override() {
        let config = FingerprintMatcherConfig::default();
        assert_eq!(config.clone().with_similarity_override(None), config);
        assert_eq!(
            config
                .clone()
                .with_similarity_override(Some(" 0.5 "))
                .similarity_threshold,
            0.5
        );
        assert_eq!(
            config
                .clone()
                .with_similarity_override(Some("high"))
                .similarity_threshold,
            0.3
        );
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: FingerprintMatcherConfig = serde_json::from_str(
            r#"{"similarity_threshold": 0.5, "refinement": {"seed": 7}, "scoring": "Histogram"}"#,
        )
        .unwrap();
        assert_eq!(config.similarity_threshold, 0.5);
        assert_eq!(config.bottom_up_height_threshold, 2);
        assert_eq!(config.scoring, ScoringMode::Histogram);
        let refinement = config.refinement.unwrap();
        assert_eq!(refinement.seed, 7);
        assert_eq!(refinement.trials_per_swap, 35);
    }

    #[test]
    fn non_locality_factor() {
        assert_eq!(NonLocality::default().factor(0), 1.0);
        assert_eq!(NonLocality::default().factor(4), 1.0);
        let nl = NonLocality {
            scaling: 0.5,
            balance_exp: 1.0,
        };
        assert_eq!(nl.factor(4), 0.125);
    }
}
