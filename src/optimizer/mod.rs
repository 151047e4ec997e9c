//! Assignment optimizer: role-group normalization, scoring, two-pass greedy
//! matching and reasoning. Pure and synchronous; no I/O.

mod matcher;
mod model;
mod reasoning;
mod roles;
mod scoring;

use serde::{Deserialize, Serialize};

pub use matcher::Matcher;
pub use model::{
    Actor, Assignment, CapabilityKey, CapabilityObservation, InvalidCapabilityKey, MatchBasis,
    OptimizationResult, TaskSlot, WORST_EXPERIENCE_RANK,
};
pub use reasoning::{explain, recommendations};
pub use roles::{RoleGroups, base_role, normalize};
pub use scoring::{ScoreBreakdown, ScoringModel};

/// Tunables for one optimization run (`[optimizer]` in the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Minimum capability (0–100) for the capability-based formula.
    #[serde(default = "default_qualify_threshold")]
    pub qualify_threshold: f64,

    /// Greedy rounds stop once the best remaining pair scores below this.
    #[serde(default = "default_min_acceptance_score")]
    pub min_acceptance_score: f64,

    /// Expected value at which the value factor saturates.
    #[serde(default = "default_expected_value_cap")]
    pub expected_value_cap: u64,
}

fn default_qualify_threshold() -> f64 {
    60.0
}

fn default_min_acceptance_score() -> f64 {
    0.1
}

fn default_expected_value_cap() -> u64 {
    50_000_000
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            qualify_threshold: default_qualify_threshold(),
            min_acceptance_score: default_min_acceptance_score(),
            expected_value_cap: default_expected_value_cap(),
        }
    }
}
