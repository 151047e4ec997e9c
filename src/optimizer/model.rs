use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Worst experience rank; also the default when none is known.
pub const WORST_EXPERIENCE_RANK: u32 = 100;

/// Identifies a role within a task by name, e.g. `Break the Bank::Muscle #1`.
///
/// Serialized as that `task::role` string so it can key a JSON map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityKey {
    task_name: String,
    role: String,
}

const KEY_SEPARATOR: &str = "::";

impl CapabilityKey {
    pub fn new(task_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            role: role.into(),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.task_name, self.role)
    }
}

#[derive(Debug, Error)]
#[error("capability key {0:?} is not of the form `task::role`")]
pub struct InvalidCapabilityKey(String);

impl TryFrom<String> for CapabilityKey {
    type Error = InvalidCapabilityKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(KEY_SEPARATOR) {
            Some((task, role)) if !task.is_empty() && !role.is_empty() => {
                Ok(CapabilityKey::new(task, role))
            }
            _ => Err(InvalidCapabilityKey(value)),
        }
    }
}

impl From<CapabilityKey> for String {
    fn from(key: CapabilityKey) -> Self {
        key.to_string()
    }
}

/// A member who can fill a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub display_name: String,
    /// Observed pass rate (0–100) per task role.
    #[serde(default)]
    pub capabilities: BTreeMap<CapabilityKey, f64>,
    /// 1 is the most experienced.
    #[serde(default = "default_experience_rank")]
    pub experience_rank: u32,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

fn default_experience_rank() -> u32 {
    WORST_EXPERIENCE_RANK
}

impl Actor {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            capabilities: BTreeMap::new(),
            experience_rank: WORST_EXPERIENCE_RANK,
            last_active_at: None,
        }
    }

    pub fn with_capability(mut self, task: &str, role: &str, score: f64) -> Self {
        self.capabilities.insert(CapabilityKey::new(task, role), score);
        self
    }

    pub fn with_experience_rank(mut self, rank: u32) -> Self {
        self.experience_rank = rank;
        self
    }

    pub fn with_last_active(mut self, at: DateTime<Utc>) -> Self {
        self.last_active_at = Some(at);
        self
    }

    /// Capability for `key`, clamped to 0–100. Unknown or malformed is 0.
    pub fn capability(&self, key: &CapabilityKey) -> f64 {
        self.capabilities
            .get(key)
            .copied()
            .filter(|v| v.is_finite())
            .map_or(0.0, |v| v.clamp(0.0, 100.0))
    }

    /// Experience rank clamped to 1–100.
    pub fn rank(&self) -> u32 {
        self.experience_rank.clamp(1, WORST_EXPERIENCE_RANK)
    }
}

/// One open, unfilled position in a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSlot {
    pub task_id: u64,
    pub task_name: String,
    pub role_position: String,
    pub position_id: u64,
    #[serde(default)]
    pub difficulty: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_value: u64,
    #[serde(default = "default_priority_weight")]
    pub priority_weight: f64,
}

fn default_priority_weight() -> f64 {
    1.0
}

impl TaskSlot {
    pub fn new(task_id: u64, task_name: impl Into<String>, role: impl Into<String>, position_id: u64) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            role_position: role.into(),
            position_id,
            difficulty: None,
            expires_at: None,
            expected_value: 0,
            priority_weight: default_priority_weight(),
        }
    }

    pub fn with_expected_value(mut self, value: u64) -> Self {
        self.expected_value = value;
        self
    }

    pub fn with_priority_weight(mut self, weight: f64) -> Self {
        self.priority_weight = weight;
        self
    }

    pub fn key(&self) -> CapabilityKey {
        CapabilityKey::new(self.task_name.as_str(), self.role_position.as_str())
    }

    /// Priority weight; non-finite or non-positive values fall back to 1.0.
    pub fn effective_priority_weight(&self) -> f64 {
        if self.priority_weight.is_finite() && self.priority_weight > 0.0 {
            self.priority_weight
        } else {
            default_priority_weight()
        }
    }
}

/// Capability seen outside the actor's own record, e.g. while in another faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityObservation {
    pub actor_id: u64,
    pub task_name: String,
    pub role: String,
    pub score: f64,
}

/// Which pass produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    /// The actor meets the qualify threshold for the slot.
    Capability,
    /// Matched on experience rank because nobody qualified.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub actor: Actor,
    pub slot: TaskSlot,
    pub score: f64,
    pub basis: MatchBasis,
    /// Capability value used for scoring, after role-group sharing.
    pub capability: f64,
    pub reasoning: String,
}

/// Output of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Sorted by descending score.
    pub assignments: Vec<Assignment>,
    pub total_score: f64,
    pub unfilled_slot_count: usize,
    pub unassigned_actor_count: usize,
    /// Position ids of slots nobody was matched to.
    pub unfilled_slots: Vec<u64>,
    /// Ids of actors left without a slot.
    pub unassigned_actors: Vec<u64>,
    pub recommendations: Vec<String>,
}

impl OptimizationResult {
    pub fn count_by_basis(&self, basis: MatchBasis) -> usize {
        self.assignments.iter().filter(|a| a.basis == basis).count()
    }

    pub fn average_score(&self) -> Option<f64> {
        if self.assignments.is_empty() {
            None
        } else {
            Some(self.total_score / self.assignments.len() as f64)
        }
    }
}
