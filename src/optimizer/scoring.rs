use chrono::{DateTime, TimeDelta, Utc};

use super::OptimizerConfig;
use super::model::{Actor, MatchBasis, TaskSlot};

const PRIORITY_CAP: f64 = 2.0;

/// Weighted components of one pair's score. Each field is already multiplied
/// by its weight, so the fields sum to the unclamped score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub capability: f64,
    pub expected_value: f64,
    pub priority: f64,
    pub activity: f64,
    pub experience: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        let sum = self.capability + self.expected_value + self.priority + self.activity + self.experience;
        sum.clamp(0.0, 1.0)
    }
}

/// Desirability of an (actor, slot) pair, in [0, 1].
///
/// Qualified pairs are scored mostly on priority and observed capability.
/// The fallback formula uses experience rank instead, with less weight on
/// expected value, so it never outranks a proven actor.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    qualify_threshold: f64,
    expected_value_cap: f64,
    now: DateTime<Utc>,
}

impl ScoringModel {
    /// `now` is the reference time for activity; using the snapshot time keeps
    /// runs reproducible.
    pub fn new(config: &OptimizerConfig, now: DateTime<Utc>) -> Self {
        Self {
            qualify_threshold: config.qualify_threshold,
            expected_value_cap: config.expected_value_cap.max(1) as f64,
            now,
        }
    }

    pub fn qualify_threshold(&self) -> f64 {
        self.qualify_threshold
    }

    pub fn is_qualified(&self, actor: &Actor, slot: &TaskSlot) -> bool {
        actor.capability(&slot.key()) >= self.qualify_threshold
    }

    pub fn score(&self, actor: &Actor, slot: &TaskSlot, qualified: bool) -> f64 {
        let basis = if qualified {
            MatchBasis::Capability
        } else {
            MatchBasis::Fallback
        };
        self.breakdown(actor, slot, basis).total()
    }

    pub fn breakdown(&self, actor: &Actor, slot: &TaskSlot, basis: MatchBasis) -> ScoreBreakdown {
        let value = (slot.expected_value as f64 / self.expected_value_cap).min(1.0);
        let priority = slot.effective_priority_weight().min(PRIORITY_CAP) / PRIORITY_CAP;
        let experience = f64::from(101 - actor.rank()) / 100.0;
        let activity = self.activity(actor);

        match basis {
            MatchBasis::Capability => ScoreBreakdown {
                capability: 0.30 * actor.capability(&slot.key()) / 100.0,
                expected_value: 0.20 * value,
                priority: 0.50 * priority,
                activity: 0.05 * activity,
                experience: 0.05 * experience,
            },
            MatchBasis::Fallback => ScoreBreakdown {
                capability: 0.0,
                expected_value: 0.10 * value,
                priority: 0.50 * priority,
                activity: 0.10 * activity,
                experience: 0.30 * experience,
            },
        }
    }

    /// Recency factor: 1.0 within a day, 0.8 within a week, 0.6 within 30
    /// days, 0.4 beyond that, 0.3 with no recorded activity.
    pub fn activity(&self, actor: &Actor) -> f64 {
        let Some(last) = actor.last_active_at else {
            return 0.3;
        };
        let idle = self.now - last;
        if idle <= TimeDelta::days(1) {
            1.0
        } else if idle <= TimeDelta::days(7) {
            0.8
        } else if idle <= TimeDelta::days(30) {
            0.6
        } else {
            0.4
        }
    }
}
