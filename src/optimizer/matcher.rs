use chrono::{DateTime, Utc};
use tracing::debug;

use super::OptimizerConfig;
use super::model::{Actor, Assignment, CapabilityObservation, MatchBasis, OptimizationResult, TaskSlot};
use super::reasoning;
use super::roles;
use super::scoring::ScoringModel;

/// Two-pass greedy matcher.
///
/// Each round takes the single best remaining pair and consumes both sides.
/// Pass 1 only considers pairs where the actor meets the qualify threshold;
/// pass 2 only the rest, scored with the fallback formula. A pass ends when
/// its best pair scores below `min_acceptance_score`.
///
/// Ties go to the earlier actor, then the earlier slot, in input order.
/// Every round rescans the remaining matrix: O(n·m·min(n, m)).
#[derive(Debug, Clone)]
pub struct Matcher {
    config: OptimizerConfig,
    scoring: ScoringModel,
}

struct Pool<'a> {
    actors: &'a [Actor],
    slots: &'a [TaskSlot],
    actor_used: Vec<bool>,
    slot_used: Vec<bool>,
}

impl Matcher {
    pub fn new(config: OptimizerConfig, now: DateTime<Utc>) -> Self {
        let scoring = ScoringModel::new(&config, now);
        Self { config, scoring }
    }

    pub fn scoring(&self) -> &ScoringModel {
        &self.scoring
    }

    /// Matches using only the capability data carried by `actors`.
    pub fn match_slots(&self, actors: &[Actor], slots: &[TaskSlot]) -> OptimizationResult {
        self.optimize(actors, slots, &[])
    }

    /// Normalizes role groups (folding in outside observations), then runs
    /// both passes.
    pub fn optimize(
        &self,
        actors: &[Actor],
        slots: &[TaskSlot],
        observations: &[CapabilityObservation],
    ) -> OptimizationResult {
        let actors = roles::normalize(actors, slots, observations);
        let mut pool = Pool {
            actors: &actors,
            slots,
            actor_used: vec![false; actors.len()],
            slot_used: vec![false; slots.len()],
        };

        let mut assignments = self.greedy_pass(&mut pool, MatchBasis::Capability);
        let qualified = assignments.len();
        assignments.extend(self.greedy_pass(&mut pool, MatchBasis::Fallback));
        debug!(
            actors = actors.len(),
            slots = slots.len(),
            qualified,
            fallback = assignments.len() - qualified,
            "matching finished"
        );

        assignments.sort_by(|a, b| b.score.total_cmp(&a.score));
        let total_score = assignments.iter().map(|a| a.score).sum();

        let unfilled_slots: Vec<u64> = slots
            .iter()
            .zip(&pool.slot_used)
            .filter(|(_, used)| !**used)
            .map(|(slot, _)| slot.position_id)
            .collect();
        let unassigned_actors: Vec<u64> = actors
            .iter()
            .zip(&pool.actor_used)
            .filter(|(_, used)| !**used)
            .map(|(actor, _)| actor.id)
            .collect();

        let mut result = OptimizationResult {
            assignments,
            total_score,
            unfilled_slot_count: unfilled_slots.len(),
            unassigned_actor_count: unassigned_actors.len(),
            unfilled_slots,
            unassigned_actors,
            recommendations: Vec::new(),
        };
        result.recommendations = reasoning::recommendations(&result, actors.len(), slots.len());
        result
    }

    fn greedy_pass(&self, pool: &mut Pool<'_>, basis: MatchBasis) -> Vec<Assignment> {
        let want_qualified = basis == MatchBasis::Capability;
        let mut out = Vec::new();

        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for (ai, actor) in pool.actors.iter().enumerate() {
                if pool.actor_used[ai] {
                    continue;
                }
                for (si, slot) in pool.slots.iter().enumerate() {
                    if pool.slot_used[si] || self.scoring.is_qualified(actor, slot) != want_qualified {
                        continue;
                    }
                    let score = self.scoring.score(actor, slot, want_qualified);
                    if best.is_none_or(|(_, _, top)| score > top) {
                        best = Some((ai, si, score));
                    }
                }
            }

            let Some((ai, si, score)) = best else {
                break;
            };
            if score < self.config.min_acceptance_score {
                debug!(?basis, best = score, "best remaining pair below acceptance score");
                break;
            }

            pool.actor_used[ai] = true;
            pool.slot_used[si] = true;
            let actor = &pool.actors[ai];
            let slot = &pool.slots[si];
            let capability = actor.capability(&slot.key());
            let breakdown = self.scoring.breakdown(actor, slot, basis);
            out.push(Assignment {
                actor: actor.clone(),
                slot: slot.clone(),
                score,
                basis,
                capability,
                reasoning: reasoning::explain(
                    actor,
                    slot,
                    basis,
                    &breakdown,
                    capability,
                    self.scoring.qualify_threshold(),
                ),
            });
        }

        out
    }
}
