//! Capability sharing between numbered variants of one role.
//!
//! "Muscle #1" and "Muscle #2" in the same task ask for the same skill, so an
//! actor's capability for any variant is the best value seen for the base
//! role, across the actor's own record and outside observations.

use std::collections::{BTreeSet, HashMap};

use super::model::{Actor, CapabilityKey, CapabilityObservation, TaskSlot};

/// Strips a trailing variant number: `"Muscle #2"` → `"Muscle"`.
pub fn base_role(position: &str) -> &str {
    let trimmed = position.trim();
    if let Some((base, suffix)) = trimmed.rsplit_once('#')
        && !suffix.is_empty()
        && suffix.chars().all(|c| c.is_ascii_digit())
    {
        return base.trim_end();
    }
    trimmed
}

/// Best known capability per (actor, task, base role).
#[derive(Debug, Default)]
pub struct RoleGroups {
    best: HashMap<(u64, String, String), f64>,
}

impl RoleGroups {
    pub fn build(actors: &[Actor], observations: &[CapabilityObservation]) -> Self {
        let mut groups = Self::default();
        for actor in actors {
            for (key, &score) in &actor.capabilities {
                groups.observe(actor.id, key.task_name(), key.role(), score);
            }
        }
        for obs in observations {
            groups.observe(obs.actor_id, &obs.task_name, &obs.role, obs.score);
        }
        groups
    }

    fn observe(&mut self, actor_id: u64, task: &str, role: &str, score: f64) {
        if !score.is_finite() {
            return;
        }
        let score = score.clamp(0.0, 100.0);
        let entry = self
            .best
            .entry((actor_id, task.to_string(), base_role(role).to_string()))
            .or_insert(score);
        if score > *entry {
            *entry = score;
        }
    }

    pub fn shared_capability(&self, actor_id: u64, key: &CapabilityKey) -> Option<f64> {
        self.best
            .get(&(
                actor_id,
                key.task_name().to_string(),
                base_role(key.role()).to_string(),
            ))
            .copied()
    }
}

/// Returns copies of `actors` whose capability for every role they or the
/// slots mention is raised to the best value of its role group.
pub fn normalize(
    actors: &[Actor],
    slots: &[TaskSlot],
    observations: &[CapabilityObservation],
) -> Vec<Actor> {
    let groups = RoleGroups::build(actors, observations);
    let slot_keys: BTreeSet<CapabilityKey> = slots.iter().map(TaskSlot::key).collect();

    actors
        .iter()
        .map(|actor| {
            let mut actor = actor.clone();
            let keys: BTreeSet<CapabilityKey> = actor
                .capabilities
                .keys()
                .cloned()
                .chain(slot_keys.iter().cloned())
                .collect();
            for key in keys {
                if let Some(best) = groups.shared_capability(actor.id, &key) {
                    actor.capabilities.insert(key, best);
                }
            }
            actor
        })
        .collect()
}
