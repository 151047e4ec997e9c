//! Human-readable justification for assignments and for the run as a whole.

use super::model::{Actor, MatchBasis, OptimizationResult, TaskSlot};
use super::scoring::ScoreBreakdown;

/// Average score below which the plan is flagged as weak.
const LOW_AVERAGE_SCORE: f64 = 0.4;

/// Explains one assignment by citing the factors that dominated its score.
pub fn explain(
    actor: &Actor,
    slot: &TaskSlot,
    basis: MatchBasis,
    breakdown: &ScoreBreakdown,
    capability: f64,
    qualify_threshold: f64,
) -> String {
    match basis {
        MatchBasis::Capability => {
            let mut factors = [
                (breakdown.priority, Factor::Priority),
                (breakdown.capability, Factor::Capability),
                (breakdown.expected_value, Factor::ExpectedValue),
            ];
            // Stable: on equal weight the order above wins.
            factors.sort_by(|a, b| b.0.total_cmp(&a.0));
            let cited: Vec<String> = factors
                .iter()
                .filter(|(weight, _)| *weight > 0.0)
                .take(2)
                .map(|(_, factor)| factor.describe(slot, capability))
                .collect();
            format!(
                "{} fits {} ({}): {}",
                actor.display_name,
                slot.role_position,
                slot.task_name,
                cited.join(", ")
            )
        }
        MatchBasis::Fallback => format!(
            "Fallback: nobody left meets {threshold:.0}% for {role} ({task}); \
             {name} picked on experience rank {rank}/100 with {cap:.0}% observed capability",
            threshold = qualify_threshold,
            role = slot.role_position,
            task = slot.task_name,
            name = actor.display_name,
            rank = actor.rank(),
            cap = capability,
        ),
    }
}

#[derive(Debug, Clone, Copy)]
enum Factor {
    Priority,
    Capability,
    ExpectedValue,
}

impl Factor {
    fn describe(self, slot: &TaskSlot, capability: f64) -> String {
        match self {
            Factor::Priority => format!(
                "priority weight {:.2}",
                slot.effective_priority_weight()
            ),
            Factor::Capability => format!("{capability:.0}% pass rate in this role"),
            Factor::ExpectedValue => {
                format!("expected value ${}", format_thousands(slot.expected_value))
            }
        }
    }
}

fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Faction-level advice derived from a finished run.
pub fn recommendations(result: &OptimizationResult, actor_count: usize, slot_count: usize) -> Vec<String> {
    if slot_count == 0 {
        return if actor_count == 0 {
            vec!["No open slots and no available members in this snapshot.".to_string()]
        } else {
            vec![format!(
                "No open slots; {actor_count} available member(s) have nothing to join. Consider starting new tasks."
            )]
        };
    }
    if actor_count == 0 {
        return vec![format!(
            "{slot_count} open slot(s) but no available members. Recruit or free up members."
        )];
    }

    let mut out = Vec::new();

    if result.unfilled_slot_count > 0 {
        if slot_count > actor_count {
            out.push(format!(
                "{} slot(s) left unfilled: open slots outnumber available members by {}.",
                result.unfilled_slot_count,
                slot_count - actor_count
            ));
        } else {
            out.push(format!(
                "{} slot(s) left unfilled: no remaining member scored high enough.",
                result.unfilled_slot_count
            ));
        }
    }

    if result.unassigned_actor_count > 0 {
        out.push(format!(
            "{} member(s) without a slot. Consider opening more tasks.",
            result.unassigned_actor_count
        ));
    }

    let fallback = result.count_by_basis(MatchBasis::Fallback);
    if fallback > 0 {
        out.push(format!(
            "{fallback} assignment(s) rely on experience rank rather than proven capability; expect lower success odds."
        ));
    }

    if let Some(avg) = result.average_score()
        && avg < LOW_AVERAGE_SCORE
    {
        out.push(format!(
            "Average assignment score is {avg:.2}; most matches are weak."
        ));
    }

    out
}
