//! Saída de terminal: spinner de sincronização e relatório de escalação.
//!
//! Usa `indicatif` para o spinner e `console` para as cores.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use faction_ops::optimizer::{MatchBasis, OptimizationResult};
use faction_ops::sync::SyncReport;

/// Spinner exibido enquanto as facções são sincronizadas.
pub struct SyncProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl SyncProgress {
    pub fn start(factions: &[u64]) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        let ids: Vec<String> = factions.iter().map(u64::to_string).collect();
        pb.set_message(format!("Syncing faction(s) {}", ids.join(", ")));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Para o spinner e lista o que foi salvo, o que falhou e se houve interrupção.
    pub fn complete(&self, report: &SyncReport) {
        self.pb.finish_and_clear();
        for (id, path) in &report.saved {
            println!(
                "  {} faction {id} -> {}",
                self.green.apply_to("✓"),
                path.display()
            );
        }
        for (id, reason) in &report.failed {
            println!("  {} faction {id}: {reason}", self.red.apply_to("✗"));
        }
        if report.interrupted {
            println!("  {} interrupted, remaining factions skipped", self.yellow.apply_to("!"));
        }
    }
}

/// Imprime a escalação com o raciocínio de cada par e as recomendações.
pub fn print_optimization(faction_id: u64, result: &OptimizationResult) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();
    let green = Style::new().green();
    let yellow = Style::new().yellow();

    println!(
        "{}",
        bold.apply_to(format!("─── Faction {faction_id}: assignments ───"))
    );
    if result.assignments.is_empty() {
        println!("  {}", dim.apply_to("(none)"));
    }
    for a in &result.assignments {
        let tag = match a.basis {
            MatchBasis::Capability => green.apply_to("capability"),
            MatchBasis::Fallback => yellow.apply_to("fallback"),
        };
        println!(
            "  {:.3}  {} -> {} #{} [{}]",
            a.score, a.actor.display_name, a.slot.role_position, a.slot.position_id, tag
        );
        println!("         {}", dim.apply_to(&a.reasoning));
    }

    println!();
    println!(
        "  total {:.3} | avg {} | unfilled {} | idle {}",
        result.total_score,
        result
            .average_score()
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "-".to_string()),
        result.unfilled_slot_count,
        result.unassigned_actor_count
    );
    if !result.unfilled_slots.is_empty() {
        println!("  unfilled positions: {}", join_ids(&result.unfilled_slots));
    }
    if !result.unassigned_actors.is_empty() {
        println!("  idle members: {}", join_ids(&result.unassigned_actors));
    }

    if !result.recommendations.is_empty() {
        println!();
        println!("{}", bold.apply_to("─── Recommendations ───"));
        for rec in &result.recommendations {
            println!("  • {rec}");
        }
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}
