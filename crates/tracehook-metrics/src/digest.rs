//! Human-readable digest printed at the end of a turn.

use std::fmt::Write;

use tracehook_core::MetricsSummary;

const RULE: &str = "========================================";

/// Render the console digest, or `None` if no agents were spawned.
///
/// Agent types are listed most used first, ties by name.
pub fn render_digest(summary: &MetricsSummary) -> Option<String> {
    if summary.total_agents_spawned == 0 {
        return None;
    }

    let mut by_count: Vec<(&String, &u64)> = summary.agents_by_type.iter().collect();
    by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "SESSION AGENT METRICS");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Agents spawned: {}", summary.total_agents_spawned);
    for (agent, count) in by_count {
        let _ = writeln!(out, "  - {}: {}", agent, count);
    }
    if summary.models_used.len() > 1 {
        let models: Vec<String> = summary
            .models_used
            .iter()
            .map(|(model, count)| format!("{} ({})", model, count))
            .collect();
        let _ = writeln!(out, "Models: {}", models.join(", "));
    }
    let _ = writeln!(out, "{}", RULE);

    Some(out)
}
