// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costgate check` command implementation.

use costgate_config::CostgateConfig;

/// One catalog line per backend.
pub fn render_catalog(config: &CostgateConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:>10} {:>10} {:>10} {:>10} {:>5}\n",
        "backend", "in/1k", "out/1k", "context", "compliant", "rank"
    ));
    for b in &config.backends {
        out.push_str(&format!(
            "{:<20} {:>10.4} {:>10.4} {:>10} {:>10} {:>5}\n",
            b.id,
            b.input_unit_cost,
            b.output_unit_cost,
            b.max_context_tokens,
            if b.compliance_eligible { "yes" } else { "no" },
            b.capability_rank
        ));
    }
    out
}

/// Run the `costgate check` command. The config is already validated.
pub fn run_check(config: &CostgateConfig) {
    println!("costgate: configuration OK");
    println!(
        "budget: ${:.2}/day, ${:.2}/month, alerts at {:?}",
        config.budget.daily_budget_limit,
        config.budget.monthly_budget_limit,
        config.budget.alert_thresholds
    );
    println!(
        "cache: ttl {}d, max {} entries, semantic {} (threshold {:.2})",
        config.cache.ttl_days,
        config.cache.max_entries,
        if config.cache.semantic_enabled { "on" } else { "off" },
        config.cache.semantic_similarity_threshold
    );
    println!();
    print!("{}", render_catalog(config));
}
