// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costgate cache` command implementations.

use costgate_cache::CacheStats;
use costgate_config::CostgateConfig;
use costgate_core::CostgateError;
use serde::Serialize;

use crate::stores;

/// Structured stats output for `--json` mode.
#[derive(Debug, Serialize)]
struct StatsReport {
    #[serde(flatten)]
    stats: CacheStats,
    hit_rate: f64,
}

fn render_stats(stats: &CacheStats) -> String {
    format!(
        "entries:     {} ({} semantic, {} bytes)\n\
         hits:        {} exact, {} semantic\n\
         misses:      {}\n\
         hit rate:    {:.1}%\n\
         time saved:  {:.1}s\n",
        stats.entries,
        stats.semantic_entries,
        stats.bytes,
        stats.exact_hits,
        stats.semantic_hits,
        stats.misses,
        stats.hit_rate() * 100.0,
        stats.time_saved_ms as f64 / 1000.0
    )
}

/// Run the `costgate cache stats` command.
pub async fn run_stats(config: &CostgateConfig, json: bool) -> Result<(), CostgateError> {
    let cache = stores::open_cache(config).await?;
    let stats = cache.stats();
    if json {
        stores::print_json(&StatsReport {
            hit_rate: stats.hit_rate(),
            stats,
        });
    } else {
        print!("{}", render_stats(&stats));
    }
    Ok(())
}

/// Run the `costgate cache evict` command.
pub async fn run_evict(config: &CostgateConfig) -> Result<(), CostgateError> {
    let cache = stores::open_cache(config).await?;
    let report = cache.evict().await;
    println!(
        "evicted {} expired and {} least-recently-used entries; {} remain",
        report.expired,
        report.lru,
        cache.len()
    );
    Ok(())
}
