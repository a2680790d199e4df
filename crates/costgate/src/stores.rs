// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening the ledger and cache stores named in the configuration.

use std::sync::Arc;

use costgate_cache::{CacheSettings, CacheStore, HybridCache};
use costgate_config::CostgateConfig;
use costgate_core::{Clock, CostgateError, SystemClock};
use costgate_cost::BudgetLedger;
use costgate_storage::Database;

pub async fn open_ledger(config: &CostgateConfig) -> Result<BudgetLedger, CostgateError> {
    let db = Database::open(&config.storage.ledger_path, config.storage.wal_mode).await?;
    Ok(BudgetLedger::new(db, &config.budget, system_clock()))
}

pub async fn open_cache(config: &CostgateConfig) -> Result<HybridCache, CostgateError> {
    let db = Database::open(&config.storage.cache_path, config.storage.wal_mode).await?;
    Ok(HybridCache::open(
        CacheStore::new(db),
        CacheSettings::from(&config.cache),
        system_clock(),
    )
    .await)
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
pub(crate) fn temp_config(dir: &std::path::Path) -> CostgateConfig {
    let mut config = CostgateConfig::default();
    config.storage.ledger_path = dir.join("ledger.db").to_string_lossy().into_owned();
    config.storage.cache_path = dir.join("cache.db").to_string_lossy().into_owned();
    config
}
