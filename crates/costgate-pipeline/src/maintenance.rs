// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background cache eviction and budget threshold re-checks.

use std::sync::Arc;
use std::time::Duration;

use costgate_cache::HybridCache;
use costgate_cost::{BudgetLedger, PeriodKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::recording;

/// Run one maintenance pass: evict, flush cache metrics, re-check budgets.
pub async fn run_maintenance(cache: &HybridCache, ledger: &BudgetLedger) {
    let report = cache.evict().await;
    if report.expired + report.lru > 0 {
        info!(
            expired = report.expired,
            lru = report.lru,
            remaining = cache.len(),
            "cache eviction"
        );
    }
    cache.flush_metrics().await;

    for period in [PeriodKind::Daily, PeriodKind::Monthly] {
        match ledger.check_thresholds(period).await {
            Ok(alerts) => {
                for alert in &alerts {
                    recording::record_alert(&alert.period.to_string());
                }
            }
            Err(e) => warn!(error = %e, %period, "budget threshold check failed"),
        }
    }
}

/// Spawn the maintenance loop. Runs every `interval` until `cancel` fires.
pub fn spawn_maintenance(
    cache: Arc<HybridCache>,
    ledger: Arc<BudgetLedger>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("maintenance stopped");
                    break;
                }
                _ = ticker.tick() => run_maintenance(&cache, &ledger).await,
            }
        }
        cache.flush_metrics().await;
    })
}
