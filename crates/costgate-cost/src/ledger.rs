// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget ledger persisting every call and the running spend per period.
//!
//! Recording a call appends it to `api_calls`, adds its cost to the current
//! daily and monthly periods, and fires any newly crossed alerts, all in one
//! SQLite transaction on the store's single writer thread. Concurrent
//! records therefore never lose an increment and never fire an alert twice.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use costgate_config::model::{BudgetConfig, RecommendationConfig};
use costgate_core::{BackendDescriptor, Clock, ComplexityTier, CostgateError};
use costgate_storage::{Database, map_tr_err};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::budget::{BudgetAlert, PeriodKind, PeriodStatus};
use crate::recommendations::{Recommendation, UsageAggregates, recommend};

/// Buffered alerts per subscriber before the oldest are dropped.
const ALERT_CHANNEL_CAPACITY: usize = 64;

/// One call to record, cached or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Caller-chosen id; a second record with the same id is rejected.
    pub idempotency_id: String,
    pub backend_id: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    /// Served from cache (or a coalesced leader) without a backend call.
    pub cached: bool,
    pub complexity_score: f64,
    pub tier: ComplexityTier,
}

impl CallRecord {
    /// A backend call with a fresh idempotency id.
    pub fn new(
        backend_id: impl Into<String>,
        input_tokens: u32,
        output_tokens: u32,
        cost_usd: f64,
        tier: ComplexityTier,
        complexity_score: f64,
    ) -> Self {
        Self {
            idempotency_id: uuid::Uuid::new_v4().to_string(),
            backend_id: backend_id.into(),
            input_tokens,
            output_tokens,
            cost_usd,
            cached: false,
            complexity_score,
            tier,
        }
    }

    /// A zero-cost cache hit attributed to the backend that produced the entry.
    pub fn cached_hit(
        backend_id: impl Into<String>,
        tier: ComplexityTier,
        complexity_score: f64,
    ) -> Self {
        Self {
            cached: true,
            ..Self::new(backend_id, 0, 0, 0.0, tier, complexity_score)
        }
    }
}

/// What recording a call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    /// Alerts fired by this record, daily before monthly.
    pub alerts: Vec<BudgetAlert>,
    /// Daily period after the increment.
    pub daily: PeriodStatus,
    /// Monthly period after the increment.
    pub monthly: PeriodStatus,
}

/// Spend overview for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub today_spend: f64,
    pub month_spend: f64,
    pub total_spend: f64,
    pub total_calls: u64,
    pub cached_calls: u64,
    pub cache_hit_rate: f64,
    pub daily_budget: f64,
    pub monthly_budget: f64,
}

enum Attempt {
    Recorded(RecordOutcome),
    Duplicate { daily: PeriodStatus, monthly: PeriodStatus },
}

/// Persistent spend ledger with daily and monthly budgets.
pub struct BudgetLedger {
    db: Database,
    clock: Arc<dyn Clock>,
    daily_limit: f64,
    monthly_limit: f64,
    thresholds: Vec<f64>,
    alerts: broadcast::Sender<BudgetAlert>,
}

impl BudgetLedger {
    /// Create a ledger over a migrated ledger store.
    pub fn new(db: Database, config: &BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        let mut thresholds = config.alert_thresholds.clone();
        thresholds.sort_by(f64::total_cmp);
        Self {
            db,
            clock,
            daily_limit: config.daily_budget_limit,
            monthly_limit: config.monthly_budget_limit,
            thresholds,
            alerts,
        }
    }

    /// Receive every alert fired after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BudgetAlert> {
        self.alerts.subscribe()
    }

    fn limit(&self, kind: PeriodKind) -> f64 {
        match kind {
            PeriodKind::Daily => self.daily_limit,
            PeriodKind::Monthly => self.monthly_limit,
        }
    }

    /// Append a call and charge its cost to the current periods.
    ///
    /// Fails with `DuplicateRecord` when the idempotency id is already
    /// recorded. A storage failure is retried once; if the retry finds the id
    /// already committed, the first attempt succeeded and the call reports
    /// success without alerts.
    pub async fn record_call(&self, record: &CallRecord) -> Result<RecordOutcome, CostgateError> {
        match self.try_record(record).await {
            Ok(Attempt::Recorded(outcome)) => {
                self.publish(record, &outcome);
                Ok(outcome)
            }
            Ok(Attempt::Duplicate { .. }) => Err(CostgateError::DuplicateRecord {
                idempotency_id: record.idempotency_id.clone(),
            }),
            Err(first) if first.is_storage() => {
                warn!(
                    idempotency_id = %record.idempotency_id,
                    error = %first,
                    "ledger write failed, retrying once"
                );
                match self.try_record(record).await? {
                    Attempt::Recorded(outcome) => {
                        self.publish(record, &outcome);
                        Ok(outcome)
                    }
                    Attempt::Duplicate { daily, monthly } => {
                        debug!(
                            idempotency_id = %record.idempotency_id,
                            "retry found record already committed"
                        );
                        Ok(RecordOutcome {
                            alerts: Vec::new(),
                            daily,
                            monthly,
                        })
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn try_record(&self, record: &CallRecord) -> Result<Attempt, CostgateError> {
        let record = record.clone();
        let now = self.clock.now();
        let created_at = timestamp(now);
        let periods = [
            (PeriodKind::Daily, PeriodKind::Daily.key_for(now), self.daily_limit),
            (PeriodKind::Monthly, PeriodKind::Monthly.key_for(now), self.monthly_limit),
        ];
        let thresholds = self.thresholds.clone();

        self.db
            .connection()
            .call(move |conn| -> Result<Attempt, rusqlite::Error> {
                let tx = conn.transaction()?;

                let exists: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM api_calls WHERE idempotency_id = ?1",
                        rusqlite::params![record.idempotency_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    let [daily, monthly] = periods.map(|(kind, key, limit)| {
                        load_period(&tx, kind, &key, limit)
                    });
                    return Ok(Attempt::Duplicate {
                        daily: daily?,
                        monthly: monthly?,
                    });
                }

                let inserted = tx.execute(
                    "INSERT INTO api_calls (created_at, backend_id, input_tokens, output_tokens, \
                     cost_usd, cached, complexity_score, tier, idempotency_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        created_at,
                        record.backend_id,
                        record.input_tokens,
                        record.output_tokens,
                        record.cost_usd,
                        record.cached,
                        record.complexity_score,
                        record.tier.to_string(),
                        record.idempotency_id,
                    ],
                );
                match inserted {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        let [daily, monthly] = periods.map(|(kind, key, limit)| {
                            load_period(&tx, kind, &key, limit)
                        });
                        return Ok(Attempt::Duplicate {
                            daily: daily?,
                            monthly: monthly?,
                        });
                    }
                    Err(e) => return Err(e),
                }

                let mut alerts = Vec::new();
                let mut statuses = Vec::with_capacity(2);
                for (kind, key, limit) in &periods {
                    add_spend(&tx, *kind, key, *limit, record.cost_usd)?;
                    let mut status = load_period(&tx, *kind, key, *limit)?;
                    let fired = status.fire_new_alerts(&thresholds);
                    if !fired.is_empty() {
                        store_fired(&tx, &status)?;
                    }
                    alerts.extend(fired);
                    statuses.push(status);
                }

                tx.commit()?;
                let monthly = statuses.pop().ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                let daily = statuses.pop().ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                Ok(Attempt::Recorded(RecordOutcome {
                    alerts,
                    daily,
                    monthly,
                }))
            })
            .await
            .map_err(map_tr_err)
    }

    fn publish(&self, record: &CallRecord, outcome: &RecordOutcome) {
        debug!(
            idempotency_id = %record.idempotency_id,
            backend_id = %record.backend_id,
            cost_usd = record.cost_usd,
            cached = record.cached,
            daily_used = outcome.daily.used_usd,
            "call recorded"
        );
        for alert in &outcome.alerts {
            self.emit(alert);
        }
    }

    fn emit(&self, alert: &BudgetAlert) {
        warn!(
            period = %alert.period,
            period_key = %alert.period_key,
            level = %alert.level,
            spend_usd = alert.spend_usd,
            limit_usd = alert.limit_usd,
            "budget alert"
        );
        // No subscribers is fine.
        let _ = self.alerts.send(alert.clone());
    }

    /// Evaluate the current period's thresholds outside of a record.
    ///
    /// Picks up alerts that became due after a limit change. Fires nothing
    /// already fired.
    pub async fn check_thresholds(
        &self,
        period: PeriodKind,
    ) -> Result<Vec<BudgetAlert>, CostgateError> {
        let key = period.key_for(self.clock.now());
        let limit = self.limit(period);
        let thresholds = self.thresholds.clone();

        let alerts = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<BudgetAlert>, rusqlite::Error> {
                let tx = conn.transaction()?;
                if !period_exists(&tx, period, &key)? {
                    return Ok(Vec::new());
                }
                tx.execute(
                    &format!(
                        "UPDATE {} SET limit_usd = ?2 WHERE {} = ?1",
                        period.table(),
                        period.key_column()
                    ),
                    rusqlite::params![key, limit],
                )?;
                let mut status = load_period(&tx, period, &key, limit)?;
                let fired = status.fire_new_alerts(&thresholds);
                if !fired.is_empty() {
                    store_fired(&tx, &status)?;
                }
                tx.commit()?;
                Ok(fired)
            })
            .await
            .map_err(map_tr_err)?;

        for alert in &alerts {
            self.emit(alert);
        }
        Ok(alerts)
    }

    /// Current status of one period (empty if nothing was spent yet).
    pub async fn period_status(&self, period: PeriodKind) -> Result<PeriodStatus, CostgateError> {
        let key = period.key_for(self.clock.now());
        let limit = self.limit(period);
        self.db
            .connection()
            .call(move |conn| load_period(conn, period, &key, limit))
            .await
            .map_err(map_tr_err)
    }

    /// The higher of the daily and monthly spend ratios.
    pub async fn budget_pressure(&self) -> Result<f64, CostgateError> {
        let daily = self.period_status(PeriodKind::Daily).await?;
        let monthly = self.period_status(PeriodKind::Monthly).await?;
        Ok(daily.ratio().max(monthly.ratio()))
    }

    /// Spend and cache totals across all records.
    pub async fn summary(&self) -> Result<BudgetSummary, CostgateError> {
        let daily = self.period_status(PeriodKind::Daily).await?;
        let monthly = self.period_status(PeriodKind::Monthly).await?;

        let (total_spend, total_calls, cached_calls) = self
            .db
            .connection()
            .call(|conn| -> Result<(f64, i64, i64), rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(SUM(cost_usd), 0.0), COUNT(*), COALESCE(SUM(cached), 0) \
                     FROM api_calls",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
            })
            .await
            .map_err(map_tr_err)?;

        let cache_hit_rate = if total_calls > 0 {
            cached_calls as f64 / total_calls as f64
        } else {
            0.0
        };

        Ok(BudgetSummary {
            today_spend: daily.used_usd,
            month_spend: monthly.used_usd,
            total_spend,
            total_calls: total_calls as u64,
            cached_calls: cached_calls as u64,
            cache_hit_rate,
            daily_budget: self.daily_limit,
            monthly_budget: self.monthly_limit,
        })
    }

    /// Usage totals over the trailing `window_days`.
    pub async fn usage_aggregates(&self, window_days: u32) -> Result<UsageAggregates, CostgateError> {
        let since = timestamp(self.clock.now() - Duration::days(i64::from(window_days)));

        self.db
            .connection()
            .call(move |conn| -> Result<UsageAggregates, rusqlite::Error> {
                let (total, cached, avg_input): (i64, i64, f64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(cached), 0), \
                     COALESCE(AVG(CASE WHEN cached = 0 THEN input_tokens END), 0.0) \
                     FROM api_calls WHERE created_at >= ?1",
                    rusqlite::params![since],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;

                let mut stmt = conn.prepare(
                    "SELECT backend_id, COUNT(*) FROM api_calls \
                     WHERE created_at >= ?1 AND cached = 0 AND tier = 'simple' \
                     GROUP BY backend_id ORDER BY backend_id",
                )?;
                let simple_calls_by_backend = stmt
                    .query_map(rusqlite::params![since], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(UsageAggregates {
                    total_calls: total as u64,
                    cached_calls: cached as u64,
                    avg_input_tokens: avg_input,
                    simple_calls_by_backend,
                })
            })
            .await
            .map_err(map_tr_err)
    }

    /// Advisory recommendations from the trailing window.
    pub async fn recommendations(
        &self,
        catalog: &[BackendDescriptor],
        config: &RecommendationConfig,
    ) -> Result<Vec<Recommendation>, CostgateError> {
        let usage = self.usage_aggregates(config.window_days).await?;
        let recs = recommend(&usage, catalog, config);
        info!(
            window_days = config.window_days,
            total_calls = usage.total_calls,
            count = recs.len(),
            "recommendations computed"
        );
        Ok(recs)
    }
}

/// RFC 3339 with millisecond precision, so stored timestamps sort as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn period_exists(conn: &Connection, kind: PeriodKind, key: &str) -> Result<bool, rusqlite::Error> {
    let found: Option<i64> = conn
        .query_row(
            &format!(
                "SELECT 1 FROM {} WHERE {} = ?1",
                kind.table(),
                kind.key_column()
            ),
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Create the period if needed and add `cost` to its spend.
fn add_spend(
    conn: &Connection,
    kind: PeriodKind,
    key: &str,
    limit: f64,
    cost: f64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} ({}, limit_usd) VALUES (?1, ?2)",
            kind.table(),
            kind.key_column()
        ),
        rusqlite::params![key, limit],
    )?;
    conn.execute(
        &format!(
            "UPDATE {} SET used_usd = used_usd + ?2, limit_usd = ?3 WHERE {} = ?1",
            kind.table(),
            kind.key_column()
        ),
        rusqlite::params![key, cost, limit],
    )?;
    Ok(())
}

/// Read a period, or an empty one if it has no row yet.
fn load_period(
    conn: &Connection,
    kind: PeriodKind,
    key: &str,
    default_limit: f64,
) -> Result<PeriodStatus, rusqlite::Error> {
    let row: Option<(f64, f64, String, bool)> = conn
        .query_row(
            &format!(
                "SELECT limit_usd, used_usd, alerts_fired, exceeded_fired FROM {} WHERE {} = ?1",
                kind.table(),
                kind.key_column()
            ),
            rusqlite::params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((limit_usd, used_usd, fired_json, exceeded_fired)) = row else {
        return Ok(PeriodStatus::empty(kind, key.to_string(), default_limit));
    };
    let alerts_fired: Vec<f64> = serde_json::from_str(&fired_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(PeriodStatus {
        kind,
        key: key.to_string(),
        limit_usd,
        used_usd,
        alerts_fired,
        exceeded_fired,
    })
}

fn store_fired(conn: &Connection, status: &PeriodStatus) -> Result<(), rusqlite::Error> {
    let fired_json = serde_json::to_string(&status.alerts_fired)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        &format!(
            "UPDATE {} SET alerts_fired = ?2, exceeded_fired = ?3 WHERE {} = ?1",
            status.kind.table(),
            status.kind.key_column()
        ),
        rusqlite::params![status.key, fired_json, status.exceeded_fired],
    )?;
    Ok(())
}
