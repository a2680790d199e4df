// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget periods and threshold alerts.
//!
//! A period (one UTC day or month) tracks cumulative spend against its limit.
//! Each configured threshold fires at most once per period, as does the
//! `Exceeded` alert. Evaluation here is pure; the ledger persists which
//! alerts have fired inside the same transaction that adds the spend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Thresholds within this distance are the same threshold.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Which budget window a period covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Daily,
    Monthly,
}

impl PeriodKind {
    /// Period key for the instant: `YYYY-MM-DD` or `YYYY-MM`.
    pub fn key_for(&self, now: DateTime<Utc>) -> String {
        match self {
            PeriodKind::Daily => now.format("%Y-%m-%d").to_string(),
            PeriodKind::Monthly => now.format("%Y-%m").to_string(),
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "daily_budgets",
            PeriodKind::Monthly => "monthly_budgets",
        }
    }

    pub(crate) fn key_column(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "date",
            PeriodKind::Monthly => "month",
        }
    }
}

/// What an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "level", content = "threshold")]
pub enum AlertLevel {
    /// Spend crossed this fraction of the limit.
    Threshold(f64),
    /// Spend went over the limit.
    Exceeded,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Threshold(t) => write!(f, "{:.0}%", t * 100.0),
            AlertLevel::Exceeded => write!(f, "exceeded"),
        }
    }
}

/// A budget alert fired by one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub period: PeriodKind,
    pub period_key: String,
    pub level: AlertLevel,
    pub spend_usd: f64,
    pub limit_usd: f64,
}

/// Snapshot of one budget period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStatus {
    pub kind: PeriodKind,
    pub key: String,
    pub limit_usd: f64,
    pub used_usd: f64,
    /// Thresholds already fired this period, ascending.
    pub alerts_fired: Vec<f64>,
    pub exceeded_fired: bool,
}

impl PeriodStatus {
    /// A period with no spend yet.
    pub fn empty(kind: PeriodKind, key: String, limit_usd: f64) -> Self {
        Self {
            kind,
            key,
            limit_usd,
            used_usd: 0.0,
            alerts_fired: Vec::new(),
            exceeded_fired: false,
        }
    }

    /// Spend as a fraction of the limit. Zero for a non-positive limit.
    pub fn ratio(&self) -> f64 {
        if self.limit_usd > 0.0 {
            self.used_usd / self.limit_usd
        } else {
            0.0
        }
    }

    fn has_fired(&self, threshold: f64) -> bool {
        self.alerts_fired
            .iter()
            .any(|fired| (fired - threshold).abs() < THRESHOLD_EPSILON)
    }

    /// Determine alerts newly crossed, mark them fired, and return them.
    ///
    /// A threshold fires when `used / limit > threshold`; `Exceeded` fires when
    /// `used > limit`. Neither fires twice for one period.
    pub fn fire_new_alerts(&mut self, thresholds: &[f64]) -> Vec<BudgetAlert> {
        let ratio = self.ratio();
        let mut levels = Vec::new();
        for &threshold in thresholds {
            if ratio > threshold && !self.has_fired(threshold) {
                self.alerts_fired.push(threshold);
                levels.push(AlertLevel::Threshold(threshold));
            }
        }
        self.alerts_fired.sort_by(f64::total_cmp);

        if self.limit_usd > 0.0 && self.used_usd > self.limit_usd && !self.exceeded_fired {
            self.exceeded_fired = true;
            levels.push(AlertLevel::Exceeded);
        }

        levels
            .into_iter()
            .map(|level| BudgetAlert {
                period: self.kind,
                period_key: self.key.clone(),
                level,
                spend_usd: self.used_usd,
                limit_usd: self.limit_usd,
            })
            .collect()
    }
}
