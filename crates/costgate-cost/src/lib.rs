// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spend tracking, budget alerts, and pricing for Costgate.
//!
//! This crate provides:
//! - **Budget ledger**: persistent record of every call with transactional
//!   daily/monthly spend and once-per-period threshold alerts
//! - **Pricing**: call cost from catalog unit prices
//! - **Recommendations**: advisory cost-saving hints from recent usage

pub mod budget;
pub mod ledger;
pub mod pricing;
pub mod recommendations;

pub use budget::{AlertLevel, BudgetAlert, PeriodKind, PeriodStatus};
pub use ledger::{BudgetLedger, BudgetSummary, CallRecord, RecordOutcome};
pub use pricing::call_cost;
pub use recommendations::{Recommendation, RecommendationKind, UsageAggregates};
