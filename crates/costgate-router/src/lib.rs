// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request complexity analysis and backend routing.
//!
//! [`ComplexityAnalyzer`] scores a request with zero-cost heuristics;
//! [`ModelRouter`] turns the score plus current budget pressure into a
//! catalog choice.

pub mod analyzer;
pub mod keywords;
pub mod router;

pub use analyzer::{ComplexityAnalyzer, ComplexityScore, SubScores, TierThresholds, tier_for};
pub use keywords::{KEYWORD_RULES, KeywordCategory, KeywordRule};
pub use router::{ModelRouter, RoutingDecision};
