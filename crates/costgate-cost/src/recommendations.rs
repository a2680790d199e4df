// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisory cost-saving recommendations.
//!
//! Derived from trailing-window usage aggregates; nothing here changes
//! routing or caching behavior.

use costgate_config::model::RecommendationConfig;
use costgate_core::BackendDescriptor;
use serde::Serialize;
use strum::Display;

/// Usage totals over the recommendation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageAggregates {
    pub total_calls: u64,
    pub cached_calls: u64,
    /// Mean input tokens over backend (non-cached) calls.
    pub avg_input_tokens: f64,
    /// `(backend_id, count)` of non-cached simple-tier calls.
    pub simple_calls_by_backend: Vec<(String, u64)>,
}

impl UsageAggregates {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.cached_calls as f64 / self.total_calls as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    LowCacheHitRate,
    ExpensiveBackendForSimpleRequests,
    LargeInputs,
}

/// One advisory message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

/// Produce recommendations from aggregates.
pub fn recommend(
    usage: &UsageAggregates,
    catalog: &[BackendDescriptor],
    config: &RecommendationConfig,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if usage.total_calls > 0 && usage.cache_hit_rate() < config.min_cache_hit_rate {
        out.push(Recommendation {
            kind: RecommendationKind::LowCacheHitRate,
            message: format!(
                "cache hit rate is {:.1}% over the last {} days (target {:.0}%); \
                 consider a longer TTL or a lower semantic similarity threshold",
                usage.cache_hit_rate() * 100.0,
                config.window_days,
                config.min_cache_hit_rate * 100.0
            ),
        });
    }

    for (backend_id, count) in &usage.simple_calls_by_backend {
        let Some(backend) = catalog.iter().find(|b| &b.id == backend_id) else {
            continue;
        };
        if backend.total_unit_cost() >= config.high_cost_unit_threshold
            && *count > config.simple_overuse_limit
        {
            out.push(Recommendation {
                kind: RecommendationKind::ExpensiveBackendForSimpleRequests,
                message: format!(
                    "high-cost backend `{backend_id}` served {count} simple requests; \
                     route simple requests to a cheaper backend"
                ),
            });
        }
    }

    if usage.avg_input_tokens > config.max_avg_input_tokens {
        out.push(Recommendation {
            kind: RecommendationKind::LargeInputs,
            message: format!(
                "average input is {:.0} tokens (limit {:.0}); trim context or summarize \
                 before sending",
                usage.avg_input_tokens, config.max_avg_input_tokens
            ),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<BackendDescriptor> {
        vec![
            BackendDescriptor {
                id: "cheap".into(),
                input_unit_cost: 0.0002,
                output_unit_cost: 0.0006,
                max_context_tokens: 8_192,
                compliance_eligible: false,
                capability_rank: 1,
            },
            BackendDescriptor {
                id: "frontier".into(),
                input_unit_cost: 0.015,
                output_unit_cost: 0.06,
                max_context_tokens: 200_000,
                compliance_eligible: true,
                capability_rank: 3,
            },
        ]
    }

    fn kinds(recs: &[Recommendation]) -> Vec<RecommendationKind> {
        recs.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn no_usage_no_recommendations() {
        let recs = recommend(
            &UsageAggregates::default(),
            &catalog(),
            &RecommendationConfig::default(),
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn low_hit_rate_is_flagged() {
        let usage = UsageAggregates {
            total_calls: 100,
            cached_calls: 10,
            avg_input_tokens: 200.0,
            simple_calls_by_backend: vec![],
        };
        let recs = recommend(&usage, &catalog(), &RecommendationConfig::default());
        assert_eq!(kinds(&recs), vec![RecommendationKind::LowCacheHitRate]);
        assert!(recs[0].message.contains("10.0%"));
    }

    #[test]
    fn expensive_backend_for_simple_requests_is_flagged() {
        let usage = UsageAggregates {
            total_calls: 50,
            cached_calls: 25,
            avg_input_tokens: 100.0,
            simple_calls_by_backend: vec![("frontier".into(), 11), ("cheap".into(), 500)],
        };
        let recs = recommend(&usage, &catalog(), &RecommendationConfig::default());
        assert_eq!(
            kinds(&recs),
            vec![RecommendationKind::ExpensiveBackendForSimpleRequests]
        );
        assert!(recs[0].message.contains("`frontier`"));
    }

    #[test]
    fn overuse_limit_is_exclusive() {
        let usage = UsageAggregates {
            total_calls: 50,
            cached_calls: 25,
            avg_input_tokens: 100.0,
            simple_calls_by_backend: vec![("frontier".into(), 10)],
        };
        assert!(recommend(&usage, &catalog(), &RecommendationConfig::default()).is_empty());
    }

    #[test]
    fn large_inputs_are_flagged() {
        let usage = UsageAggregates {
            total_calls: 10,
            cached_calls: 5,
            avg_input_tokens: 1500.0,
            simple_calls_by_backend: vec![],
        };
        let recs = recommend(&usage, &catalog(), &RecommendationConfig::default());
        assert_eq!(kinds(&recs), vec![RecommendationKind::LargeInputs]);
    }
}
