// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: positive limits,
//! ascending thresholds, a usable backend catalog.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::CostgateConfig;

/// Validate a deserialized configuration.
///
/// Collects every violation rather than failing on the first.
pub fn validate_config(config: &CostgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.ledger_path.trim().is_empty() {
        fail("storage.ledger_path must not be empty".to_string());
    }
    if config.storage.cache_path.trim().is_empty() {
        fail("storage.cache_path must not be empty".to_string());
    }

    // Budget
    let budget = &config.budget;
    if !(budget.daily_budget_limit > 0.0) {
        fail(format!(
            "budget.daily_budget_limit must be positive, got {}",
            budget.daily_budget_limit
        ));
    }
    if !(budget.monthly_budget_limit > 0.0) {
        fail(format!(
            "budget.monthly_budget_limit must be positive, got {}",
            budget.monthly_budget_limit
        ));
    }
    for t in &budget.alert_thresholds {
        if !(*t > 0.0 && *t <= 1.0) {
            fail(format!(
                "budget.alert_thresholds values must be in (0, 1], got {t}"
            ));
        }
    }
    if budget.alert_thresholds.windows(2).any(|w| w[0] >= w[1]) {
        fail("budget.alert_thresholds must be strictly ascending".to_string());
    }

    // Cache
    let cache = &config.cache;
    if cache.ttl_days == 0 {
        fail("cache.ttl_days must be at least 1".to_string());
    }
    if cache.max_entries == 0 {
        fail("cache.max_entries must be at least 1".to_string());
    }
    if !(0.0..=1.0).contains(&cache.semantic_similarity_threshold) {
        fail(format!(
            "cache.semantic_similarity_threshold must be in [0, 1], got {}",
            cache.semantic_similarity_threshold
        ));
    }
    if cache.evict_sample_rate == 0 {
        fail("cache.evict_sample_rate must be at least 1".to_string());
    }
    if cache.eviction_interval_secs == 0 {
        fail("cache.eviction_interval_secs must be at least 1".to_string());
    }

    // Routing
    let ratio = config.routing.high_pressure_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        fail(format!(
            "routing.high_pressure_ratio must be in (0, 1], got {ratio}"
        ));
    }
    if config.routing.medium_input_cost_ceiling < 0.0 {
        fail(format!(
            "routing.medium_input_cost_ceiling must be non-negative, got {}",
            config.routing.medium_input_cost_ceiling
        ));
    }

    // Analyzer
    let analyzer = &config.analyzer;
    if !(analyzer.simple_below > 0.0
        && analyzer.simple_below < analyzer.medium_below
        && analyzer.medium_below <= 100.0)
    {
        fail(format!(
            "analyzer thresholds must satisfy 0 < simple_below < medium_below <= 100, got {} and {}",
            analyzer.simple_below, analyzer.medium_below
        ));
    }
    if analyzer.max_request_chars == 0 {
        fail("analyzer.max_request_chars must be at least 1".to_string());
    }

    // Pipeline
    if config.pipeline.backend_timeout_secs == 0 {
        fail("pipeline.backend_timeout_secs must be at least 1".to_string());
    }
    if config.pipeline.max_output_tokens == 0 {
        fail("pipeline.max_output_tokens must be at least 1".to_string());
    }

    // Recommendations
    let rec = &config.recommendations;
    if rec.window_days == 0 {
        fail("recommendations.window_days must be at least 1".to_string());
    }
    if !(0.0..=1.0).contains(&rec.min_cache_hit_rate) {
        fail(format!(
            "recommendations.min_cache_hit_rate must be in [0, 1], got {}",
            rec.min_cache_hit_rate
        ));
    }

    // Backend catalog
    if config.backends.is_empty() {
        fail("at least one [[backends]] entry is required".to_string());
    }
    let mut seen_ids = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        if backend.id.trim().is_empty() {
            fail(format!("backends[{i}].id must not be empty"));
        } else if !seen_ids.insert(backend.id.as_str()) {
            fail(format!(
                "duplicate backend id `{}` in [[backends]] array",
                backend.id
            ));
        }
        if backend.input_unit_cost < 0.0 || backend.output_unit_cost < 0.0 {
            fail(format!(
                "backends[{i}] `{}` has a negative unit cost",
                backend.id
            ));
        }
        if backend.max_context_tokens == 0 {
            fail(format!(
                "backends[{i}] `{}` must accept at least one context token",
                backend.id
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
