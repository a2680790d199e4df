// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Costgate.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use costgate_core::BackendDescriptor;
use serde::{Deserialize, Serialize};

/// Top-level Costgate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section defaults to a working local setup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostgateConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Ledger and cache store locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Spend limits and alert thresholds.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Hybrid cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Backend selection settings.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Complexity analyzer settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Request pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Request anonymization settings.
    #[serde(default)]
    pub privacy: PrivacyConfig,

    /// Advisory recommendation thresholds.
    #[serde(default)]
    pub recommendations: RecommendationConfig,

    /// Backend catalog, in declaration order. Order breaks routing ties.
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendDescriptor>,
}

impl Default for CostgateConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            storage: StorageConfig::default(),
            budget: BudgetConfig::default(),
            cache: CacheConfig::default(),
            routing: RoutingConfig::default(),
            analyzer: AnalyzerConfig::default(),
            pipeline: PipelineConfig::default(),
            privacy: PrivacyConfig::default(),
            recommendations: RecommendationConfig::default(),
            backends: default_backends(),
        }
    }
}

fn default_backends() -> Vec<BackendDescriptor> {
    vec![
        BackendDescriptor {
            id: "local-small".to_string(),
            input_unit_cost: 0.0002,
            output_unit_cost: 0.0006,
            max_context_tokens: 8_192,
            compliance_eligible: false,
            capability_rank: 1,
        },
        BackendDescriptor {
            id: "eu-standard".to_string(),
            input_unit_cost: 0.003,
            output_unit_cost: 0.009,
            max_context_tokens: 32_000,
            compliance_eligible: true,
            capability_rank: 2,
        },
        BackendDescriptor {
            id: "frontier-large".to_string(),
            input_unit_cost: 0.015,
            output_unit_cost: 0.06,
            max_context_tokens: 200_000,
            compliance_eligible: true,
            capability_rank: 3,
        },
    ]
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage configuration for the two independent SQLite stores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the ledger database file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Path to the cache database file.
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            cache_path: default_cache_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("costgate").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

fn default_ledger_path() -> String {
    data_file("ledger.db")
}

fn default_cache_path() -> String {
    data_file("cache.db")
}

fn default_wal_mode() -> bool {
    true
}

/// Budget limits and alert thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Daily spending limit in USD.
    #[serde(default = "default_daily_budget_limit")]
    pub daily_budget_limit: f64,

    /// Monthly spending limit in USD.
    #[serde(default = "default_monthly_budget_limit")]
    pub monthly_budget_limit: f64,

    /// Ascending fractions of the limit at which an alert fires once per period.
    #[serde(default = "default_alert_thresholds")]
    pub alert_thresholds: Vec<f64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_budget_limit: default_daily_budget_limit(),
            monthly_budget_limit: default_monthly_budget_limit(),
            alert_thresholds: default_alert_thresholds(),
        }
    }
}

fn default_daily_budget_limit() -> f64 {
    10.0
}

fn default_monthly_budget_limit() -> f64 {
    200.0
}

fn default_alert_thresholds() -> Vec<f64> {
    vec![0.5, 0.75, 0.9]
}

/// Hybrid cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Age in days after which an entry is logically dead.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,

    /// Upper bound on live exact entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Minimum cosine similarity for a semantic hit (0.0-1.0).
    #[serde(default = "default_semantic_similarity_threshold")]
    pub semantic_similarity_threshold: f64,

    /// Enable semantic (embedding) matching after an exact miss.
    #[serde(default = "default_semantic_enabled")]
    pub semantic_enabled: bool,

    /// An insert triggers an opportunistic eviction pass with probability 1/N.
    #[serde(default = "default_evict_sample_rate")]
    pub evict_sample_rate: u32,

    /// Seconds between background eviction passes.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            max_entries: default_max_entries(),
            semantic_similarity_threshold: default_semantic_similarity_threshold(),
            semantic_enabled: default_semantic_enabled(),
            evict_sample_rate: default_evict_sample_rate(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

fn default_ttl_days() -> u32 {
    7
}

fn default_max_entries() -> usize {
    10_000
}

fn default_semantic_similarity_threshold() -> f64 {
    0.85
}

fn default_semantic_enabled() -> bool {
    true
}

fn default_evict_sample_rate() -> u32 {
    20
}

fn default_eviction_interval_secs() -> u64 {
    300
}

/// Backend selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Budget pressure above which the cheapest eligible backend always wins.
    #[serde(default = "default_high_pressure_ratio")]
    pub high_pressure_ratio: f64,

    /// Medium-tier requests prefer backends whose input unit cost is below this.
    #[serde(default = "default_medium_input_cost_ceiling")]
    pub medium_input_cost_ceiling: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            high_pressure_ratio: default_high_pressure_ratio(),
            medium_input_cost_ceiling: default_medium_input_cost_ceiling(),
        }
    }
}

fn default_high_pressure_ratio() -> f64 {
    0.8
}

fn default_medium_input_cost_ceiling() -> f64 {
    0.005
}

/// Complexity analyzer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Scores below this are `simple`.
    #[serde(default = "default_simple_below")]
    pub simple_below: f64,

    /// Scores below this (and at or above `simple_below`) are `medium`.
    #[serde(default = "default_medium_below")]
    pub medium_below: f64,

    /// Longest accepted request (text plus context), in characters.
    #[serde(default = "default_max_request_chars")]
    pub max_request_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            simple_below: default_simple_below(),
            medium_below: default_medium_below(),
            max_request_chars: default_max_request_chars(),
        }
    }
}

fn default_simple_below() -> f64 {
    30.0
}

fn default_medium_below() -> f64 {
    70.0
}

fn default_max_request_chars() -> usize {
    100_000
}

/// Request pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Timeout for a single backend call, in seconds.
    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,

    /// Output token cap passed to backends.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Share one backend call between concurrent misses on the same key.
    #[serde(default = "default_coalesce_misses")]
    pub coalesce_misses: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend_timeout_secs: default_backend_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
            coalesce_misses: default_coalesce_misses(),
        }
    }
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_coalesce_misses() -> bool {
    true
}

/// Request anonymization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrivacyConfig {
    /// Disable to pass request text through unchanged.
    #[serde(default = "default_anonymize")]
    pub anonymize: bool,

    /// Literal values (customer names, project codenames) to mask in addition
    /// to the built-in patterns.
    #[serde(default)]
    pub extra_terms: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            anonymize: default_anonymize(),
            extra_terms: Vec::new(),
        }
    }
}

fn default_anonymize() -> bool {
    true
}

/// Thresholds for the advisory recommendations report.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecommendationConfig {
    /// Trailing window the aggregates cover, in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Warn when the cache hit rate falls below this fraction.
    #[serde(default = "default_min_cache_hit_rate")]
    pub min_cache_hit_rate: f64,

    /// Warn when high-cost backends served more simple requests than this.
    #[serde(default = "default_simple_overuse_limit")]
    pub simple_overuse_limit: u64,

    /// Warn when the average input exceeds this many tokens.
    #[serde(default = "default_max_avg_input_tokens")]
    pub max_avg_input_tokens: f64,

    /// Backends whose total unit cost reaches this are considered high-cost.
    #[serde(default = "default_high_cost_unit_threshold")]
    pub high_cost_unit_threshold: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            min_cache_hit_rate: default_min_cache_hit_rate(),
            simple_overuse_limit: default_simple_overuse_limit(),
            max_avg_input_tokens: default_max_avg_input_tokens(),
            high_cost_unit_threshold: default_high_cost_unit_threshold(),
        }
    }
}

fn default_window_days() -> u32 {
    30
}

fn default_min_cache_hit_rate() -> f64 {
    0.2
}

fn default_simple_overuse_limit() -> u64 {
    10
}

fn default_max_avg_input_tokens() -> f64 {
    1000.0
}

fn default_high_cost_unit_threshold() -> f64 {
    0.02
}
