// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./costgate.toml` > `~/.config/costgate/costgate.toml`
//! > `/etc/costgate/costgate.toml`, with environment variable overrides via the
//! `COSTGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CostgateConfig;

/// Section names that environment variables may target.
const ENV_SECTIONS: &[&str] = &[
    "log",
    "storage",
    "budget",
    "cache",
    "routing",
    "analyzer",
    "pipeline",
    "privacy",
    "recommendations",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/costgate/costgate.toml` (system-wide)
/// 3. `~/.config/costgate/costgate.toml` (user XDG config)
/// 4. `./costgate.toml` (local directory)
/// 5. `COSTGATE_*` environment variables
pub fn load_config() -> Result<CostgateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and embedding.
pub fn load_config_from_str(toml_content: &str) -> Result<CostgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CostgateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CostgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CostgateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CostgateConfig::default()))
        .merge(Toml::file("/etc/costgate/costgate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("costgate/costgate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("costgate.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `COSTGATE_BUDGET_DAILY_BUDGET_LIMIT` must map to
/// `budget.daily_budget_limit`, not `budget.daily.budget.limit`.
fn env_provider() -> Env {
    Env::prefixed("COSTGATE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
