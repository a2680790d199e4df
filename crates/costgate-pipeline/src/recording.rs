// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder can collect these.
//! With no recorder installed every call is a no-op.

use metrics::{describe_counter, describe_histogram};

/// Register all Costgate metric descriptions.
///
/// Called once at startup after a recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "costgate_requests_total",
        "Pipeline requests by outcome (exact, semantic, coalesced, backend, error)"
    );
    describe_counter!("costgate_cache_lookups_total", "Cache lookups by result");
    describe_counter!("costgate_spend_usd_total", "Recorded spend in USD by backend");
    describe_counter!("costgate_tokens_total", "Backend tokens by backend and direction");
    describe_counter!("costgate_budget_alerts_total", "Budget alerts fired by period");
    describe_histogram!(
        "costgate_backend_latency_seconds",
        "Backend call latency in seconds"
    );
}

/// Record a finished request.
pub fn record_request(outcome: &'static str) {
    metrics::counter!("costgate_requests_total", "outcome" => outcome).increment(1);
}

/// Record a cache lookup result ("exact", "semantic", "miss").
pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("costgate_cache_lookups_total", "result" => result).increment(1);
}

/// Record a backend call's tokens, cost and latency.
pub fn record_backend_call(backend: &str, input: u32, output: u32, cost_usd: f64, seconds: f64) {
    metrics::counter!("costgate_tokens_total", "backend" => backend.to_string(), "type" => "input")
        .increment(u64::from(input));
    metrics::counter!("costgate_tokens_total", "backend" => backend.to_string(), "type" => "output")
        .increment(u64::from(output));
    // Counters are integral; spend is tracked in micro-dollars.
    metrics::counter!("costgate_spend_usd_total", "backend" => backend.to_string())
        .increment((cost_usd * 1_000_000.0).round() as u64);
    metrics::histogram!("costgate_backend_latency_seconds", "backend" => backend.to_string())
        .record(seconds);
}

/// Record fired budget alerts.
pub fn record_alert(period: &str) {
    metrics::counter!("costgate_budget_alerts_total", "period" => period.to_string()).increment(1);
}
