// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costgate analyze` command implementation.
//!
//! Runs the request-path decisions (anonymize, validate, score, route)
//! without calling a backend or touching the cache.

use chrono::Utc;
use costgate_config::CostgateConfig;
use costgate_core::{CostgateError, Request};
use costgate_router::{ComplexityAnalyzer, ComplexityScore, ModelRouter, RoutingDecision};
use costgate_security::Anonymizer;
use serde::Serialize;
use tracing::warn;

use crate::stores;

/// Structured output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct AnalyzeReport {
    pub cache_key: String,
    pub score: ComplexityScore,
    pub routing: RoutingDecision,
}

/// Score and route one request against `budget_pressure`.
pub fn analyze_request(
    config: &CostgateConfig,
    text: String,
    context: Option<String>,
    backend: Option<String>,
    budget_pressure: f64,
) -> Result<AnalyzeReport, CostgateError> {
    let anonymizer = Anonymizer::new(&config.privacy);
    let request = Request::new(
        anonymizer.apply(&text),
        context.map(|c| anonymizer.apply(&c)),
        backend,
        Utc::now(),
        config.analyzer.max_request_chars,
    )?;

    let analyzer = ComplexityAnalyzer::from_config(&config.analyzer);
    let router = ModelRouter::new(config.backends.clone(), &config.routing);
    let score = analyzer.analyze(request.text(), request.context());
    let routing =
        router.select_with_preference(&score, budget_pressure, request.backend_class())?;

    Ok(AnalyzeReport {
        cache_key: request.cache_key().to_string(),
        score,
        routing,
    })
}

fn render(report: &AnalyzeReport) -> String {
    let s = &report.score.sub_scores;
    let mut out = format!(
        "tier:        {}\n\
         overall:     {:.1}\n  \
         length {:.1}, code {:.1}, keywords {:.1}, compliance {:.1}, density {:.1}\n",
        report.score.tier,
        report.score.overall,
        s.length,
        s.code_structure,
        s.keyword,
        s.compliance,
        s.technical_density
    );
    if report.score.compliance_required() {
        let terms: Vec<&str> = report.score.compliance_terms.iter().map(String::as_str).collect();
        out.push_str(&format!("compliance:  {}\n", terms.join(", ")));
    }
    out.push_str(&format!(
        "backend:     {}\nreason:      {}\npressure:    {:.0}%\n",
        report.routing.backend.id,
        report.routing.reason,
        report.routing.budget_pressure * 100.0
    ));
    out
}

/// Run the `costgate analyze` command.
pub async fn run_analyze(
    config: &CostgateConfig,
    text: String,
    context: Option<String>,
    backend: Option<String>,
    json: bool,
) -> Result<(), CostgateError> {
    let pressure = match stores::open_ledger(config).await {
        Ok(ledger) => ledger.budget_pressure().await.unwrap_or_else(|e| {
            warn!(error = %e, "budget pressure unavailable, assuming none");
            0.0
        }),
        Err(e) => {
            warn!(error = %e, "ledger unavailable, assuming no budget pressure");
            0.0
        }
    };

    let report = analyze_request(config, text, context, backend, pressure)?;
    if json {
        stores::print_json(&report);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}
