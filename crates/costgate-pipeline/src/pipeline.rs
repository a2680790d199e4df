// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request orchestration.
//!
//! anonymize → validate → analyze → cache lookup → (miss) route → backend
//! call → ledger record → cache insert. Budget alerts are advisory and never
//! block a call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use costgate_cache::{CacheHit, HybridCache};
use costgate_config::model::CostgateConfig;
use costgate_core::{BackendAdapter, CacheKey, Clock, CostgateError, Request};
use costgate_cost::{BudgetAlert, BudgetLedger, CallRecord, call_cost};
use costgate_router::{ComplexityAnalyzer, ComplexityScore, ModelRouter, RoutingDecision};
use costgate_security::Anonymizer;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::coalesce::{Coalescer, LeaderGuard, Role, SharedResponse};
use crate::recording;

/// One inbound call as the caller supplies it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineRequest {
    pub text: String,
    /// Code or other context sent alongside the text.
    pub context: Option<String>,
    /// Requested backend id; honoured when eligible.
    pub backend_class: Option<String>,
}

impl PipelineRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_backend_class(mut self, class: impl Into<String>) -> Self {
        self.backend_class = Some(class.into());
        self
    }
}

/// Request-path tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub backend_timeout: Duration,
    pub max_output_tokens: u32,
    pub max_request_chars: usize,
    pub coalesce_misses: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&CostgateConfig::default())
    }
}

impl From<&CostgateConfig> for PipelineSettings {
    fn from(config: &CostgateConfig) -> Self {
        Self {
            backend_timeout: Duration::from_secs(config.pipeline.backend_timeout_secs),
            max_output_tokens: config.pipeline.max_output_tokens,
            max_request_chars: config.analyzer.max_request_chars,
            coalesce_misses: config.pipeline.coalesce_misses,
        }
    }
}

/// Collaborators the pipeline drives. All are constructed by the caller.
pub struct PipelineDeps {
    pub analyzer: ComplexityAnalyzer,
    pub router: ModelRouter,
    pub cache: Arc<HybridCache>,
    pub ledger: Arc<BudgetLedger>,
    pub backend: Arc<dyn BackendAdapter>,
    pub anonymizer: Anonymizer,
    pub clock: Arc<dyn Clock>,
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "source")]
pub enum ResponseSource {
    /// Served by the cache.
    Cache { hit: CacheHit },
    /// Served by a backend call made for this request.
    Backend,
    /// Served by a concurrent request's backend call.
    Coalesced,
}

/// The pipeline's answer to one request.
#[derive(Debug)]
pub struct PipelineResponse {
    pub text: String,
    /// Backend that produced `text`, possibly on an earlier request.
    pub backend_id: String,
    pub source: ResponseSource,
    /// Spend recorded for this request (zero unless a backend was called).
    pub cost_usd: f64,
    pub score: ComplexityScore,
    /// Present only when this request made a backend call.
    pub routing: Option<RoutingDecision>,
    /// Budget alerts fired by this request's record.
    pub alerts: Vec<BudgetAlert>,
    /// Set when the response was served but could not be recorded.
    pub ledger_error: Option<CostgateError>,
    pub cache_key: CacheKey,
    /// When the pipeline accepted the request.
    pub received_at: DateTime<Utc>,
}

impl PipelineResponse {
    pub fn is_cached(&self) -> bool {
        !matches!(self.source, ResponseSource::Backend)
    }
}

/// Accounting result of a ledger write.
struct Recorded {
    alerts: Vec<BudgetAlert>,
    ledger_error: Option<CostgateError>,
}

/// Request orchestrator. Cheap to share behind an `Arc`.
pub struct RequestPipeline {
    deps: PipelineDeps,
    settings: PipelineSettings,
    coalescer: Coalescer,
}

impl RequestPipeline {
    pub fn new(deps: PipelineDeps, settings: PipelineSettings) -> Self {
        Self {
            deps,
            settings,
            coalescer: Coalescer::new(),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn router(&self) -> &ModelRouter {
        &self.deps.router
    }

    pub fn analyzer(&self) -> &ComplexityAnalyzer {
        &self.deps.analyzer
    }

    pub fn cache(&self) -> &Arc<HybridCache> {
        &self.deps.cache
    }

    pub fn ledger(&self) -> &Arc<BudgetLedger> {
        &self.deps.ledger
    }

    /// Serve one request.
    ///
    /// Fails with `Validation`, `NoEligibleBackend`, `Backend`, `Timeout` or
    /// `Cancelled`; none of these record spend or cache anything. A ledger
    /// write failure after a successful call is reported in
    /// [`PipelineResponse::ledger_error`] instead.
    pub async fn handle(
        &self,
        input: PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResponse, CostgateError> {
        let result = self.handle_inner(input, cancel).await;
        recording::record_request(match &result {
            Ok(r) => match r.source {
                ResponseSource::Cache {
                    hit: CacheHit::Semantic { .. },
                } => "semantic",
                ResponseSource::Cache { .. } => "exact",
                ResponseSource::Coalesced => "coalesced",
                ResponseSource::Backend => "backend",
            },
            Err(CostgateError::Validation(_)) => "invalid",
            Err(_) => "error",
        });
        result
    }

    async fn handle_inner(
        &self,
        input: PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResponse, CostgateError> {
        let anonymizer = &self.deps.anonymizer;
        let text = anonymizer.apply(&input.text);
        let context = input.context.as_deref().map(|c| anonymizer.apply(c));
        let request = Request::new(
            text,
            context,
            input.backend_class,
            self.deps.clock.now(),
            self.settings.max_request_chars,
        )?;

        let score = self.deps.analyzer.analyze(request.text(), request.context());
        debug!(
            cache_key = %request.cache_key(),
            overall = score.overall,
            tier = %score.tier,
            compliance_required = score.compliance_required(),
            "request analyzed"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(CostgateError::Cancelled);
            }

            let lookup = self.deps.cache.lookup(&request).await;
            if let Some(entry) = lookup.entry {
                recording::record_cache_lookup(match lookup.hit {
                    CacheHit::Semantic { .. } => "semantic",
                    _ => "exact",
                });
                debug!(cache_key = %request.cache_key(), hit = ?lookup.hit, "cache hit");
                let recorded = self.record_zero_cost(&entry.backend_id, &score).await;
                return Ok(PipelineResponse {
                    text: entry.response_text.clone(),
                    backend_id: entry.backend_id.clone(),
                    source: ResponseSource::Cache { hit: lookup.hit },
                    cost_usd: 0.0,
                    score,
                    routing: None,
                    alerts: recorded.alerts,
                    ledger_error: recorded.ledger_error,
                    cache_key: request.cache_key().clone(),
                    received_at: request.created_at(),
                });
            }
            recording::record_cache_lookup("miss");

            if !self.settings.coalesce_misses {
                return self.serve_miss(&request, score, cancel, None).await;
            }

            match self.coalescer.join(request.cache_key()) {
                Role::Leader(guard) => {
                    return self.serve_miss(&request, score, cancel, Some(guard)).await;
                }
                Role::Follower(mut rx) => {
                    debug!(cache_key = %request.cache_key(), "waiting on in-flight call");
                    let received = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(CostgateError::Cancelled),
                        received = rx.recv() => received,
                    };
                    match received {
                        Ok(shared) => {
                            let recorded = self.record_zero_cost(&shared.backend_id, &score).await;
                            return Ok(PipelineResponse {
                                text: shared.text.clone(),
                                backend_id: shared.backend_id.clone(),
                                source: ResponseSource::Coalesced,
                                cost_usd: 0.0,
                                score,
                                routing: None,
                                alerts: recorded.alerts,
                                ledger_error: recorded.ledger_error,
                                cache_key: request.cache_key().clone(),
                                received_at: request.created_at(),
                            });
                        }
                        // The leader failed or was cancelled.
                        Err(RecvError::Closed | RecvError::Lagged(_)) => {
                            debug!(cache_key = %request.cache_key(), "in-flight call abandoned, retrying");
                        }
                    }
                }
            }
        }
    }

    /// Route, call the backend, record spend and cache the response.
    async fn serve_miss(
        &self,
        request: &Request,
        score: ComplexityScore,
        cancel: &CancellationToken,
        leader: Option<LeaderGuard<'_>>,
    ) -> Result<PipelineResponse, CostgateError> {
        let pressure = match self.deps.ledger.budget_pressure().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "budget pressure unavailable, routing without it");
                0.0
            }
        };
        let decision = self.deps.router.select_with_preference(
            &score,
            pressure,
            request.backend_class(),
        )?;
        debug!(
            backend_id = %decision.backend.id,
            reason = %decision.reason,
            "backend selected"
        );

        let backend_text = match request.context() {
            Some(context) => format!("{}\n\n{}", request.text(), context),
            None => request.text().to_string(),
        };
        let timeout = self.settings.backend_timeout;
        let started = tokio::time::Instant::now();
        let call = self.deps.backend.call(
            &decision.backend,
            &backend_text,
            self.settings.max_output_tokens,
        );
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(backend_id = %decision.backend.id, "backend call cancelled");
                return Err(CostgateError::Cancelled);
            }
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(response) => response?,
                Err(_) => {
                    warn!(backend_id = %decision.backend.id, ?timeout, "backend call timed out");
                    return Err(CostgateError::Timeout { duration: timeout });
                }
            },
        };
        let latency = started.elapsed();

        let cost_usd = call_cost(&decision.backend, response.input_tokens, response.output_tokens);
        recording::record_backend_call(
            &decision.backend.id,
            response.input_tokens,
            response.output_tokens,
            cost_usd,
            latency.as_secs_f64(),
        );

        let record = CallRecord::new(
            decision.backend.id.clone(),
            response.input_tokens,
            response.output_tokens,
            cost_usd,
            score.tier,
            score.overall,
        );
        let recorded = self.record(&record).await;

        self.deps
            .cache
            .insert(request, &response.text, &decision.backend.id, latency)
            .await;

        if let Some(leader) = leader {
            leader.publish(SharedResponse {
                text: response.text.clone(),
                backend_id: decision.backend.id.clone(),
            });
        }

        debug!(
            backend_id = %decision.backend.id,
            cost_usd,
            latency_ms = latency.as_millis() as u64,
            "backend call served"
        );

        Ok(PipelineResponse {
            text: response.text,
            backend_id: decision.backend.id.clone(),
            source: ResponseSource::Backend,
            cost_usd,
            score,
            routing: Some(decision),
            alerts: recorded.alerts,
            ledger_error: recorded.ledger_error,
            cache_key: request.cache_key().clone(),
            received_at: request.created_at(),
        })
    }

    async fn record_zero_cost(&self, backend_id: &str, score: &ComplexityScore) -> Recorded {
        self.record(&CallRecord::cached_hit(backend_id, score.tier, score.overall))
            .await
    }

    /// Write `record`; a failure is logged and handed back, never raised.
    async fn record(&self, record: &CallRecord) -> Recorded {
        match self.deps.ledger.record_call(record).await {
            Ok(outcome) => {
                for alert in &outcome.alerts {
                    recording::record_alert(&alert.period.to_string());
                }
                Recorded {
                    alerts: outcome.alerts,
                    ledger_error: None,
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    idempotency_id = %record.idempotency_id,
                    backend_id = %record.backend_id,
                    cost_usd = record.cost_usd,
                    "ledger write failed, call not accounted"
                );
                Recorded {
                    alerts: Vec::new(),
                    ledger_error: Some(e),
                }
            }
        }
    }
}
