// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` assembles a complete request pipeline with mock adapters,
//! in-memory SQLite stores and a manual clock. Provides `send()` to drive a
//! request through the full pipeline in tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use costgate_cache::{CacheSettings, CacheStore, HybridCache};
use costgate_config::model::CostgateConfig;
use costgate_core::{BackendDescriptor, Clock, CostgateError, ManualClock};
use costgate_cost::BudgetLedger;
use costgate_pipeline::{
    PipelineDeps, PipelineRequest, PipelineResponse, PipelineSettings, RequestPipeline,
};
use costgate_router::{ComplexityAnalyzer, ModelRouter};
use costgate_security::Anonymizer;
use costgate_storage::{Database, map_tr_err};
use tokio_util::sync::CancellationToken;

use crate::mock_backend::MockBackend;
use crate::mock_embedder::MockEmbedder;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    config: CostgateConfig,
    backend_delay: Option<Duration>,
    semantic: bool,
    start: DateTime<Utc>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            config: CostgateConfig::default(),
            backend_delay: None,
            semantic: true,
            start: Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).single().unwrap_or_default(),
        }
    }

    /// Set mock backend responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Set the daily budget limit for the test environment.
    pub fn with_budget(mut self, daily_usd: f64) -> Self {
        self.config.budget.daily_budget_limit = daily_usd;
        self
    }

    /// Replace the backend catalog.
    pub fn with_catalog(mut self, catalog: Vec<BackendDescriptor>) -> Self {
        self.config.backends = catalog;
        self
    }

    /// Delay every backend call.
    pub fn with_backend_delay(mut self, delay: Duration) -> Self {
        self.backend_delay = Some(delay);
        self
    }

    /// Backend call timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.config.pipeline.backend_timeout_secs = secs;
        self
    }

    /// Disable miss coalescing.
    pub fn without_coalescing(mut self) -> Self {
        self.config.pipeline.coalesce_misses = false;
        self
    }

    /// Run without an embedder (exact matching only).
    pub fn without_semantic(mut self) -> Self {
        self.semantic = false;
        self
    }

    /// Adjust any other configuration value.
    pub fn with_config(mut self, f: impl FnOnce(&mut CostgateConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Start the manual clock at `start`.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CostgateError> {
        let config = self.config;
        let clock = Arc::new(ManualClock::new(self.start));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let ledger_db = Database::open_in_memory().await?;
        let cache_db = Database::open_in_memory().await?;

        let ledger = Arc::new(BudgetLedger::new(
            ledger_db.clone(),
            &config.budget,
            dyn_clock.clone(),
        ));

        let embedder = Arc::new(MockEmbedder::new());
        let mut cache = HybridCache::open(
            CacheStore::new(cache_db.clone()),
            CacheSettings::from(&config.cache),
            dyn_clock.clone(),
        )
        .await;
        if self.semantic {
            cache = cache.with_embedder(embedder.clone());
        }
        let cache = Arc::new(cache);

        let backend = Arc::new(if self.responses.is_empty() {
            MockBackend::new()
        } else {
            MockBackend::with_responses(self.responses)
        });
        if let Some(delay) = self.backend_delay {
            backend.set_delay(delay);
        }

        let deps = PipelineDeps {
            analyzer: ComplexityAnalyzer::from_config(&config.analyzer),
            router: ModelRouter::new(config.backends.clone(), &config.routing),
            cache: cache.clone(),
            ledger: ledger.clone(),
            backend: backend.clone(),
            anonymizer: Anonymizer::new(&config.privacy),
            clock: dyn_clock,
        };
        let pipeline = Arc::new(RequestPipeline::new(deps, PipelineSettings::from(&config)));

        Ok(TestHarness {
            pipeline,
            backend,
            embedder,
            ledger,
            cache,
            clock,
            ledger_db,
            cache_db,
            config,
        })
    }
}

/// A complete test environment with mock adapters and in-memory stores.
pub struct TestHarness {
    /// The pipeline under test.
    pub pipeline: Arc<RequestPipeline>,
    /// The mock backend behind every routed call.
    pub backend: Arc<MockBackend>,
    /// The embedder used by the cache (detached when built without semantic).
    pub embedder: Arc<MockEmbedder>,
    pub ledger: Arc<BudgetLedger>,
    pub cache: Arc<HybridCache>,
    /// Manual clock shared by ledger, cache and pipeline.
    pub clock: Arc<ManualClock>,
    pub ledger_db: Database,
    pub cache_db: Database,
    pub config: CostgateConfig,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Send `text` through the full pipeline with a fresh cancellation token.
    pub async fn send(&self, text: &str) -> Result<PipelineResponse, CostgateError> {
        self.send_request(PipelineRequest::new(text)).await
    }

    /// Send a fully specified request with a fresh cancellation token.
    pub async fn send_request(
        &self,
        request: PipelineRequest,
    ) -> Result<PipelineResponse, CostgateError> {
        self.pipeline
            .handle(request, &CancellationToken::new())
            .await
    }

    /// Rows in the ledger's call table.
    pub async fn recorded_calls(&self) -> Result<i64, CostgateError> {
        self.ledger_db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM api_calls", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Drop the ledger's call table so every subsequent record fails.
    pub async fn break_ledger(&self) -> Result<(), CostgateError> {
        self.ledger_db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("DROP TABLE api_calls")
            })
            .await
            .map_err(map_tr_err)
    }
}
