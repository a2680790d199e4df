// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request pipeline for Costgate.
//!
//! Wires the analyzer, router, cache, ledger and anonymizer around a backend
//! adapter. Also hosts miss coalescing, the background maintenance task and
//! metric recording helpers.

pub mod coalesce;
pub mod maintenance;
pub mod pipeline;
pub mod recording;

pub use coalesce::{Coalescer, SharedResponse};
pub use maintenance::{run_maintenance, spawn_maintenance};
pub use pipeline::{
    PipelineDeps, PipelineRequest, PipelineResponse, PipelineSettings, RequestPipeline,
    ResponseSource,
};
pub use recording::register_metrics;
