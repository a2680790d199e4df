// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Costgate integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockBackend`] - Mock model backend with queued responses, failures and delays
//! - [`MockEmbedder`] - Deterministic bag-of-words embedder
//! - [`TestHarness`] - Full pipeline over in-memory stores and a manual clock

pub mod harness;
pub mod mock_backend;
pub mod mock_embedder;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_backend::MockBackend;
pub use mock_embedder::MockEmbedder;
