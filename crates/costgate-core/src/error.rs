// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Costgate routing and caching pipeline.

use thiserror::Error;

use crate::types::ComplexityTier;

/// The primary error type shared by every Costgate crate.
#[derive(Debug, Error)]
pub enum CostgateError {
    /// Malformed request (empty text, oversized input, bad parameters).
    #[error("validation error: {0}")]
    Validation(String),

    /// Compliance filtering (or an empty catalog) left no backend to route to.
    #[error("no eligible backend for {tier} request (compliance required: {compliance_required})")]
    NoEligibleBackend {
        tier: ComplexityTier,
        compliance_required: bool,
    },

    /// The external backend call failed.
    #[error("backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The caller cancelled the request while it was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// A ledger record with this idempotency id already exists.
    #[error("duplicate ledger record `{idempotency_id}`")]
    DuplicateRecord { idempotency_id: String },

    /// Persistence I/O failure (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CostgateError {
    /// Whether this error came from the persistence layer and may succeed on retry.
    pub fn is_storage(&self) -> bool {
        matches!(self, CostgateError::Storage { .. })
    }
}
