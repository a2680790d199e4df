// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend adapter trait for pay-per-call language-model services.

use async_trait::async_trait;

use crate::error::CostgateError;
use crate::types::{BackendDescriptor, BackendResponse};

/// An opaque language-model backend.
///
/// Wire protocols live behind this trait. Implementations report failures as
/// [`CostgateError::Backend`]; the pipeline owns the timeout and cancellation,
/// so implementations need not enforce either.
#[async_trait]
pub trait BackendAdapter: Send + Sync + 'static {
    /// Send `request_text` to the backend described by `backend`.
    async fn call(
        &self,
        backend: &BackendDescriptor,
        request_text: &str,
        max_output_tokens: u32,
    ) -> Result<BackendResponse, CostgateError>;
}
