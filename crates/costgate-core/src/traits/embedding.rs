// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::CostgateError;

/// Converts text into a vector for semantic cache matching.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync + 'static {
    /// Embed `text` into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CostgateError>;
}
