// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits for the external collaborators the pipeline calls out to.
//!
//! Both use `#[async_trait]` so they can be held as `Arc<dyn ...>` trait
//! objects.

pub mod backend;
pub mod embedding;

pub use backend::BackendAdapter;
pub use embedding::EmbeddingAdapter;
