// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid response cache for Costgate.
//!
//! Exact matches are keyed by the request's content hash; semantic matches
//! compare request embeddings by cosine similarity. Entries expire after a
//! TTL and the least recently used are evicted past a size bound.

pub mod cache;
pub mod store;
pub mod vector;

pub use cache::{CacheEntry, CacheHit, CacheLookup, CacheSettings, CacheStats, EvictionReport, HybridCache};
pub use store::CacheStore;
pub use vector::cosine_similarity;
