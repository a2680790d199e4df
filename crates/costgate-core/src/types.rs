// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the analyzer, router, cache, and ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Version prefix mixed into every cache key. Bump to invalidate all keys.
const CACHE_KEY_VERSION: &str = "v1";

/// Stable content hash identifying a request in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
    /// Derive a key from the request text, optional context, and requested backend class.
    ///
    /// Fields are separated by NUL so that `("ab", "c")` and `("a", "bc")` hash differently.
    pub fn derive(text: &str, context: Option<&str>, backend_class: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_KEY_VERSION.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
        hasher.update(context.unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(backend_class.unwrap_or_default().as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complexity tiers produced by the analyzer and consumed by the router.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Medium,
    Complex,
}

/// Static catalog entry describing one pay-per-call backend.
///
/// Unit costs are USD per 1,000 tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendDescriptor {
    /// Unique backend identifier.
    pub id: String,

    /// Cost per 1K input tokens.
    pub input_unit_cost: f64,

    /// Cost per 1K output tokens.
    pub output_unit_cost: f64,

    /// Largest request (in tokens) the backend accepts.
    pub max_context_tokens: u32,

    /// Meets the regulatory constraints required by compliance-sensitive requests.
    #[serde(default)]
    pub compliance_eligible: bool,

    /// Relative capability rank (higher is more capable). Informational.
    #[serde(default)]
    pub capability_rank: u32,
}

impl BackendDescriptor {
    /// Sum of input and output unit costs, used to order backends by price.
    pub fn total_unit_cost(&self) -> f64 {
        self.input_unit_cost + self.output_unit_cost
    }
}

/// What a backend returns for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    /// Generated response text.
    pub text: String,
    /// Input tokens billed by the backend.
    pub input_tokens: u32,
    /// Output tokens billed by the backend.
    pub output_tokens: u32,
}

