// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Costgate.
//!
//! Holds the error taxonomy, the request and catalog types, the injectable
//! clock, and the adapter traits for the external collaborators (backends and
//! embedders). Every other crate in the workspace builds on these.

pub mod clock;
pub mod error;
pub mod request;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CostgateError;
pub use request::Request;
pub use types::{BackendDescriptor, BackendResponse, CacheKey, ComplexityTier};

pub use traits::{BackendAdapter, EmbeddingAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costgate_error_has_all_variants() {
        let _validation = CostgateError::Validation("empty".into());
        let _no_backend = CostgateError::NoEligibleBackend {
            tier: ComplexityTier::Simple,
            compliance_required: true,
        };
        let _backend = CostgateError::Backend {
            status: 503,
            message: "overloaded".into(),
        };
        let _timeout = CostgateError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _cancelled = CostgateError::Cancelled;
        let _dup = CostgateError::DuplicateRecord {
            idempotency_id: "abc".into(),
        };
        let storage = CostgateError::Storage {
            source: Box::new(std::io::Error::other("disk full")),
        };
        let _config = CostgateError::Config("bad".into());
        let _internal = CostgateError::Internal("bug".into());

        assert!(storage.is_storage());
        assert!(!CostgateError::Cancelled.is_storage());
    }

    #[test]
    fn error_messages_are_lowercase_and_informative() {
        let err = CostgateError::NoEligibleBackend {
            tier: ComplexityTier::Complex,
            compliance_required: true,
        };
        assert_eq!(
            err.to_string(),
            "no eligible backend for complex request (compliance required: true)"
        );

        let err = CostgateError::Backend {
            status: 429,
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "backend error (status 429): rate limited");
    }

    #[test]
    fn complexity_tier_round_trips() {
        use std::str::FromStr;

        for tier in [
            ComplexityTier::Simple,
            ComplexityTier::Medium,
            ComplexityTier::Complex,
        ] {
            let parsed = ComplexityTier::from_str(&tier.to_string()).expect("should parse back");
            assert_eq!(tier, parsed);
        }
        assert_eq!(
            serde_json::to_string(&ComplexityTier::Medium).unwrap(),
            "\"medium\""
        );
        assert!(ComplexityTier::Simple < ComplexityTier::Medium);
        assert!(ComplexityTier::Medium < ComplexityTier::Complex);
    }

    #[test]
    fn backend_descriptor_total_cost() {
        let b = BackendDescriptor {
            id: "a".into(),
            input_unit_cost: 0.001,
            output_unit_cost: 0.002,
            max_context_tokens: 8_000,
            compliance_eligible: false,
            capability_rank: 1,
        };
        assert!((b.total_unit_cost() - 0.003).abs() < 1e-12);
    }

    #[test]
    fn backend_descriptor_defaults_optional_flags() {
        let b: BackendDescriptor = serde_json::from_str(
            r#"{"id":"x","input_unit_cost":0.5,"output_unit_cost":1.5,"max_context_tokens":4096}"#,
        )
        .unwrap();
        assert!(!b.compliance_eligible);
        assert_eq!(b.capability_rank, 0);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_backend_adapter<T: BackendAdapter>() {}
        fn _assert_embedding_adapter<T: EmbeddingAdapter>() {}
    }
}
