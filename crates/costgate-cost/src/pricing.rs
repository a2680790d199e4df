// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost calculation from catalog unit prices.
//!
//! Unit costs are USD per 1,000 tokens, taken from the backend's catalog
//! entry. Token counts are whatever the backend reports for the call.

use costgate_core::BackendDescriptor;

/// Cost in USD of one call to `backend`.
pub fn call_cost(backend: &BackendDescriptor, input_tokens: u32, output_tokens: u32) -> f64 {
    (input_tokens as f64 / 1000.0) * backend.input_unit_cost
        + (output_tokens as f64 / 1000.0) * backend.output_unit_cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(input: f64, output: f64) -> BackendDescriptor {
        BackendDescriptor {
            id: "b".into(),
            input_unit_cost: input,
            output_unit_cost: output,
            max_context_tokens: 8_000,
            compliance_eligible: false,
            capability_rank: 0,
        }
    }

    #[test]
    fn cost_scales_per_thousand_tokens() {
        let b = backend(0.003, 0.015);
        // 2000 in, 500 out: 2 * 0.003 + 0.5 * 0.015
        let cost = call_cost(&b, 2_000, 500);
        assert!((cost - 0.0135).abs() < 1e-12);
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        assert_eq!(call_cost(&backend(1.0, 1.0), 0, 0), 0.0);
    }

    #[test]
    fn free_backend_costs_nothing() {
        assert_eq!(call_cost(&backend(0.0, 0.0), 10_000, 10_000), 0.0);
    }
}
