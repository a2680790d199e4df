// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget- and compliance-aware backend selection.
//!
//! Order of precedence: compliance filter > budget pressure > complexity tier.

use costgate_config::model::RoutingConfig;
use costgate_core::{BackendDescriptor, ComplexityTier, CostgateError};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzer::ComplexityScore;

/// The backend chosen for one request and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Selected catalog entry.
    pub backend: BackendDescriptor,
    /// Tier of the scored request.
    pub tier: ComplexityTier,
    /// Budget pressure observed at routing time.
    pub budget_pressure: f64,
    /// Whether budget pressure forced the cheapest backend.
    pub pressure_override: bool,
    /// Whether the catalog was restricted to compliance-eligible backends.
    pub compliance_filtered: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
}

/// Selects a backend from a fixed catalog.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    catalog: Vec<BackendDescriptor>,
    high_pressure_ratio: f64,
    medium_input_cost_ceiling: f64,
}

impl ModelRouter {
    /// Create a router over `catalog`. Declaration order breaks ties.
    pub fn new(catalog: Vec<BackendDescriptor>, config: &RoutingConfig) -> Self {
        Self {
            catalog,
            high_pressure_ratio: config.high_pressure_ratio,
            medium_input_cost_ceiling: config.medium_input_cost_ceiling,
        }
    }

    pub fn catalog(&self) -> &[BackendDescriptor] {
        &self.catalog
    }

    /// Look up a catalog entry by id.
    pub fn backend(&self, id: &str) -> Option<&BackendDescriptor> {
        self.catalog.iter().find(|b| b.id == id)
    }

    /// Select a backend for a scored request under the given budget pressure
    /// (the higher of daily and monthly spend ratios).
    pub fn select_backend(
        &self,
        score: &ComplexityScore,
        budget_pressure: f64,
    ) -> Result<RoutingDecision, CostgateError> {
        let candidates = self.eligible(score)?;
        let compliance_filtered = score.compliance_required();

        if budget_pressure > self.high_pressure_ratio {
            let backend = cheapest(&candidates)
                .ok_or_else(|| no_backend(score))?
                .clone();
            info!(
                backend_id = %backend.id,
                tier = %score.tier,
                budget_pressure,
                "budget pressure override: routing to cheapest backend"
            );
            return Ok(RoutingDecision {
                reason: format!(
                    "budget pressure {budget_pressure:.2} above {:.2}, cheapest backend",
                    self.high_pressure_ratio
                ),
                backend,
                tier: score.tier,
                budget_pressure,
                pressure_override: true,
                compliance_filtered,
            });
        }

        let (backend, reason) = match score.tier {
            ComplexityTier::Simple => (cheapest(&candidates), "simple request, cheapest backend".to_string()),
            ComplexityTier::Medium => {
                let under_ceiling: Vec<&BackendDescriptor> = candidates
                    .iter()
                    .copied()
                    .filter(|b| b.input_unit_cost < self.medium_input_cost_ceiling)
                    .collect();
                if under_ceiling.is_empty() {
                    (
                        cheapest(&candidates),
                        format!(
                            "medium request, no backend under input cost {}, cheapest backend",
                            self.medium_input_cost_ceiling
                        ),
                    )
                } else {
                    (
                        cheapest(&under_ceiling),
                        format!(
                            "medium request, cheapest backend under input cost {}",
                            self.medium_input_cost_ceiling
                        ),
                    )
                }
            }
            ComplexityTier::Complex => (
                largest_context(&candidates),
                "complex request, largest context window".to_string(),
            ),
        };
        let backend = backend.ok_or_else(|| no_backend(score))?.clone();

        debug!(backend_id = %backend.id, tier = %score.tier, %reason, "backend selected");
        Ok(RoutingDecision {
            backend,
            tier: score.tier,
            budget_pressure,
            pressure_override: false,
            compliance_filtered,
            reason: if compliance_filtered {
                format!("{reason} (compliance-eligible only)")
            } else {
                reason
            },
        })
    }

    /// Like [`select_backend`](Self::select_backend), but honours a requested
    /// backend id when it names an eligible catalog entry.
    pub fn select_with_preference(
        &self,
        score: &ComplexityScore,
        budget_pressure: f64,
        preferred: Option<&str>,
    ) -> Result<RoutingDecision, CostgateError> {
        if let Some(id) = preferred {
            let candidates = self.eligible(score)?;
            if let Some(backend) = candidates.into_iter().find(|b| b.id == id) {
                info!(backend_id = %backend.id, tier = %score.tier, "requested backend honoured");
                return Ok(RoutingDecision {
                    backend: backend.clone(),
                    tier: score.tier,
                    budget_pressure,
                    pressure_override: false,
                    compliance_filtered: score.compliance_required(),
                    reason: format!("backend `{id}` requested explicitly"),
                });
            }
            debug!(requested = id, "requested backend not eligible, routing normally");
        }
        self.select_backend(score, budget_pressure)
    }

    fn eligible(&self, score: &ComplexityScore) -> Result<Vec<&BackendDescriptor>, CostgateError> {
        let candidates: Vec<&BackendDescriptor> = if score.compliance_required() {
            self.catalog.iter().filter(|b| b.compliance_eligible).collect()
        } else {
            self.catalog.iter().collect()
        };
        if candidates.is_empty() {
            return Err(no_backend(score));
        }
        Ok(candidates)
    }
}

fn no_backend(score: &ComplexityScore) -> CostgateError {
    CostgateError::NoEligibleBackend {
        tier: score.tier,
        compliance_required: score.compliance_required(),
    }
}

/// Lowest total unit cost; the first declared wins a tie.
fn cheapest<'a>(candidates: &[&'a BackendDescriptor]) -> Option<&'a BackendDescriptor> {
    candidates.iter().copied().fold(None, |best, b| match best {
        Some(current) if b.total_unit_cost() >= current.total_unit_cost() => Some(current),
        _ => Some(b),
    })
}

/// Largest context window; the first declared wins a tie.
fn largest_context<'a>(candidates: &[&'a BackendDescriptor]) -> Option<&'a BackendDescriptor> {
    candidates.iter().copied().fold(None, |best, b| match best {
        Some(current) if b.max_context_tokens <= current.max_context_tokens => Some(current),
        _ => Some(b),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::analyzer::{ComplexityAnalyzer, SubScores};

    fn backend(id: &str, input: f64, output: f64, ctx: u32, compliant: bool) -> BackendDescriptor {
        BackendDescriptor {
            id: id.into(),
            input_unit_cost: input,
            output_unit_cost: output,
            max_context_tokens: ctx,
            compliance_eligible: compliant,
            capability_rank: 0,
        }
    }

    fn score(tier: ComplexityTier, compliance: &[&str]) -> ComplexityScore {
        ComplexityScore {
            sub_scores: SubScores::default(),
            overall: 0.0,
            tier,
            compliance_terms: compliance.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn router(catalog: Vec<BackendDescriptor>) -> ModelRouter {
        ModelRouter::new(catalog, &RoutingConfig::default())
    }

    fn catalog() -> Vec<BackendDescriptor> {
        vec![
            backend("small", 0.0002, 0.0006, 8_192, false),
            backend("mid", 0.003, 0.009, 32_000, true),
            backend("large", 0.015, 0.06, 200_000, true),
        ]
    }

    #[test]
    fn compliance_request_skips_cheaper_ineligible_backend() {
        let r = router(vec![
            backend("A", 0.001, 0.0, 8_000, false),
            backend("B", 0.01, 0.0, 8_000, true),
        ]);
        let score = ComplexityAnalyzer::default()
            .analyze("Can we keep this personal data under GDPR?", None);
        assert!(score.compliance_required());

        let decision = r.select_backend(&score, 0.0).unwrap();
        assert_eq!(decision.backend.id, "B");
        assert!(decision.compliance_filtered);
    }

    #[test]
    fn compliance_with_no_eligible_backend_fails() {
        let r = router(vec![backend("A", 0.001, 0.0, 8_000, false)]);
        let err = r
            .select_backend(&score(ComplexityTier::Simple, &["gdpr"]), 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            CostgateError::NoEligibleBackend {
                tier: ComplexityTier::Simple,
                compliance_required: true
            }
        ));
    }

    #[test]
    fn empty_catalog_fails() {
        let err = router(vec![])
            .select_backend(&score(ComplexityTier::Medium, &[]), 0.0)
            .unwrap_err();
        assert!(matches!(err, CostgateError::NoEligibleBackend { .. }));
    }

    #[test]
    fn simple_routes_to_cheapest() {
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Simple, &[]), 0.0)
            .unwrap();
        assert_eq!(d.backend.id, "small");
        assert!(!d.pressure_override);
    }

    #[test]
    fn medium_routes_to_cheapest_under_ceiling() {
        // Ceiling 0.005: small and mid qualify, small is cheaper.
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Medium, &[]), 0.0)
            .unwrap();
        assert_eq!(d.backend.id, "small");

        // With compliance only mid and large remain; mid is under the ceiling.
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Medium, &["hipaa"]), 0.0)
            .unwrap();
        assert_eq!(d.backend.id, "mid");
    }

    #[test]
    fn medium_falls_back_to_cheapest_when_nothing_under_ceiling() {
        let r = router(vec![
            backend("pricey", 0.02, 0.02, 8_000, false),
            backend("priciest", 0.03, 0.03, 8_000, false),
        ]);
        let d = r.select_backend(&score(ComplexityTier::Medium, &[]), 0.0).unwrap();
        assert_eq!(d.backend.id, "pricey");
        assert!(d.reason.contains("no backend under"));
    }

    #[test]
    fn complex_routes_to_largest_context() {
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Complex, &[]), 0.0)
            .unwrap();
        assert_eq!(d.backend.id, "large");
    }

    #[test]
    fn high_pressure_forces_cheapest() {
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Complex, &[]), 0.85)
            .unwrap();
        assert_eq!(d.backend.id, "small");
        assert!(d.pressure_override);
    }

    #[test]
    fn pressure_at_ratio_does_not_override() {
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Complex, &[]), 0.8)
            .unwrap();
        assert_eq!(d.backend.id, "large");
        assert!(!d.pressure_override);
    }

    #[test]
    fn high_pressure_still_respects_compliance() {
        let d = router(catalog())
            .select_backend(&score(ComplexityTier::Complex, &["gdpr"]), 0.95)
            .unwrap();
        assert_eq!(d.backend.id, "mid");
    }

    #[test]
    fn ties_keep_declaration_order() {
        let r = router(vec![
            backend("first", 0.001, 0.001, 16_000, false),
            backend("second", 0.001, 0.001, 16_000, false),
        ]);
        let simple = r.select_backend(&score(ComplexityTier::Simple, &[]), 0.0).unwrap();
        assert_eq!(simple.backend.id, "first");
        let complex = r.select_backend(&score(ComplexityTier::Complex, &[]), 0.0).unwrap();
        assert_eq!(complex.backend.id, "first");
    }

    #[test]
    fn preference_honoured_when_eligible() {
        let r = router(catalog());
        let d = r
            .select_with_preference(&score(ComplexityTier::Simple, &[]), 0.0, Some("large"))
            .unwrap();
        assert_eq!(d.backend.id, "large");
        assert!(d.reason.contains("requested"));
    }

    #[test]
    fn preference_ignored_when_not_compliance_eligible() {
        let r = router(catalog());
        let d = r
            .select_with_preference(&score(ComplexityTier::Simple, &["gdpr"]), 0.0, Some("small"))
            .unwrap();
        assert_eq!(d.backend.id, "mid");
    }

    #[test]
    fn unknown_preference_falls_through() {
        let r = router(catalog());
        let d = r
            .select_with_preference(&score(ComplexityTier::Complex, &[]), 0.0, Some("gpt-nine"))
            .unwrap();
        assert_eq!(d.backend.id, "large");
    }
}
