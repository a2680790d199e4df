// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted keyword tables used by the complexity analyzer.
//!
//! One flat list of rules; each rule names its category. A term may appear in
//! only one category, checked by [`validate_rules`].

use std::collections::HashMap;

use serde::Serialize;
use strum::Display;

/// Which table a keyword belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum KeywordCategory {
    /// General reasoning difficulty.
    Reasoning,
    /// Regulatory terms. Any match forces compliance-eligible routing.
    Compliance,
    /// Security-sensitive topics.
    Security,
}

/// A weighted term. Multi-word terms match as phrases, single words as whole tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordRule {
    pub term: &'static str,
    pub weight: f64,
    pub category: KeywordCategory,
}

const fn rule(term: &'static str, weight: f64, category: KeywordCategory) -> KeywordRule {
    KeywordRule {
        term,
        weight,
        category,
    }
}

use KeywordCategory::{Compliance, Reasoning, Security};

/// Built-in keyword table.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    // Reasoning
    rule("analyze", 8.0, Reasoning),
    rule("analyse", 8.0, Reasoning),
    rule("architecture", 10.0, Reasoning),
    rule("algorithm", 8.0, Reasoning),
    rule("optimize", 8.0, Reasoning),
    rule("optimise", 8.0, Reasoning),
    rule("refactor", 7.0, Reasoning),
    rule("debug", 6.0, Reasoning),
    rule("design", 6.0, Reasoning),
    rule("compare", 5.0, Reasoning),
    rule("evaluate", 6.0, Reasoning),
    rule("prove", 10.0, Reasoning),
    rule("derive", 8.0, Reasoning),
    rule("trade-off", 8.0, Reasoning),
    rule("tradeoff", 8.0, Reasoning),
    rule("trade-offs", 8.0, Reasoning),
    rule("step by step", 6.0, Reasoning),
    rule("in depth", 6.0, Reasoning),
    rule("edge cases", 6.0, Reasoning),
    rule("scalability", 7.0, Reasoning),
    rule("benchmark", 6.0, Reasoning),
    // Compliance
    rule("gdpr", 15.0, Compliance),
    rule("hipaa", 15.0, Compliance),
    rule("ccpa", 12.0, Compliance),
    rule("pci-dss", 12.0, Compliance),
    rule("sox", 10.0, Compliance),
    rule("pii", 10.0, Compliance),
    rule("phi", 10.0, Compliance),
    rule("personal data", 10.0, Compliance),
    rule("data residency", 15.0, Compliance),
    rule("data protection", 10.0, Compliance),
    rule("right to be forgotten", 12.0, Compliance),
    rule("audit trail", 8.0, Compliance),
    rule("regulatory", 8.0, Compliance),
    rule("compliance", 10.0, Compliance),
    // Security
    rule("vulnerability", 10.0, Security),
    rule("vulnerabilities", 10.0, Security),
    rule("exploit", 10.0, Security),
    rule("sql injection", 12.0, Security),
    rule("injection", 8.0, Security),
    rule("xss", 10.0, Security),
    rule("csrf", 10.0, Security),
    rule("encryption", 8.0, Security),
    rule("authentication", 6.0, Security),
    rule("authorization", 6.0, Security),
    rule("penetration test", 12.0, Security),
    rule("threat model", 10.0, Security),
    rule("malware", 10.0, Security),
    rule("cve", 10.0, Security),
];

/// Terms counted by the technical-density sub-score. Not weighted.
pub const TECHNICAL_TERMS: &[&str] = &[
    "api", "apis", "database", "schema", "latency", "throughput", "kubernetes", "docker",
    "microservice", "microservices", "monolith", "cache", "compiler", "runtime", "protocol",
    "http", "tcp", "grpc", "json", "sql", "index", "thread", "threads", "mutex", "async",
    "concurrency", "kernel", "memory", "cpu", "gpu", "cluster", "queue", "regex", "backend",
    "frontend", "deployment", "pipeline", "vector", "embedding", "tokenizer", "serialization",
    "orm", "rpc", "websocket", "load-balancer", "sharding", "replication",
];

/// Check a rule table: lowercase non-empty terms, positive weights, and no
/// term listed under two categories (or twice in one).
pub fn validate_rules(rules: &[KeywordRule]) -> Result<(), String> {
    let mut seen: HashMap<&str, KeywordCategory> = HashMap::new();
    for r in rules {
        if r.term.trim().is_empty() || r.term != r.term.to_lowercase() {
            return Err(format!("keyword `{}` must be non-empty lowercase", r.term));
        }
        if !(r.weight > 0.0) {
            return Err(format!("keyword `{}` must have a positive weight", r.term));
        }
        if let Some(previous) = seen.insert(r.term, r.category) {
            return Err(format!(
                "keyword `{}` listed under both {previous} and {}",
                r.term, r.category
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_table_is_valid() {
        validate_rules(KEYWORD_RULES).unwrap();
    }

    #[test]
    fn every_category_is_populated() {
        for category in [Reasoning, Compliance, Security] {
            assert!(KEYWORD_RULES.iter().any(|r| r.category == category));
        }
    }

    #[test]
    fn cross_category_duplicate_is_rejected() {
        let rules = [rule("audit", 5.0, Compliance), rule("audit", 5.0, Security)];
        let err = validate_rules(&rules).unwrap_err();
        assert!(err.contains("compliance"));
        assert!(err.contains("security"));
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let rules = [rule("audit", 0.0, Compliance)];
        assert!(validate_rules(&rules).is_err());
    }

    #[test]
    fn uppercase_term_is_rejected() {
        let rules = [rule("GDPR", 5.0, Compliance)];
        assert!(validate_rules(&rules).is_err());
    }
}
