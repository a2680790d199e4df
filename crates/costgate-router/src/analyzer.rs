// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic request complexity scoring.
//!
//! Scores a request from its length, the structure of any attached code,
//! weighted keyword matches and technical-term density. No model call, no
//! network, no shared state.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use costgate_config::model::AnalyzerConfig;
use costgate_core::{ComplexityTier, CostgateError};
use regex::Regex;
use serde::Serialize;

use crate::keywords::{KEYWORD_RULES, KeywordCategory, KeywordRule, TECHNICAL_TERMS, validate_rules};

/// Divides the raw sub-score sum before clamping to `[0, 100]`.
pub const NORMALIZATION: f64 = 1.2;

/// `(max words, points)` length bands; longer requests score [`LENGTH_LONG`].
const LENGTH_BANDS: [(usize, f64); 2] = [(12, 5.0), (60, 20.0)];
const LENGTH_LONG: f64 = 40.0;

const CODE_LINES_PER_POINT: f64 = 5.0;
const CODE_LINES_CAP: f64 = 20.0;
const CONCURRENCY_BONUS: f64 = 15.0;
const RECURSION_BONUS: f64 = 10.0;
const ADVANCED_SYNTAX_BONUS: f64 = 10.0;
const CODE_STRUCTURE_CAP: f64 = 50.0;

const KEYWORD_CAP: f64 = 60.0;
const COMPLIANCE_CAP: f64 = 40.0;
const DENSITY_CAP: f64 = 25.0;

const CONCURRENCY_MARKERS: &[&str] = &[
    "thread", "spawn", "mutex", "rwlock", "semaphore", "atomic", "await", "async ",
    "channel", "goroutine", "synchronized", "concurrent", "tokio::", "lock()",
];

const ADVANCED_SYNTAX_MARKERS: &[&str] = &[
    "impl<", "<t>", "<t:", "where ", "dyn ", "=>", "lambda", "yield", "macro_rules!",
    "template<", "decltype", "unsafe ", "trait ", "interface ",
];

/// Captures function names from common definition forms.
static FN_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bfn|\bdef|\bfunction|\bfunc)\s+([A-Za-z_][A-Za-z0-9_]*)\s*[(<]")
        .expect("valid regex")
});

/// Fenced code blocks embedded in the request text.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("valid regex"));

/// Individual sub-scores, in raw points before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SubScores {
    pub length: f64,
    pub code_structure: f64,
    /// Weighted reasoning and security matches.
    pub keyword: f64,
    /// Weighted compliance matches.
    pub compliance: f64,
    pub technical_density: f64,
}

impl SubScores {
    fn sum(&self) -> f64 {
        self.length + self.code_structure + self.keyword + self.compliance + self.technical_density
    }
}

/// Result of analyzing one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityScore {
    pub sub_scores: SubScores,
    /// Normalized score in `[0, 100]`.
    pub overall: f64,
    pub tier: ComplexityTier,
    /// Compliance terms found in the request, sorted.
    pub compliance_terms: BTreeSet<String>,
}

impl ComplexityScore {
    /// Whether only compliance-eligible backends may serve this request.
    pub fn compliance_required(&self) -> bool {
        !self.compliance_terms.is_empty()
    }
}

/// Overall-score boundaries between tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// Scores below this are simple.
    pub simple_below: f64,
    /// Scores below this (and at least `simple_below`) are medium.
    pub medium_below: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            simple_below: 30.0,
            medium_below: 70.0,
        }
    }
}

impl From<&AnalyzerConfig> for TierThresholds {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            simple_below: config.simple_below,
            medium_below: config.medium_below,
        }
    }
}

/// Map an overall score to its tier. Monotonic in `overall`.
pub fn tier_for(overall: f64, thresholds: &TierThresholds) -> ComplexityTier {
    if overall < thresholds.simple_below {
        ComplexityTier::Simple
    } else if overall < thresholds.medium_below {
        ComplexityTier::Medium
    } else {
        ComplexityTier::Complex
    }
}

/// Deterministic complexity analyzer.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    thresholds: TierThresholds,
    rules: &'static [KeywordRule],
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new(TierThresholds::default())
    }
}

impl ComplexityAnalyzer {
    /// Create an analyzer over the built-in keyword table.
    pub fn new(thresholds: TierThresholds) -> Self {
        Self {
            thresholds,
            rules: KEYWORD_RULES,
        }
    }

    /// Create an analyzer from the `[analyzer]` config section.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(TierThresholds::from(config))
    }

    /// Create an analyzer over a custom keyword table, validating it first.
    pub fn with_rules(
        thresholds: TierThresholds,
        rules: &'static [KeywordRule],
    ) -> Result<Self, CostgateError> {
        validate_rules(rules).map_err(CostgateError::Config)?;
        Ok(Self { thresholds, rules })
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Score a request's text and optional code context.
    pub fn analyze(&self, text: &str, context: Option<&str>) -> ComplexityScore {
        let text_tokens = tokenize(text);
        let context_tokens = context.map(tokenize).unwrap_or_default();

        let mut all_tokens = text_tokens.clone();
        all_tokens.extend(context_tokens.iter().cloned());
        let (keyword, compliance, compliance_terms) = self.keyword_scores(&all_tokens);

        let mut code = String::new();
        if let Some(ctx) = context {
            code.push_str(ctx);
            code.push('\n');
        }
        for cap in CODE_FENCE.captures_iter(text) {
            code.push_str(&cap[1]);
            code.push('\n');
        }

        let sub_scores = SubScores {
            length: length_score(text),
            code_structure: code_structure_score(&code),
            keyword,
            compliance,
            technical_density: density_score(&text_tokens),
        };
        let overall = (sub_scores.sum() / NORMALIZATION).clamp(0.0, 100.0);

        ComplexityScore {
            sub_scores,
            overall,
            tier: tier_for(overall, &self.thresholds),
            compliance_terms,
        }
    }

    /// Weighted reasoning+security points, compliance points, and matched
    /// compliance terms. Each term counts once however often it appears.
    fn keyword_scores(&self, tokens: &[String]) -> (f64, f64, BTreeSet<String>) {
        let words: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let phrase_haystack = format!(" {} ", tokens.join(" "));

        let mut keyword = 0.0;
        let mut compliance = 0.0;
        let mut terms = BTreeSet::new();
        for rule in self.rules {
            let matched = if rule.term.contains(' ') {
                phrase_haystack.contains(&format!(" {} ", rule.term))
            } else {
                words.contains(rule.term)
            };
            if !matched {
                continue;
            }
            match rule.category {
                KeywordCategory::Compliance => {
                    compliance += rule.weight;
                    terms.insert(rule.term.to_string());
                }
                KeywordCategory::Reasoning | KeywordCategory::Security => keyword += rule.weight,
            }
        }
        (keyword.min(KEYWORD_CAP), compliance.min(COMPLIANCE_CAP), terms)
    }
}

/// Lowercased word tokens. Hyphens and underscores stay inside words so that
/// `pci-dss` and `trade-off` survive as single tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn length_score(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    LENGTH_BANDS
        .iter()
        .find(|(max_words, _)| words <= *max_words)
        .map(|(_, points)| *points)
        .unwrap_or(LENGTH_LONG)
}

fn code_structure_score(code: &str) -> f64 {
    let lines = code.lines().filter(|l| !l.trim().is_empty()).count();
    if lines == 0 {
        return 0.0;
    }
    let lower = code.to_lowercase();

    let mut score = (lines as f64 / CODE_LINES_PER_POINT).min(CODE_LINES_CAP);
    if CONCURRENCY_MARKERS.iter().any(|m| lower.contains(m)) {
        score += CONCURRENCY_BONUS;
    }
    if has_recursion(code) || lower.contains("recurs") {
        score += RECURSION_BONUS;
    }
    if ADVANCED_SYNTAX_MARKERS.iter().any(|m| lower.contains(m)) {
        score += ADVANCED_SYNTAX_BONUS;
    }
    score.min(CODE_STRUCTURE_CAP)
}

/// A function whose name is called somewhere besides its own definition.
fn has_recursion(code: &str) -> bool {
    FN_DEFINITION.captures_iter(code).any(|cap| {
        let call = format!("{}(", &cap[1]);
        code.matches(&call).count() > 1
    })
}

fn density_score(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let technical = tokens
        .iter()
        .filter(|t| TECHNICAL_TERMS.contains(&t.as_str()))
        .count();
    (technical as f64 / tokens.len() as f64 * 100.0).min(DENSITY_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn analyzer() -> ComplexityAnalyzer {
        ComplexityAnalyzer::default()
    }

    #[test]
    fn greeting_is_simple() {
        let score = analyzer().analyze("hi there", None);
        assert_eq!(score.tier, ComplexityTier::Simple);
        assert!(!score.compliance_required());
        assert!(score.overall < 10.0);
    }

    #[test]
    fn tier_boundaries_use_configured_thresholds() {
        let t = TierThresholds::default();
        assert_eq!(tier_for(29.0, &t), ComplexityTier::Simple);
        assert_eq!(tier_for(29.999, &t), ComplexityTier::Simple);
        assert_eq!(tier_for(30.0, &t), ComplexityTier::Medium);
        assert_eq!(tier_for(69.0, &t), ComplexityTier::Medium);
        assert_eq!(tier_for(70.0, &t), ComplexityTier::Complex);
        assert_eq!(tier_for(100.0, &t), ComplexityTier::Complex);
    }

    #[test]
    fn custom_thresholds_shift_tiers() {
        let t = TierThresholds {
            simple_below: 10.0,
            medium_below: 20.0,
        };
        assert_eq!(tier_for(15.0, &t), ComplexityTier::Medium);
        assert_eq!(tier_for(25.0, &t), ComplexityTier::Complex);
    }

    #[test]
    fn architecture_question_is_medium() {
        let score = analyzer().analyze(
            "Compare the trade-offs between microservices and a monolith architecture for our API",
            None,
        );
        assert_eq!(score.tier, ComplexityTier::Medium, "{score:?}");
        assert!(score.sub_scores.keyword > 0.0);
        assert!(score.sub_scores.technical_density > 0.0);
    }

    #[test]
    fn concurrent_recursive_code_review_is_complex() {
        let context = r#"
use std::sync::{Arc, Mutex};
use std::thread;

fn walk<T: Clone>(node: &Node<T>, out: &Arc<Mutex<Vec<T>>>) {
    out.lock().unwrap().push(node.value.clone());
    for child in &node.children {
        walk(child, out);
    }
}

fn main() {
    let out = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = (0..4).map(|_| {
        let out = Arc::clone(&out);
        thread::spawn(move || walk(&tree(), &out))
    }).collect();
    for h in handles { h.join().unwrap(); }
}
"#;
        let score = analyzer().analyze(
            "Please analyze this code step by step, debug the deadlock, optimize the algorithm \
             and refactor it. Explain the architecture trade-offs and the scalability of the \
             thread pool, then evaluate edge cases and benchmark memory and cpu usage of the \
             mutex under concurrency for our backend api.",
            Some(context),
        );
        assert!(score.sub_scores.code_structure >= 35.0, "{score:?}");
        assert_eq!(score.tier, ComplexityTier::Complex, "{score:?}");
    }

    #[test]
    fn compliance_terms_are_reported() {
        let score = analyzer().analyze(
            "Does storing this personal data in the US break GDPR data residency rules?",
            None,
        );
        assert!(score.compliance_required());
        let terms: Vec<&str> = score.compliance_terms.iter().map(String::as_str).collect();
        assert_eq!(terms, vec!["data residency", "gdpr", "personal data"]);
        assert!(score.sub_scores.compliance > 0.0);
    }

    #[test]
    fn single_words_match_whole_words_only() {
        // "phi" must not match inside "philosophy", "sox" not inside "soxhlet".
        let score = analyzer().analyze("A philosophy essay about the soxhlet extractor", None);
        assert!(!score.compliance_required());
    }

    #[test]
    fn security_terms_feed_keyword_score_not_compliance() {
        let score = analyzer().analyze("Is this form vulnerable to sql injection or xss?", None);
        assert!(!score.compliance_required());
        assert!(score.sub_scores.keyword >= 30.0);
        assert_eq!(score.sub_scores.compliance, 0.0);
    }

    #[test]
    fn compliance_terms_in_context_count() {
        let score = analyzer().analyze(
            "Review this handler",
            Some("// stores PII for HIPAA audit trail\nfn save() {}"),
        );
        assert!(score.compliance_terms.contains("hipaa"));
        assert!(score.compliance_terms.contains("pii"));
        assert!(score.compliance_terms.contains("audit trail"));
    }

    #[test]
    fn fenced_code_in_text_counts_as_structure() {
        let text = "Why does this hang?\n```rust\nasync fn run() {\n    rx.await;\n}\n```\n";
        let score = analyzer().analyze(text, None);
        assert!(score.sub_scores.code_structure >= CONCURRENCY_BONUS);
    }

    #[test]
    fn empty_context_adds_no_structure() {
        let score = analyzer().analyze("hello", Some("   \n  \n"));
        assert_eq!(score.sub_scores.code_structure, 0.0);
    }

    #[test]
    fn length_bands() {
        assert_eq!(length_score("one two"), 5.0);
        assert_eq!(length_score(&"word ".repeat(30)), 20.0);
        assert_eq!(length_score(&"word ".repeat(200)), LENGTH_LONG);
    }

    #[test]
    fn recursion_detection() {
        assert!(has_recursion("def fact(n):\n    return n * fact(n - 1)\n"));
        assert!(!has_recursion("def fact(n):\n    return n\n"));
    }

    #[test]
    fn analysis_is_deterministic() {
        let a = analyzer();
        let text = "Design a GDPR compliant cache for our api";
        assert_eq!(a.analyze(text, Some("fn x() {}")), a.analyze(text, Some("fn x() {}")));
    }

    #[test]
    fn with_rules_rejects_overlapping_tables() {
        static BAD: &[KeywordRule] = &[
            KeywordRule {
                term: "audit",
                weight: 1.0,
                category: KeywordCategory::Compliance,
            },
            KeywordRule {
                term: "audit",
                weight: 1.0,
                category: KeywordCategory::Security,
            },
        ];
        let err = ComplexityAnalyzer::with_rules(TierThresholds::default(), BAD).unwrap_err();
        assert!(matches!(err, CostgateError::Config(_)));
    }

    proptest! {
        #[test]
        fn tier_is_monotonic_in_overall(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let t = TierThresholds::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(tier_for(lo, &t) <= tier_for(hi, &t));
        }

        #[test]
        fn overall_stays_in_range(text in "\\PC{0,400}", context in proptest::option::of("\\PC{0,400}")) {
            let score = analyzer().analyze(&text, context.as_deref());
            prop_assert!((0.0..=100.0).contains(&score.overall));
            prop_assert_eq!(score.tier, tier_for(score.overall, &TierThresholds::default()));
        }
    }
}
