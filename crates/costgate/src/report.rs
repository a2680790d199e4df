// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `costgate summary` and `costgate recommend` command implementations.

use costgate_config::CostgateConfig;
use costgate_core::CostgateError;
use costgate_cost::{BudgetSummary, Recommendation};

use crate::stores;

fn percent_of(spend: f64, limit: f64) -> f64 {
    if limit > 0.0 { spend / limit * 100.0 } else { 0.0 }
}

pub fn render_summary(summary: &BudgetSummary) -> String {
    format!(
        "today:       ${:.4} of ${:.2} ({:.1}%)\n\
         this month:  ${:.4} of ${:.2} ({:.1}%)\n\
         all time:    ${:.4} over {} calls\n\
         cache hits:  {} ({:.1}%)\n",
        summary.today_spend,
        summary.daily_budget,
        percent_of(summary.today_spend, summary.daily_budget),
        summary.month_spend,
        summary.monthly_budget,
        percent_of(summary.month_spend, summary.monthly_budget),
        summary.total_spend,
        summary.total_calls,
        summary.cached_calls,
        summary.cache_hit_rate * 100.0
    )
}

pub fn render_recommendations(recs: &[Recommendation]) -> String {
    if recs.is_empty() {
        return "no recommendations: usage looks efficient\n".to_string();
    }
    recs.iter()
        .map(|r| format!("- [{}] {}\n", r.kind, r.message))
        .collect()
}

/// Run the `costgate summary` command.
pub async fn run_summary(config: &CostgateConfig, json: bool) -> Result<(), CostgateError> {
    let ledger = stores::open_ledger(config).await?;
    let summary = ledger.summary().await?;
    if json {
        stores::print_json(&summary);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(())
}

/// Run the `costgate recommend` command.
pub async fn run_recommend(config: &CostgateConfig, json: bool) -> Result<(), CostgateError> {
    let ledger = stores::open_ledger(config).await?;
    let recs = ledger
        .recommendations(&config.backends, &config.recommendations)
        .await?;
    if json {
        stores::print_json(&recs);
    } else {
        print!("{}", render_recommendations(&recs));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use costgate_cost::RecommendationKind;

    use super::*;

    #[test]
    fn summary_shows_percentages() {
        let summary = BudgetSummary {
            today_spend: 2.5,
            month_spend: 50.0,
            total_spend: 75.0,
            total_calls: 40,
            cached_calls: 10,
            cache_hit_rate: 0.25,
            daily_budget: 10.0,
            monthly_budget: 200.0,
        };
        let rendered = render_summary(&summary);
        assert!(rendered.contains("(25.0%)"));
        assert!(rendered.contains("over 40 calls"));
        assert!(rendered.contains("cache hits:  10 (25.0%)"));
    }

    #[test]
    fn empty_recommendations_render_a_note() {
        assert!(render_recommendations(&[]).starts_with("no recommendations"));
    }

    #[test]
    fn recommendations_render_kind_and_message() {
        let recs = vec![Recommendation {
            kind: RecommendationKind::LargeInputs,
            message: "trim context".into(),
        }];
        assert_eq!(render_recommendations(&recs), "- [large_inputs] trim context\n");
    }

    #[tokio::test]
    async fn summary_and_recommend_run_on_a_fresh_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let config = stores::temp_config(dir.path());
        run_summary(&config, false).await.unwrap();
        run_recommend(&config, true).await.unwrap();
        assert!(dir.path().join("ledger.db").exists());
    }
}
