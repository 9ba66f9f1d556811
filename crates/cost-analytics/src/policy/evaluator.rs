//! Batch policy evaluation

use std::collections::HashMap;
use tracing::{info, warn};

use super::types::{InvalidPolicyReport, Policy, PolicyEvaluation, PolicyResult};
use crate::error::CostAnalyticsResult;
use crate::forecast::ForecastResult;
use crate::series::{SeriesId, TimeSeries};

/// Evaluates budget and tag policies against current values and forecasts
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Create a new policy evaluator
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one policy; malformed definitions are an error for that policy only
    pub fn evaluate_policy(
        &self,
        policy: &Policy,
        series: &[TimeSeries],
        forecasts: &[ForecastResult],
    ) -> CostAnalyticsResult<PolicyResult> {
        match policy {
            Policy::Budget(budget) => {
                budget.validate()?;
                let by_series: HashMap<&SeriesId, &ForecastResult> =
                    forecasts.iter().map(|f| (&f.series_id, f)).collect();
                Ok(budget.evaluate(series, &by_series))
            }
            Policy::Tag(tags) => tags.evaluate(series),
        }
    }

    /// Evaluate every policy, collecting malformed ones separately
    pub fn evaluate(
        &self,
        series: &[TimeSeries],
        forecasts: &[ForecastResult],
        policies: &[Policy],
    ) -> PolicyEvaluation {
        let mut evaluation = PolicyEvaluation::default();
        for policy in policies {
            match self.evaluate_policy(policy, series, forecasts) {
                Ok(result) => evaluation.results.push(result),
                Err(e) => {
                    warn!("Rejecting policy {}: {}", policy.id(), e);
                    evaluation.errors.push(InvalidPolicyReport {
                        policy_id: policy.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(
            "Evaluated {} policies ({} invalid)",
            policies.len(),
            evaluation.errors.len()
        );
        evaluation
    }
}
