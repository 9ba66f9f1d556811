//! Deterministic ranking of recommendations

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{CostAnalyticsError, CostAnalyticsResult};
use crate::recommendation::{Recommendation, RiskLevel};

/// Ranking filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Recommendations below this confidence are dropped
    pub min_confidence: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { min_confidence: 0.0 }
    }
}

impl RankingConfig {
    /// Validate configuration
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!("min_confidence must be in [0, 1], got {}", self.min_confidence),
            });
        }
        Ok(())
    }
}

type SortKey = (
    Reverse<OrderedFloat<f64>>,
    Reverse<OrderedFloat<f64>>,
    String,
    u8,
    RiskLevel,
    String,
);

/// Total order: savings desc, confidence desc, resource id asc, type priority,
/// then lower risk and the action itself so equal-scored duplicates resolve the same way
fn sort_key(rec: &Recommendation) -> SortKey {
    (
        Reverse(OrderedFloat(rec.estimated_monthly_savings)),
        Reverse(OrderedFloat(rec.confidence)),
        rec.resource_id.clone(),
        rec.recommendation_type.priority(),
        rec.risk,
        format!("{:?}", rec.action),
    )
}

/// Filter and order recommendations; the result does not depend on input order
pub fn rank(recommendations: Vec<Recommendation>, config: &RankingConfig) -> Vec<Recommendation> {
    let total = recommendations.len();
    let mut ranked: Vec<Recommendation> = recommendations
        .into_iter()
        .filter(|r| r.estimated_monthly_savings > 0.0 && r.estimated_monthly_savings.is_finite())
        .filter(|r| r.confidence >= config.min_confidence)
        .collect();
    ranked.sort_by_cached_key(sort_key);

    let mut seen = HashSet::new();
    ranked.retain(|r| seen.insert((r.resource_id.clone(), r.recommendation_type)));
    debug!("Ranked {} of {} recommendations", ranked.len(), total);
    ranked
}
