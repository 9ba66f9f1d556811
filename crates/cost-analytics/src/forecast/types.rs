//! Forecast result types

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::series::SeriesId;

/// One projected step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Bucket start of the projected step
    pub timestamp: DateTime<Utc>,
    /// Point estimate
    pub point_estimate: f64,
    /// Lower bound of the confidence band
    pub lower_bound: f64,
    /// Upper bound of the confidence band
    pub upper_bound: f64,
}

/// Classical additive decomposition of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalDecomposition {
    /// Cycle length in buckets
    pub period: usize,
    /// Centered moving-average trend; `None` at the edges
    pub trend: Vec<Option<f64>>,
    /// Seasonal effect per phase, summing to zero
    pub seasonal: Vec<f64>,
    /// Residual where the trend is defined
    pub residual: Vec<Option<f64>>,
}

impl SeasonalDecomposition {
    /// Seasonal effect at a series index
    pub fn seasonal_at(&self, index: usize) -> f64 {
        if self.seasonal.is_empty() {
            0.0
        } else {
            self.seasonal[index % self.seasonal.len()]
        }
    }
}

/// Direction of the fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Growing
    Increasing,
    /// Shrinking
    Decreasing,
    /// Flat within the stability threshold
    Stable,
}

/// Summary of the fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Direction
    pub direction: TrendDirection,
    /// OLS slope per bucket
    pub slope_per_step: f64,
    /// Slope over one month relative to the mean level
    pub monthly_growth_rate: f64,
}

/// Explicit adjustment applied on top of the trend projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorAdjustment {
    /// Add `per_step * h` at step `h`
    Additive {
        /// Increment per projected step
        per_step: f64,
    },
    /// Multiply by `(1 + growth_per_month)` compounded per month
    Multiplicative {
        /// Monthly growth rate, e.g. 0.05 for +5%
        growth_per_month: f64,
    },
}

/// Ordered list of adjustments applied after the trend projection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastFactors {
    /// Adjustments in application order
    pub adjustments: Vec<FactorAdjustment>,
}

impl ForecastFactors {
    /// No adjustments
    pub fn none() -> Self {
        Self::default()
    }

    /// Append an adjustment
    pub fn with(mut self, adjustment: FactorAdjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }

    pub(crate) fn cache_key(&self) -> Vec<(u8, OrderedFloat<f64>)> {
        self.adjustments
            .iter()
            .map(|a| match a {
                FactorAdjustment::Additive { per_step } => (0, OrderedFloat(*per_step)),
                FactorAdjustment::Multiplicative { growth_per_month } => {
                    (1, OrderedFloat(*growth_per_month))
                }
            })
            .collect()
    }
}

/// Forecast for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Deterministic id derived from series, version and request
    pub id: Uuid,
    /// Source series
    pub series_id: SeriesId,
    /// Series version the model was fit on
    pub series_version: u64,
    /// Model identifier
    pub model_id: String,
    /// Requested horizon in months
    pub horizon_months: u32,
    /// Requested confidence level
    pub confidence: f64,
    /// Projected steps in time order
    pub points: Vec<ForecastPoint>,
    /// R² of the fitted values, in [0, 1]
    pub goodness_of_fit: f64,
    /// Set when the series was too short for a seasonal term
    pub insufficient_history: bool,
    /// Decomposition when a seasonal term was fit
    pub decomposition: Option<SeasonalDecomposition>,
    /// Trend summary
    pub trend: TrendSummary,
}

impl ForecastResult {
    /// Sum of point estimates up to and including `until`
    pub fn cumulative_until(&self, until: DateTime<Utc>) -> f64 {
        self.points
            .iter()
            .take_while(|p| p.timestamp <= until)
            .map(|p| p.point_estimate)
            .sum()
    }

    /// Mean point estimate over the horizon
    pub fn mean_estimate(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.point_estimate).sum::<f64>() / self.points.len() as f64)
    }
}

/// Accuracy of a holdout evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute percentage error, in percent
    pub mape: f64,
}

/// Holdout backtest of the forecast model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Source series
    pub series_id: SeriesId,
    /// Points used for fitting
    pub train_size: usize,
    /// Points held out
    pub test_size: usize,
    /// Accuracy on the holdout
    pub metrics: AccuracyMetrics,
    /// Predicted values for the holdout
    pub predictions: Vec<f64>,
    /// Observed holdout values
    pub actuals: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_factor_cache_key_distinguishes_kinds() {
        let additive = ForecastFactors::none().with(FactorAdjustment::Additive { per_step: 1.0 });
        let multiplicative = ForecastFactors::none()
            .with(FactorAdjustment::Multiplicative { growth_per_month: 1.0 });
        assert_ne!(additive.cache_key(), multiplicative.cache_key());
        assert!(ForecastFactors::none().cache_key().is_empty());
    }

    #[test]
    fn test_factor_serde_shape() {
        let json = serde_json::to_value(FactorAdjustment::Multiplicative {
            growth_per_month: 0.1,
        })
        .unwrap();
        assert_eq!(json["kind"], "multiplicative");
        assert_eq!(json["growth_per_month"], 0.1);
    }

    #[test]
    fn test_seasonal_at_wraps_phase() {
        let decomposition = SeasonalDecomposition {
            period: 3,
            trend: vec![],
            seasonal: vec![-1.0, 0.0, 1.0],
            residual: vec![],
        };
        assert_eq!(decomposition.seasonal_at(4), 0.0);
        assert_eq!(decomposition.seasonal_at(5), 1.0);
    }

    #[test]
    fn test_cumulative_until() {
        let ts = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let point = |d, v| ForecastPoint {
            timestamp: ts(d),
            point_estimate: v,
            lower_bound: v,
            upper_bound: v,
        };
        let result = ForecastResult {
            id: Uuid::nil(),
            series_id: SeriesId::new("vm", crate::series::MetricKind::Cost, crate::series::Granularity::Daily),
            series_version: 1,
            model_id: "ols-linear".to_string(),
            horizon_months: 1,
            confidence: 0.95,
            points: vec![point(1, 1.0), point(2, 2.0), point(3, 3.0)],
            goodness_of_fit: 1.0,
            insufficient_history: true,
            decomposition: None,
            trend: TrendSummary {
                direction: TrendDirection::Increasing,
                slope_per_step: 1.0,
                monthly_growth_rate: 15.0,
            },
        };
        assert_eq!(result.cumulative_until(ts(2)), 3.0);
        assert_eq!(result.mean_estimate(), Some(2.0));
    }
}
