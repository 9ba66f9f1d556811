//! Fitted trend + seasonal model and its projection

use chrono::{DateTime, Utc};

use super::algorithms::{fit_linear_regression, r_squared, residual_std, z_score};
use super::decomposition::decompose;
use super::types::{
    FactorAdjustment, ForecastFactors, ForecastPoint, SeasonalDecomposition, TrendDirection,
    TrendSummary,
};
use crate::series::Granularity;

/// Model identifier with a seasonal term
pub const MODEL_SEASONAL: &str = "ols-seasonal-additive";
/// Model identifier without a seasonal term
pub const MODEL_LINEAR: &str = "ols-linear";

/// Model fit on one series version
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    /// Model family, linear or seasonal
    pub model_id: &'static str,
    /// Trend value at the first history point
    pub intercept: f64,
    /// Trend change per step
    pub slope: f64,
    /// Seasonal profile when enough history was available
    pub decomposition: Option<SeasonalDecomposition>,
    /// Residual standard deviation after trend and seasonality
    pub residual_std: f64,
    /// R² of the in-sample fit, clamped to [0, 1]
    pub goodness_of_fit: f64,
    /// Number of points the model was fit on
    pub history_len: usize,
    /// Step width of the fitted series
    pub granularity: Granularity,
    /// Direction and growth of the trend
    pub trend: TrendSummary,
}

impl FittedModel {
    /// Fit on `values`, which must not be empty
    pub fn fit(values: &[f64], granularity: Granularity, stable_growth_threshold: f64) -> Self {
        let n = values.len();
        let decomposition = decompose(values, granularity.seasonal_period());

        let deseasonalized: Vec<f64> = match &decomposition {
            Some(d) => values
                .iter()
                .enumerate()
                .map(|(i, v)| v - d.seasonal_at(i))
                .collect(),
            None => values.to_vec(),
        };
        let (intercept, slope) = fit_linear_regression(&deseasonalized);

        let seasonal_at = |i: usize| decomposition.as_ref().map_or(0.0, |d| d.seasonal_at(i));
        let fitted: Vec<f64> = (0..n)
            .map(|i| intercept + slope * i as f64 + seasonal_at(i))
            .collect();

        let level = deseasonalized.iter().sum::<f64>() / n.max(1) as f64;
        let monthly_change = slope * granularity.steps_per_month() as f64;
        let monthly_growth_rate = if level.abs() > f64::EPSILON {
            monthly_change / level.abs()
        } else {
            0.0
        };
        let direction = if monthly_growth_rate.abs() < stable_growth_threshold {
            TrendDirection::Stable
        } else if monthly_growth_rate > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        Self {
            model_id: if decomposition.is_some() {
                MODEL_SEASONAL
            } else {
                MODEL_LINEAR
            },
            intercept,
            slope,
            residual_std: residual_std(values, &fitted, 2),
            goodness_of_fit: r_squared(values, &fitted),
            decomposition,
            history_len: n,
            granularity,
            trend: TrendSummary {
                direction,
                slope_per_step: slope,
                monthly_growth_rate,
            },
        }
    }

    /// True when no seasonal term could be fit
    pub fn insufficient_history(&self) -> bool {
        self.decomposition.is_none()
    }

    fn baseline(&self, index: usize) -> f64 {
        let seasonal = self
            .decomposition
            .as_ref()
            .map_or(0.0, |d| d.seasonal_at(index));
        self.intercept + self.slope * index as f64 + seasonal
    }

    /// Point estimates for steps `1..=steps` after the history, adjusted and floored at zero
    pub fn project_values(&self, steps: usize, factors: &ForecastFactors) -> Vec<f64> {
        let steps_per_month = self.granularity.steps_per_month() as f64;
        (1..=steps)
            .map(|h| {
                let mut value = self.baseline(self.history_len - 1 + h);
                for adjustment in &factors.adjustments {
                    value = match adjustment {
                        FactorAdjustment::Additive { per_step } => value + per_step * h as f64,
                        FactorAdjustment::Multiplicative { growth_per_month } => {
                            value * (1.0 + growth_per_month).powf(h as f64 / steps_per_month)
                        }
                    };
                }
                value.max(0.0)
            })
            .collect()
    }

    /// Projected points with confidence bands starting after `last_timestamp`
    pub fn project(
        &self,
        last_timestamp: DateTime<Utc>,
        steps: usize,
        confidence: f64,
        factors: &ForecastFactors,
    ) -> Vec<ForecastPoint> {
        let z = z_score(confidence);
        let n = self.history_len as f64;
        let mut timestamp = last_timestamp;

        self.project_values(steps, factors)
            .into_iter()
            .enumerate()
            .map(|(i, point)| {
                let h = (i + 1) as f64;
                timestamp = self.granularity.next(timestamp);
                let margin = z * self.residual_std * (1.0 + h / n).sqrt();
                ForecastPoint {
                    timestamp,
                    point_estimate: point,
                    lower_bound: (point - margin).max(0.0).min(point),
                    upper_bound: (point + margin).max(point),
                }
            })
            .collect()
    }
}
