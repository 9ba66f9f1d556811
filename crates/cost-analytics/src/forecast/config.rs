//! Configuration for the forecast engine

use serde::{Deserialize, Serialize};

use crate::error::{CostAnalyticsError, CostAnalyticsResult};

/// Forecast engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Minimum observed points before a model is fit
    pub min_history_points: usize,
    /// Longest allowed horizon in months
    pub max_forecast_months: u32,
    /// Relative monthly growth below which a trend is reported as stable
    pub stable_growth_threshold: f64,
    /// Cache fitted models and projections per series version
    pub cache_enabled: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_history_points: 3,
            max_forecast_months: 12,
            stable_growth_threshold: 0.05,
            cache_enabled: true,
        }
    }
}

impl ForecastConfig {
    /// Validate configuration
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        if self.min_history_points < 3 {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!(
                    "min_history_points must be at least 3, got {}",
                    self.min_history_points
                ),
            });
        }
        if self.max_forecast_months == 0 {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "max_forecast_months must be at least 1".to_string(),
            });
        }
        if self.stable_growth_threshold.is_nan() || self.stable_growth_threshold < 0.0 {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "stable_growth_threshold must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}
