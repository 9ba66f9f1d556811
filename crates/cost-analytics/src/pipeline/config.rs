//! Pipeline configuration

use serde::{Deserialize, Serialize};

use crate::error::{CostAnalyticsError, CostAnalyticsResult};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum per-series or per-resource tasks in flight
    pub max_concurrency: usize,
    /// Forecast horizon used for budgets and reservations
    pub forecast_months: u32,
    /// Two-sided forecast interval confidence
    pub confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            forecast_months: 3,
            confidence: 0.95,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        if self.max_concurrency == 0 {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "max_concurrency must be at least 1".to_string(),
            });
        }
        if self.forecast_months == 0 {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "forecast_months must be at least 1".to_string(),
            });
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!("confidence must be in (0, 1), got {}", self.confidence),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(PipelineConfig::default().validate().is_ok());
        let config = PipelineConfig {
            confidence: 1.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Invalid configuration: confidence must be in (0, 1), got 1"
        );
    }
}
