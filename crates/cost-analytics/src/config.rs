//! Aggregated analytics configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::anomaly::AnomalyConfig;
use crate::error::{CostAnalyticsError, CostAnalyticsResult};
use crate::forecast::ForecastConfig;
use crate::normalizer::NormalizerConfig;
use crate::pipeline::PipelineConfig;
use crate::ranking::RankingConfig;
use crate::recommendation::RecommendationConfig;

/// Configuration for every component; missing sections take their defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Record normalization
    pub normalizer: NormalizerConfig,
    /// Trend and forecast engine
    pub forecast: ForecastConfig,
    /// Anomaly detection
    pub anomaly: AnomalyConfig,
    /// Recommendation thresholds
    pub recommendation: RecommendationConfig,
    /// Ranking filters
    pub ranking: RankingConfig,
    /// Concurrency and forecast horizon
    pub pipeline: PipelineConfig,
}

impl AnalyticsConfig {
    /// Parse configuration from JSON and validate it
    pub fn from_json(json: &str) -> CostAnalyticsResult<Self> {
        let config: AnalyticsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> CostAnalyticsResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CostAnalyticsError::ConfigurationError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&contents)
    }

    /// Serialize configuration as pretty JSON
    pub fn to_json(&self) -> CostAnalyticsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every section
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        self.normalizer.validate()?;
        self.forecast.validate()?;
        self.anomaly.validate()?;
        self.recommendation.validate()?;
        self.ranking.validate()?;
        self.pipeline.validate()?;
        if self.pipeline.forecast_months > self.forecast.max_forecast_months {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!(
                    "pipeline.forecast_months ({}) exceeds forecast.max_forecast_months ({})",
                    self.pipeline.forecast_months, self.forecast.max_forecast_months
                ),
            });
        }
        Ok(())
    }
}
