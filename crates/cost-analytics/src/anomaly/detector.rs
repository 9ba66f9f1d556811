//! Anomaly detector dispatching to the configured baselines

use std::sync::Arc;
use tracing::debug;

use super::baseline::BaselineStrategy;
use super::config::{AnomalyConfig, Sensitivity};
use super::learned::LearnedBaseline;
use super::statistical::StatisticalBaseline;
use super::types::{AnomalyFlag, DetectionMethod};
use crate::error::CostAnalyticsResult;
use crate::series::TimeSeries;

/// Anomaly detector for canonical series
pub struct AnomalyDetector {
    config: Arc<AnomalyConfig>,
    statistical: StatisticalBaseline,
    learned: LearnedBaseline,
}

impl AnomalyDetector {
    /// Create a new anomaly detector
    pub fn new(config: AnomalyConfig) -> CostAnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            statistical: StatisticalBaseline::new(
                config.window_size,
                config.min_window,
                config.relative_scale_floor,
            ),
            learned: LearnedBaseline::new(
                config.learned_min_history,
                config.learned_exclusion_threshold,
                config.relative_scale_floor,
            ),
            config: Arc::new(config),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Baseline implementation for a method
    pub fn strategy(&self, method: DetectionMethod) -> &dyn BaselineStrategy {
        match method {
            DetectionMethod::Statistical => &self.statistical,
            DetectionMethod::Learned => &self.learned,
        }
    }

    /// Flag anomalous points; empty when nothing is found or history is short
    pub fn detect(
        &self,
        series: &TimeSeries,
        method: DetectionMethod,
        sensitivity: Sensitivity,
    ) -> Vec<AnomalyFlag> {
        let threshold = self.config.sensitivity.threshold(sensitivity);
        let flags = self.strategy(method).detect(series, threshold);
        if !flags.is_empty() {
            debug!(
                "Detected {} {} anomalies in {} (k={})",
                flags.len(),
                method,
                series.id,
                threshold
            );
        }
        flags
    }
}
