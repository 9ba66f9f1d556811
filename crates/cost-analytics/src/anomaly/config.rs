//! Configuration for anomaly detection

use serde::{Deserialize, Serialize};

use crate::error::{CostAnalyticsError, CostAnalyticsResult};

/// Detection sensitivity requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// Only gross deviations
    Low,
    /// Default
    Medium,
    /// Flag small deviations
    High,
}

/// Deviation multiplier `k` per sensitivity, in units of the baseline scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    /// Multiplier for `Low`
    pub low: f64,
    /// Multiplier for `Medium`
    pub medium: f64,
    /// Multiplier for `High`
    pub high: f64,
}

impl Default for SensitivityTable {
    fn default() -> Self {
        Self {
            low: 3.0,
            medium: 2.0,
            high: 1.0,
        }
    }
}

impl SensitivityTable {
    /// Multiplier for a sensitivity
    pub fn threshold(&self, sensitivity: Sensitivity) -> f64 {
        match sensitivity {
            Sensitivity::Low => self.low,
            Sensitivity::Medium => self.medium,
            Sensitivity::High => self.high,
        }
    }
}

/// Anomaly detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Sensitivity multipliers
    pub sensitivity: SensitivityTable,
    /// Trailing window for the statistical baseline
    pub window_size: usize,
    /// Smallest window the statistical baseline shrinks to
    pub min_window: usize,
    /// Scale floor relative to the baseline level
    pub relative_scale_floor: f64,
    /// Minimum points before the learned baseline is fit
    pub learned_min_history: usize,
    /// Robust threshold used to exclude outliers before refitting the learned baseline
    pub learned_exclusion_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sensitivity: SensitivityTable::default(),
            window_size: 14,
            min_window: 5,
            relative_scale_floor: 0.01,
            learned_min_history: 10,
            learned_exclusion_threshold: 3.0,
        }
    }
}

impl AnomalyConfig {
    /// Validate configuration
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        let table = &self.sensitivity;
        for (name, k) in [("low", table.low), ("medium", table.medium), ("high", table.high)] {
            if !(k.is_finite() && k > 0.0) {
                return Err(CostAnalyticsError::ConfigurationError {
                    message: format!("sensitivity.{} must be positive, got {}", name, k),
                });
            }
        }
        if table.low < table.medium || table.medium < table.high {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "sensitivity multipliers must satisfy low >= medium >= high".to_string(),
            });
        }
        if self.min_window < 2 || self.window_size < self.min_window {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!(
                    "window_size ({}) must be >= min_window ({}) >= 2",
                    self.window_size, self.min_window
                ),
            });
        }
        if self.relative_scale_floor.is_nan()
            || self.relative_scale_floor < 0.0
            || self.learned_exclusion_threshold.is_nan()
            || self.learned_exclusion_threshold <= 0.0
        {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "scale floor and exclusion threshold must be positive".to_string(),
            });
        }
        if self.learned_min_history < 3 {
            return Err(CostAnalyticsError::ConfigurationError {
                message: "learned_min_history must be at least 3".to_string(),
            });
        }
        Ok(())
    }
}
