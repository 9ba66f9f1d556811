//! Recommendation thresholds

use serde::{Deserialize, Serialize};

use super::types::RiskLevel;
use crate::error::{CostAnalyticsError, CostAnalyticsResult};

/// Right-sizing and idle detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RightSizingConfig {
    /// Daily average CPU percent below which a resource is oversized
    pub cpu_threshold: f64,
    /// Daily average memory percent below which a resource is oversized
    pub memory_threshold: f64,
    /// Consecutive days the utilization must stay low
    pub lookback_days: usize,
    /// Daily average CPU percent below which a resource is idle
    pub idle_threshold: f64,
}

impl Default for RightSizingConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 20.0,
            memory_threshold: 30.0,
            lookback_days: 14,
            idle_threshold: 2.0,
        }
    }
}

/// Storage tier transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageTieringConfig {
    /// Days without access before data is archived
    pub unused_days: usize,
    /// Days without access before deletion is suggested
    pub archive_days: usize,
    /// Average daily accesses below which hot data is moved to cool
    pub cool_access_threshold: f64,
}

impl Default for StorageTieringConfig {
    fn default() -> Self {
        Self {
            unused_days: 30,
            archive_days: 180,
            cool_access_threshold: 10.0,
        }
    }
}

/// Reserved capacity planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedPlanningConfig {
    /// Fraction of average usage to commit
    pub coverage_target: f64,
    /// Low usage percentile treated as the always-on baseline
    pub baseline_percentile: f64,
    /// Minimum usage points before planning
    pub min_history_points: usize,
    /// Ceiling on the total commitment over the term; `None` is unbounded
    pub budget_ceiling: Option<f64>,
    /// Highest plan risk accepted
    pub risk_tolerance: RiskLevel,
}

impl Default for ReservedPlanningConfig {
    fn default() -> Self {
        Self {
            coverage_target: 0.8,
            baseline_percentile: 0.2,
            min_history_points: 14,
            budget_ceiling: None,
            risk_tolerance: RiskLevel::Medium,
        }
    }
}

/// Reserved bandwidth and traffic placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthConfig {
    /// Fraction of days that must reach the daily break-even volume
    pub sustained_fraction: f64,
    /// Days of traffic required
    pub lookback_days: usize,
}

impl Default for BandwidthConfig {
    fn default() -> Self {
        Self {
            sustained_fraction: 0.8,
            lookback_days: 30,
        }
    }
}

/// Recommendation engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Right-sizing and idle detection
    pub rightsizing: RightSizingConfig,
    /// Storage tiering
    pub storage: StorageTieringConfig,
    /// Reserved capacity planning
    pub reserved: ReservedPlanningConfig,
    /// Bandwidth commitments
    pub bandwidth: BandwidthConfig,
}

fn invalid(message: impl Into<String>) -> CostAnalyticsError {
    CostAnalyticsError::ConfigurationError {
        message: message.into(),
    }
}

fn is_percent(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 100.0
}

fn is_fraction(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

impl RecommendationConfig {
    /// Validate configuration
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        let rs = &self.rightsizing;
        if !is_percent(rs.cpu_threshold) || !is_percent(rs.memory_threshold) {
            return Err(invalid("utilization thresholds must be in (0, 100]"));
        }
        if !is_percent(rs.idle_threshold) || rs.idle_threshold >= rs.cpu_threshold {
            return Err(invalid(format!(
                "idle_threshold ({}) must be positive and below cpu_threshold ({})",
                rs.idle_threshold, rs.cpu_threshold
            )));
        }
        if rs.lookback_days == 0 {
            return Err(invalid("rightsizing.lookback_days must be at least 1"));
        }

        let storage = &self.storage;
        if storage.unused_days == 0 || storage.archive_days < storage.unused_days {
            return Err(invalid(format!(
                "archive_days ({}) must be >= unused_days ({}) >= 1",
                storage.archive_days, storage.unused_days
            )));
        }
        if storage.cool_access_threshold.is_nan() || storage.cool_access_threshold < 0.0 {
            return Err(invalid("cool_access_threshold must not be negative"));
        }

        let reserved = &self.reserved;
        if !is_fraction(reserved.coverage_target) || !is_fraction(reserved.baseline_percentile) {
            return Err(invalid("coverage_target and baseline_percentile must be in (0, 1]"));
        }
        if reserved.min_history_points < 2 {
            return Err(invalid("reserved.min_history_points must be at least 2"));
        }
        if let Some(ceiling) = reserved.budget_ceiling {
            if ceiling.is_nan() || ceiling < 0.0 {
                return Err(invalid(format!("budget_ceiling must not be negative, got {}", ceiling)));
            }
        }

        if !is_fraction(self.bandwidth.sustained_fraction) {
            return Err(invalid("sustained_fraction must be in (0, 1]"));
        }
        if self.bandwidth.lookback_days == 0 {
            return Err(invalid("bandwidth.lookback_days must be at least 1"));
        }
        Ok(())
    }
}
