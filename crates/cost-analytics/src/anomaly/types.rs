//! Anomaly flag types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::series::SeriesId;

/// Baseline used to judge a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Trailing rolling mean and standard deviation
    Statistical,
    /// Seasonal median profile with robust scale
    Learned,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::Statistical => write!(f, "statistical"),
            DetectionMethod::Learned => write!(f, "learned"),
        }
    }
}

/// Whether the point is above or below its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyDirection {
    /// Above baseline
    Spike,
    /// Below baseline
    Drop,
}

/// Span of history the baseline was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionWindow {
    /// First baseline point
    pub start: DateTime<Utc>,
    /// Last baseline point
    pub end: DateTime<Utc>,
}

/// Detected anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    /// Stable id derived from series, timestamp and method
    pub id: Uuid,
    /// Source series
    pub series_id: SeriesId,
    /// Timestamp of the anomalous point
    pub timestamp: DateTime<Utc>,
    /// Baseline window
    pub window: DetectionWindow,
    /// Severity in [0, 1]
    pub severity: f64,
    /// Method that raised the flag
    pub method: DetectionMethod,
    /// Deviation in units of the baseline scale
    pub z_score: f64,
    /// Percent over (or under) the expected value; `None` for a zero baseline
    pub deviation_percent: Option<f64>,
    /// Observed value
    pub observed: f64,
    /// Expected value
    pub expected: f64,
    /// Spike or drop
    pub direction: AnomalyDirection,
}

impl AnomalyFlag {
    /// Deterministic flag id
    pub fn stable_id(series_id: &SeriesId, timestamp: DateTime<Utc>, method: DetectionMethod) -> Uuid {
        let source = format!("{}|{}|{}", series_id, timestamp.to_rfc3339(), method);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, source.as_bytes())
    }
}
