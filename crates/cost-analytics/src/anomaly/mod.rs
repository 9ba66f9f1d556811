//! Anomaly detection over canonical series
//!
//! Two baselines sit behind [`BaselineStrategy`]: a trailing rolling window and a
//! learned seasonal-median profile. Both score deviations in units of their scale
//! so severities are comparable across methods.

mod baseline;
mod config;
mod detector;
mod learned;
mod statistical;
mod types;

pub use baseline::{severity, BaselineStrategy};
pub use config::{AnomalyConfig, Sensitivity, SensitivityTable};
pub use detector::AnomalyDetector;
pub use learned::LearnedBaseline;
pub use statistical::StatisticalBaseline;
pub use types::{AnomalyDirection, AnomalyFlag, DetectionMethod, DetectionWindow};
