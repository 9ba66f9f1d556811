//! Baseline strategy seam and the scoring shared by every strategy

use super::types::{AnomalyDirection, AnomalyFlag, DetectionMethod, DetectionWindow};
use crate::series::{SeriesPoint, TimeSeries};

/// A way of computing the expected value and scale of each point
pub trait BaselineStrategy: Send + Sync {
    /// Method tag carried by produced flags
    fn method(&self) -> DetectionMethod;

    /// Flag points deviating more than `threshold` scales from the baseline
    fn detect(&self, series: &TimeSeries, threshold: f64) -> Vec<AnomalyFlag>;
}

/// Smallest scale used for a baseline at `level`
pub fn scale_floor(level: f64, relative: f64) -> f64 {
    1e-9 + relative * level.abs()
}

/// Map `ratio = |deviation| / (k * scale)` (> 1 when flagged) into [0.5, 1.0]
pub fn severity(ratio: f64) -> f64 {
    (0.5 + 0.5 * (1.0 - (-(ratio - 1.0)).exp())).clamp(0.0, 1.0)
}

/// Score one point against its baseline; `None` when within `threshold` scales
pub fn score_point(
    series: &TimeSeries,
    point: &SeriesPoint,
    expected: f64,
    scale: f64,
    threshold: f64,
    method: DetectionMethod,
    window: DetectionWindow,
) -> Option<AnomalyFlag> {
    let deviation = point.value - expected;
    if deviation.abs() <= threshold * scale {
        return None;
    }

    let ratio = deviation.abs() / (threshold * scale);
    let deviation_percent = if expected.abs() > f64::EPSILON {
        Some(deviation / expected.abs() * 100.0)
    } else {
        None
    };

    Some(AnomalyFlag {
        id: AnomalyFlag::stable_id(&series.id, point.timestamp, method),
        series_id: series.id.clone(),
        timestamp: point.timestamp,
        window,
        severity: severity(ratio),
        method,
        z_score: deviation / scale,
        deviation_percent,
        observed: point.value,
        expected,
        direction: if deviation > 0.0 {
            AnomalyDirection::Spike
        } else {
            AnomalyDirection::Drop
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_severity_range() {
        assert_relative_eq!(severity(1.0), 0.5);
        assert!(severity(2.0) > 0.8);
        assert!(severity(1000.0) <= 1.0);
        assert!(severity(1.5) > severity(1.2));
    }

    #[test]
    fn test_scale_floor() {
        assert_relative_eq!(scale_floor(100.0, 0.01), 1.0 + 1e-9);
        assert!(scale_floor(0.0, 0.01) > 0.0);
    }
}
