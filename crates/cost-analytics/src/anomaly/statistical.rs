//! Rolling-window statistical baseline

use statistical::{mean, standard_deviation};

use super::baseline::{scale_floor, score_point, BaselineStrategy};
use super::types::{AnomalyFlag, DetectionMethod, DetectionWindow};
use crate::series::TimeSeries;

/// Trailing mean and standard deviation over a rolling window
#[derive(Debug, Clone)]
pub struct StatisticalBaseline {
    window_size: usize,
    min_window: usize,
    relative_floor: f64,
}

impl StatisticalBaseline {
    /// Create a baseline with the given window bounds
    pub fn new(window_size: usize, min_window: usize, relative_floor: f64) -> Self {
        Self {
            window_size,
            min_window: min_window.max(2),
            relative_floor,
        }
    }
}

impl BaselineStrategy for StatisticalBaseline {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Statistical
    }

    fn detect(&self, series: &TimeSeries, threshold: f64) -> Vec<AnomalyFlag> {
        let points = series.points();
        let values = series.values();
        let mut flags = Vec::new();

        for i in self.min_window..points.len() {
            let start = i.saturating_sub(self.window_size);
            let window = &values[start..i];
            let avg = mean(window);
            let sd = standard_deviation(window, Some(avg));
            let scale = sd.max(scale_floor(avg, self.relative_floor));

            let span = DetectionWindow {
                start: points[start].timestamp,
                end: points[i - 1].timestamp,
            };
            if let Some(flag) = score_point(
                series,
                &points[i],
                avg,
                scale,
                threshold,
                self.method(),
                span,
            ) {
                flags.push(flag);
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::types::AnomalyDirection;
    use crate::series::{Dimensions, Granularity, MetricKind, SeriesId, SeriesPoint};
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[f64]) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeSeries::from_points(
            SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily),
            Dimensions::default(),
            values
                .iter()
                .enumerate()
                .map(|(i, v)| SeriesPoint::observed(start + Duration::days(i as i64), *v))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_spike_on_flat_baseline() {
        let mut values = vec![100.0; 30];
        values[20] = 1000.0;
        let flags = StatisticalBaseline::new(14, 5, 0.01).detect(&series(&values), 1.0);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].observed, 1000.0);
        assert_eq!(flags[0].direction, AnomalyDirection::Spike);
        assert!(flags[0].severity > 0.8);
        assert_eq!(flags[0].deviation_percent, Some(900.0));
    }

    #[test]
    fn test_short_history_yields_nothing() {
        let flags = StatisticalBaseline::new(14, 5, 0.01).detect(&series(&[1.0, 50.0, 1.0]), 1.0);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_window_shrinks_to_available_history() {
        let values = vec![10.0, 10.0, 10.0, 10.0, 10.0, 2.0];
        let flags = StatisticalBaseline::new(14, 5, 0.01).detect(&series(&values), 2.0);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].direction, AnomalyDirection::Drop);
        assert_eq!(
            flags[0].window.start,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_noise_within_threshold_not_flagged() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + if i % 2 == 0 { 2.0 } else { -2.0 }).collect();
        let flags = StatisticalBaseline::new(14, 5, 0.01).detect(&series(&values), 2.0);
        assert!(flags.is_empty());
    }
}
