//! Learned baseline: seasonal median profile with a robust scale

use statistical::median;

use super::baseline::{scale_floor, score_point, BaselineStrategy};
use super::types::{AnomalyFlag, DetectionMethod, DetectionWindow};
use crate::series::TimeSeries;

/// MAD to standard deviation under normality
const MAD_SCALE: f64 = 1.4826;

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    phase_medians: Vec<f64>,
    scale: f64,
}

impl Profile {
    fn expected(&self, index: usize) -> f64 {
        self.phase_medians[index % self.phase_medians.len()]
    }
}

/// Baseline fit on the series' own "normal" history
#[derive(Debug, Clone)]
pub struct LearnedBaseline {
    min_history: usize,
    exclusion_threshold: f64,
    relative_floor: f64,
}

impl LearnedBaseline {
    /// Create a learned baseline
    pub fn new(min_history: usize, exclusion_threshold: f64, relative_floor: f64) -> Self {
        Self {
            min_history,
            exclusion_threshold,
            relative_floor,
        }
    }

    fn fit(&self, values: &[f64], period: usize, include: &[bool]) -> Option<Profile> {
        let kept: Vec<f64> = values
            .iter()
            .zip(include)
            .filter(|(_, keep)| **keep)
            .map(|(v, _)| *v)
            .collect();
        if kept.is_empty() {
            return None;
        }
        let overall = median(&kept);

        let phase_medians: Vec<f64> = (0..period)
            .map(|phase| {
                let phase_values: Vec<f64> = values
                    .iter()
                    .zip(include)
                    .enumerate()
                    .filter(|(i, (_, keep))| i % period == phase && **keep)
                    .map(|(_, (v, _))| *v)
                    .collect();
                if phase_values.is_empty() {
                    overall
                } else {
                    median(&phase_values)
                }
            })
            .collect();

        let abs_residuals: Vec<f64> = values
            .iter()
            .zip(include)
            .enumerate()
            .filter(|(_, (_, keep))| **keep)
            .map(|(i, (v, _))| (v - phase_medians[i % period]).abs())
            .collect();
        let mad = median(&abs_residuals) * MAD_SCALE;

        Some(Profile {
            phase_medians,
            scale: mad.max(scale_floor(overall, self.relative_floor)),
        })
    }
}

impl BaselineStrategy for LearnedBaseline {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Learned
    }

    fn detect(&self, series: &TimeSeries, threshold: f64) -> Vec<AnomalyFlag> {
        let points = series.points();
        if points.len() < self.min_history {
            return Vec::new();
        }
        let values = series.values();
        let seasonal_period = series.id.granularity.seasonal_period();
        let period = if values.len() >= 2 * seasonal_period {
            seasonal_period
        } else {
            1
        };

        let all = vec![true; values.len()];
        let Some(initial) = self.fit(&values, period, &all) else {
            return Vec::new();
        };

        // Refit once on the points that look normal under the first pass
        let normal: Vec<bool> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v - initial.expected(i)).abs() <= self.exclusion_threshold * initial.scale)
            .collect();
        let profile = self.fit(&values, period, &normal).unwrap_or(initial);

        let window = DetectionWindow {
            start: points[0].timestamp,
            end: points[points.len() - 1].timestamp,
        };

        points
            .iter()
            .enumerate()
            .filter_map(|(i, point)| {
                score_point(
                    series,
                    point,
                    profile.expected(i),
                    profile.scale,
                    threshold,
                    self.method(),
                    window,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
        let flags = LearnedBaseline::new(10, 3.0, 0.01).detect(&series(&values), 1.0);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].expected, 100.0);
        assert!(flags[0].severity > 0.8);
        assert_eq!(flags[0].method, DetectionMethod::Learned);
    }

    #[test]
    fn test_weekly_pattern_is_not_anomalous() {
        let pattern = [100.0, 110.0, 120.0, 115.0, 105.0, 40.0, 35.0];
        let values: Vec<f64> = (0..42).map(|i| pattern[i % 7]).collect();
        let flags = LearnedBaseline::new(10, 3.0, 0.01).detect(&series(&values), 2.0);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_weekend_surge_flagged_against_profile() {
        let pattern = [100.0, 110.0, 120.0, 115.0, 105.0, 40.0, 35.0];
        let mut values: Vec<f64> = (0..42).map(|i| pattern[i % 7]).collect();
        // a Saturday at weekday levels
        values[33] = 115.0;
        let flags = LearnedBaseline::new(10, 3.0, 0.01).detect(&series(&values), 2.0);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].expected, 40.0);
    }

    #[test]
    fn test_short_history_yields_nothing() {
        let flags = LearnedBaseline::new(10, 3.0, 0.01).detect(&series(&[1.0, 100.0, 1.0]), 1.0);
        assert!(flags.is_empty());
    }
}
