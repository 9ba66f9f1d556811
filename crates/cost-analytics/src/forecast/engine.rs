//! Forecast engine with a model cache keyed on series history

use dashmap::DashMap;
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::algorithms::{
    mean_absolute_error, mean_absolute_percentage_error, root_mean_squared_error,
};
use super::config::ForecastConfig;
use super::model::FittedModel;
use super::types::{AccuracyMetrics, BacktestReport, ForecastFactors, ForecastResult};
use crate::error::{CostAnalyticsError, CostAnalyticsResult};
use crate::series::{SeriesId, TimeSeries};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProjectionKey {
    horizon_months: u32,
    confidence: OrderedFloat<f64>,
    factors: Vec<(u8, OrderedFloat<f64>)>,
}

#[derive(Debug)]
struct CachedModel {
    model: Arc<FittedModel>,
    projections: HashMap<ProjectionKey, ForecastResult>,
}

/// Per-series trend/seasonal forecaster
pub struct ForecastEngine {
    config: Arc<ForecastConfig>,
    /// Keyed by series id and history fingerprint
    cache: DashMap<(SeriesId, u64), CachedModel>,
}

impl ForecastEngine {
    /// Create a new forecast engine
    pub fn new(config: ForecastConfig) -> CostAnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            cache: DashMap::new(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `horizon_months` ahead with a two-sided `confidence` band
    pub fn forecast(
        &self,
        series: &TimeSeries,
        horizon_months: u32,
        confidence: f64,
        factors: &ForecastFactors,
    ) -> CostAnalyticsResult<ForecastResult> {
        if horizon_months == 0 || horizon_months > self.config.max_forecast_months {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!(
                    "horizon_months must be in 1..={}, got {}",
                    self.config.max_forecast_months, horizon_months
                ),
            });
        }
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!("confidence must be in (0, 1), got {}", confidence),
            });
        }
        self.ensure_history(series, self.config.min_history_points)?;

        let key = ProjectionKey {
            horizon_months,
            confidence: OrderedFloat(confidence),
            factors: factors.cache_key(),
        };

        if !self.config.cache_enabled {
            let model = self.fit(series);
            return Ok(self.build_result(series, &model, horizon_months, confidence, factors));
        }

        let cache_key = (series.id.clone(), series.fingerprint());
        if !self.cache.contains_key(&cache_key) {
            // A changed history supersedes anything cached for this series
            self.invalidate(&series.id);
        }

        let mut entry = self.cache.entry(cache_key).or_insert_with(|| CachedModel {
            model: Arc::new(self.fit(series)),
            projections: HashMap::new(),
        });
        if let Some(cached) = entry.projections.get(&key) {
            debug!("Forecast cache hit for {}", series.id);
            return Ok(cached.clone());
        }

        let model = Arc::clone(&entry.model);
        let result = self.build_result(series, &model, horizon_months, confidence, factors);
        entry.projections.insert(key, result.clone());
        Ok(result)
    }

    /// Fit on all but the last `holdout` points and score the held-out tail
    pub fn backtest(&self, series: &TimeSeries, holdout: usize) -> CostAnalyticsResult<BacktestReport> {
        let required = self.config.min_history_points + holdout.max(1);
        self.ensure_history(series, required)?;

        let values = series.values();
        let train_size = values.len() - holdout;
        let model = FittedModel::fit(
            &values[..train_size],
            series.id.granularity,
            self.config.stable_growth_threshold,
        );
        let predictions = model.project_values(holdout, &ForecastFactors::none());
        let actuals = values[train_size..].to_vec();

        Ok(BacktestReport {
            series_id: series.id.clone(),
            train_size,
            test_size: holdout,
            metrics: AccuracyMetrics {
                mae: mean_absolute_error(&predictions, &actuals),
                rmse: root_mean_squared_error(&predictions, &actuals),
                mape: mean_absolute_percentage_error(&predictions, &actuals),
            },
            predictions,
            actuals,
        })
    }

    /// Drop cached models for a series
    pub fn invalidate(&self, series_id: &SeriesId) {
        self.cache.retain(|(id, _), _| id != series_id);
    }

    /// Number of cached series histories
    pub fn cached_models(&self) -> usize {
        self.cache.len()
    }

    fn ensure_history(&self, series: &TimeSeries, required: usize) -> CostAnalyticsResult<()> {
        if series.len() < required {
            return Err(CostAnalyticsError::InsufficientData {
                series_id: series.id.to_string(),
                required,
                available: series.len(),
            });
        }
        Ok(())
    }

    fn fit(&self, series: &TimeSeries) -> FittedModel {
        debug!("Fitting forecast model for {} ({} points)", series.id, series.len());
        FittedModel::fit(
            &series.values(),
            series.id.granularity,
            self.config.stable_growth_threshold,
        )
    }

    fn build_result(
        &self,
        series: &TimeSeries,
        model: &FittedModel,
        horizon_months: u32,
        confidence: f64,
        factors: &ForecastFactors,
    ) -> ForecastResult {
        let steps = horizon_months as usize * series.id.granularity.steps_per_month();
        let points = match series.last() {
            Some(last) => model.project(last.timestamp, steps, confidence, factors),
            None => Vec::new(),
        };

        let id_source = format!(
            "{}|{:016x}|{}|{}|{:?}",
            series.id,
            series.fingerprint(),
            horizon_months,
            confidence,
            factors.cache_key()
        );

        ForecastResult {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, id_source.as_bytes()),
            series_id: series.id.clone(),
            series_version: series.version(),
            model_id: model.model_id.to_string(),
            horizon_months,
            confidence,
            points,
            goodness_of_fit: model.goodness_of_fit,
            insufficient_history: model.insufficient_history(),
            decomposition: model.decomposition.clone(),
            trend: model.trend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::types::FactorAdjustment;
    use crate::series::{Dimensions, Granularity, MetricKind, SeriesPoint};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn daily_series(values: &[f64]) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::observed(start + Duration::days(i as i64), *v))
            .collect();
        TimeSeries::from_points(
            SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily),
            Dimensions::default(),
            points,
        )
        .unwrap()
    }

    fn engine() -> ForecastEngine {
        ForecastEngine::new(ForecastConfig::default()).unwrap()
    }

    #[test]
    fn test_insufficient_history_is_an_error() {
        let series = daily_series(&[1.0, 2.0]);
        let result = engine().forecast(&series, 1, 0.95, &ForecastFactors::none());
        assert!(matches!(
            result,
            Err(CostAnalyticsError::InsufficientData {
                required: 3,
                available: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_horizon_and_confidence() {
        let series = daily_series(&[1.0, 2.0, 3.0]);
        let engine = engine();
        assert!(engine.forecast(&series, 0, 0.95, &ForecastFactors::none()).is_err());
        assert!(engine.forecast(&series, 13, 0.95, &ForecastFactors::none()).is_err());
        assert!(engine.forecast(&series, 1, 1.0, &ForecastFactors::none()).is_err());
        assert!(engine.forecast(&series, 1, 0.0, &ForecastFactors::none()).is_err());
    }

    #[test]
    fn test_short_series_flags_missing_seasonality() {
        let series = daily_series(&[10.0, 11.0, 12.0, 13.0]);
        let result = engine().forecast(&series, 1, 0.95, &ForecastFactors::none()).unwrap();
        assert!(result.insufficient_history);
        assert!(result.decomposition.is_none());
        assert_eq!(result.points.len(), 30);
        assert_eq!(
            result.points[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_bounds_invariant_holds() {
        let values: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i % 7) as f64 * 3.0 - i as f64 * 0.5 + if i % 5 == 0 { 8.0 } else { 0.0 })
            .collect();
        let result = engine()
            .forecast(&daily_series(&values), 12, 0.9, &ForecastFactors::none())
            .unwrap();
        assert_eq!(result.points.len(), 360);
        assert!(!result.insufficient_history);
        assert!((0.0..=1.0).contains(&result.goodness_of_fit));
        for p in &result.points {
            assert!(p.lower_bound <= p.point_estimate);
            assert!(p.point_estimate <= p.upper_bound);
            assert!(p.lower_bound >= 0.0);
        }
    }

    #[test]
    fn test_cache_reuses_projection_and_invalidates_on_append() {
        let engine = engine();
        let mut series = daily_series(&[10.0, 12.0, 14.0, 16.0]);
        let first = engine.forecast(&series, 1, 0.95, &ForecastFactors::none()).unwrap();
        let again = engine.forecast(&series, 1, 0.95, &ForecastFactors::none()).unwrap();
        assert_eq!(first, again);
        assert_eq!(engine.cached_models(), 1);

        let next = series.last().unwrap().timestamp + Duration::days(1);
        series.append(SeriesPoint::observed(next, 40.0)).unwrap();
        let updated = engine.forecast(&series, 1, 0.95, &ForecastFactors::none()).unwrap();
        assert_ne!(first.id, updated.id);
        assert_eq!(updated.series_version, series.version());
        assert_eq!(engine.cached_models(), 1);
    }

    #[test]
    fn test_rebuilt_series_with_same_length_is_refit() {
        let engine = engine();
        let low = engine
            .forecast(&daily_series(&[10.0; 10]), 1, 0.95, &ForecastFactors::none())
            .unwrap();
        let high_series = daily_series(&[1000.0; 10]);
        let high = engine
            .forecast(&high_series, 1, 0.95, &ForecastFactors::none())
            .unwrap();

        assert_relative_eq!(low.points[0].point_estimate, 10.0, epsilon = 1e-6);
        assert_relative_eq!(high.points[0].point_estimate, 1000.0, epsilon = 1e-6);
        assert_ne!(low.id, high.id);
        assert_eq!(engine.cached_models(), 1);

        let fresh = ForecastEngine::new(ForecastConfig::default())
            .unwrap()
            .forecast(&high_series, 1, 0.95, &ForecastFactors::none())
            .unwrap();
        assert_eq!(high, fresh);
    }

    #[test]
    fn test_factors_change_projection() {
        let engine = engine();
        let series = daily_series(&[100.0, 100.0, 100.0, 100.0]);
        let plain = engine.forecast(&series, 1, 0.95, &ForecastFactors::none()).unwrap();
        let grown = engine
            .forecast(
                &series,
                1,
                0.95,
                &ForecastFactors::none().with(FactorAdjustment::Multiplicative {
                    growth_per_month: 0.3,
                }),
            )
            .unwrap();
        assert!(grown.points[29].point_estimate > plain.points[29].point_estimate);
        assert_ne!(plain.id, grown.id);
    }

    #[test]
    fn test_backtest_on_linear_series() {
        let values: Vec<f64> = (0..20).map(|i| 50.0 + i as f64).collect();
        let report = engine().backtest(&daily_series(&values), 5).unwrap();
        assert_eq!(report.train_size, 15);
        assert_eq!(report.test_size, 5);
        assert!(report.metrics.mae < 1e-6);
        assert!(report.metrics.mape < 1e-6);
    }

    #[test]
    fn test_backtest_requires_training_points() {
        let series = daily_series(&[1.0, 2.0, 3.0, 4.0]);
        assert!(engine().backtest(&series, 2).is_err());
    }
}
