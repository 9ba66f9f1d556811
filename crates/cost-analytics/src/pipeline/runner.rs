//! Analysis pipeline
//!
//! Normalizes a batch, then forecasts and scans every series in bounded
//! parallel tasks, evaluates policies, and derives per-resource
//! recommendations in a second bounded fan-out. Task results are collected in
//! issue order, which follows series and resource id order, so reports do not
//! depend on completion order.

use parking_lot::RwLock;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::metrics::{PipelineMetrics, PipelineStats};
use super::report::{AnalysisReport, AnalysisRequest};
use crate::anomaly::{AnomalyDetector, AnomalyFlag};
use crate::config::AnalyticsConfig;
use crate::error::CostAnalyticsResult;
use crate::forecast::{ForecastEngine, ForecastResult};
use crate::normalizer::Normalizer;
use crate::omission::{Omission, ReasonCode};
use crate::policy::PolicyEvaluator;
use crate::ranking::rank;
use crate::recommendation::{PricingCatalog, Recommendation, RecommendationEngine, ResourceBundle};
use crate::series::TimeSeries;

struct SeriesStage {
    forecasts: Vec<ForecastResult>,
    anomalies: Vec<AnomalyFlag>,
    omissions: Vec<Omission>,
}

/// End-to-end analytics run
pub struct AnalysisPipeline {
    config: Arc<AnalyticsConfig>,
    normalizer: Normalizer,
    forecast: Arc<ForecastEngine>,
    detector: Arc<AnomalyDetector>,
    policies: PolicyEvaluator,
    recommender: Arc<RecommendationEngine>,
    metrics: PipelineMetrics,
    shutdown: Arc<RwLock<bool>>,
}

impl AnalysisPipeline {
    /// Create a pipeline; fails only on invalid configuration
    pub fn new(config: AnalyticsConfig, pricing: Arc<dyn PricingCatalog>) -> CostAnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.normalizer.clone())?,
            forecast: Arc::new(ForecastEngine::new(config.forecast.clone())?),
            detector: Arc::new(AnomalyDetector::new(config.anomaly.clone())?),
            policies: PolicyEvaluator::new(),
            recommender: Arc::new(RecommendationEngine::new(config.recommendation.clone(), pricing)?),
            metrics: PipelineMetrics::new()?,
            shutdown: Arc::new(RwLock::new(false)),
            config: Arc::new(config),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Forecast engine, shared across runs so its model cache persists
    pub fn forecast_engine(&self) -> &ForecastEngine {
        &self.forecast
    }

    /// Stop issuing new tasks; unissued work is reported as cancelled
    pub fn cancel(&self) {
        info!("Cancelling analysis pipeline");
        *self.shutdown.write() = true;
    }

    /// Clear a previous cancellation
    pub fn resume(&self) {
        *self.shutdown.write() = false;
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.read()
    }

    /// Cumulative run statistics
    pub fn stats(&self) -> PipelineStats {
        self.metrics.snapshot()
    }

    /// Prometheus registry holding the pipeline instruments
    pub fn registry(&self) -> &Registry {
        self.metrics.registry()
    }

    /// Run the full analysis over one batch
    pub async fn run(&self, request: AnalysisRequest) -> CostAnalyticsResult<AnalysisReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        info!("Starting analysis run {} over {} records", run_id, request.records.len());

        let normalized = self.normalizer.normalize(&request.records, request.gap_policy);
        let mut omissions = normalized.omissions;
        let series = normalized.series;

        let stage = self.analyze_series(&series, &request).await;
        omissions.extend(stage.omissions);

        // Spend totals and tag checks do not need continuity, so gapped series count here
        let mut policy_series: Vec<TimeSeries> = series.iter().cloned().chain(normalized.discontinuous).collect();
        policy_series.sort_by(|a, b| a.id.cmp(&b.id));
        let evaluation = self.policies.evaluate(&policy_series, &stage.forecasts, &request.policies);
        omissions.extend(
            evaluation
                .errors
                .iter()
                .map(|e| Omission::new(e.policy_id.clone(), ReasonCode::InvalidPolicy, e.reason.clone())),
        );

        let bundles = RecommendationEngine::bundles(
            &series,
            &stage.forecasts,
            &stage.anomalies,
            &evaluation.results,
            &request.metadata,
        );
        let (recommendations, recommendation_omissions) = self.recommend(bundles).await;
        omissions.extend(recommendation_omissions);
        omissions.sort();

        let report = AnalysisReport {
            run_id,
            generated_at: chrono::Utc::now(),
            series_count: series.len(),
            recommendations: rank(recommendations, &self.config.ranking),
            policy_results: evaluation.results,
            policy_errors: evaluation.errors,
            anomalies: stage.anomalies,
            forecasts: stage.forecasts,
            omissions,
            malformed_records: normalized.malformed_count,
        };
        self.metrics.record_run(request.records.len(), &report, started.elapsed());
        info!(
            "Run {} finished in {:?}: {} series, {} recommendations, {} omissions",
            run_id,
            started.elapsed(),
            report.series_count,
            report.recommendations.len(),
            report.omissions.len()
        );
        Ok(report)
    }

    /// Acquire a task permit unless the run was cancelled
    async fn issue_permit(&self, semaphore: &Arc<Semaphore>, scope: &str) -> Result<OwnedSemaphorePermit, Omission> {
        if self.is_cancelled() {
            return Err(Omission::new(scope, ReasonCode::Cancelled, "run cancelled before the task was issued"));
        }
        semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Omission::new(scope, ReasonCode::CalculationFailed, e.to_string()))
    }

    async fn analyze_series(&self, series: &[TimeSeries], request: &AnalysisRequest) -> SeriesStage {
        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.max_concurrency));
        let months = self.config.pipeline.forecast_months;
        let confidence = self.config.pipeline.confidence;
        let mut omissions = Vec::new();
        let mut handles = Vec::with_capacity(series.len());

        for s in series {
            let scope = s.id.to_string();
            let permit = match self.issue_permit(&semaphore, &scope).await {
                Ok(permit) => permit,
                Err(omission) => {
                    omissions.push(omission);
                    continue;
                }
            };
            let engine = self.forecast.clone();
            let detector = self.detector.clone();
            let owned = s.clone();
            let factors = request.forecast_factors.clone();
            let (method, sensitivity) = (request.detection_method, request.sensitivity);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let forecast = engine.forecast(&owned, months, confidence, &factors);
                let flags = detector.detect(&owned, method, sensitivity);
                (forecast, flags)
            });
            handles.push((scope, handle));
        }
        if self.is_cancelled() {
            warn!("Run cancelled after issuing {} of {} series", handles.len(), series.len());
        }

        let mut forecasts = Vec::with_capacity(handles.len());
        let mut anomalies = Vec::new();
        for (scope, handle) in handles {
            match handle.await {
                Ok((forecast, flags)) => {
                    match forecast {
                        Ok(result) => forecasts.push(result),
                        Err(e) => {
                            debug!("No forecast for {}: {}", scope, e);
                            omissions.push(Omission::from_error(scope, &e));
                        }
                    }
                    anomalies.extend(flags);
                }
                Err(e) => {
                    warn!("Series task for {} failed: {}", scope, e);
                    omissions.push(Omission::new(scope, ReasonCode::CalculationFailed, e.to_string()));
                }
            }
        }
        anomalies.sort_by(|a: &AnomalyFlag, b: &AnomalyFlag| {
            a.series_id
                .cmp(&b.series_id)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
                .then_with(|| a.method.cmp(&b.method))
        });

        SeriesStage {
            forecasts,
            anomalies,
            omissions,
        }
    }

    async fn recommend(&self, bundles: Vec<ResourceBundle>) -> (Vec<Recommendation>, Vec<Omission>) {
        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.max_concurrency));
        let mut omissions = Vec::new();
        let mut handles = Vec::with_capacity(bundles.len());

        for bundle in bundles {
            let scope = bundle.resource_id().to_string();
            let permit = match self.issue_permit(&semaphore, &scope).await {
                Ok(permit) => permit,
                Err(omission) => {
                    omissions.push(omission);
                    continue;
                }
            };
            let engine = self.recommender.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                engine.recommend_resource(&bundle)
            });
            handles.push((scope, handle));
        }

        let mut recommendations = Vec::new();
        for (scope, handle) in handles {
            match handle.await {
                Ok(output) => {
                    recommendations.extend(output.recommendations);
                    omissions.extend(output.omissions);
                }
                Err(e) => {
                    warn!("Recommendation task for {} failed: {}", scope, e);
                    omissions.push(Omission::new(scope, ReasonCode::CalculationFailed, e.to_string()));
                }
            }
        }
        (recommendations, omissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::RawUsageRecord;
    use crate::policy::{BudgetPolicy, BudgetScope, Policy, PolicyDetails, PolicyStatus};
    use crate::recommendation::StaticPricingCatalog;
    use chrono::TimeZone;
    use serde_json::json;

    fn pipeline() -> AnalysisPipeline {
        AnalysisPipeline::new(
            AnalyticsConfig::default(),
            Arc::new(StaticPricingCatalog::new("USD")),
        )
        .unwrap()
    }

    fn cost_records(resource: &str, days: u32) -> Vec<RawUsageRecord> {
        (1..=days)
            .map(|d| {
                RawUsageRecord::from(json!({
                    "resource_id": resource,
                    "timestamp": format!("2024-01-{:02}", d),
                    "cost": 100.0 + d as f64,
                }))
            })
            .collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AnalyticsConfig::default();
        config.pipeline.max_concurrency = 0;
        assert!(AnalysisPipeline::new(config, Arc::new(StaticPricingCatalog::new("USD"))).is_err());
    }

    #[tokio::test]
    async fn test_run_forecasts_every_series() {
        let mut records = cost_records("vm-1", 20);
        records.extend(cost_records("vm-2", 20));
        let report = pipeline().run(AnalysisRequest::new(records)).await.unwrap();

        assert_eq!(report.series_count, 2);
        assert_eq!(report.forecasts.len(), 2);
        assert_eq!(report.forecasts[0].series_id.resource_id, "vm-1");
        assert_eq!(report.malformed_records, 0);
    }

    #[tokio::test]
    async fn test_short_series_reported_as_insufficient() {
        let report = pipeline()
            .run(AnalysisRequest::new(cost_records("vm-1", 2)))
            .await
            .unwrap();
        assert!(report.forecasts.is_empty());
        assert_eq!(report.omissions_with(ReasonCode::InsufficientData).count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_unissued_series() {
        let pipeline = pipeline();
        pipeline.cancel();
        let mut records = cost_records("vm-1", 10);
        records.extend(cost_records("vm-2", 10));
        let report = pipeline.run(AnalysisRequest::new(records)).await.unwrap();

        assert!(report.forecasts.is_empty());
        assert_eq!(report.omissions_with(ReasonCode::Cancelled).count(), 2);

        pipeline.resume();
        let report = pipeline.run(AnalysisRequest::new(cost_records("vm-1", 10))).await.unwrap();
        assert_eq!(report.forecasts.len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_sees_new_history() {
        let pipeline = pipeline();
        let flat = |resource: &str, value: f64| -> Vec<RawUsageRecord> {
            (1..=20)
                .map(|d| {
                    RawUsageRecord::from(json!({
                        "resource_id": resource,
                        "timestamp": format!("2024-01-{:02}", d),
                        "cost": value,
                    }))
                })
                .collect()
        };

        let first = pipeline.run(AnalysisRequest::new(flat("vm-1", 10.0))).await.unwrap();
        let second = pipeline.run(AnalysisRequest::new(flat("vm-1", 500.0))).await.unwrap();

        assert!((first.forecasts[0].points[0].point_estimate - 10.0).abs() < 1e-6);
        assert!((second.forecasts[0].points[0].point_estimate - 500.0).abs() < 1e-6);
        assert_ne!(first.forecasts[0].id, second.forecasts[0].id);
    }

    #[tokio::test]
    async fn test_gapped_series_still_reaches_policies() {
        let records: Vec<RawUsageRecord> = (1..=31)
            .filter(|d| *d != 15)
            .map(|d| {
                RawUsageRecord::from(json!({
                    "resource_id": "vm-1",
                    "timestamp": format!("2024-01-{:02}", d),
                    "cost": 200.0,
                }))
            })
            .collect();
        let budget = Policy::Budget(BudgetPolicy {
            id: "budget-jan".to_string(),
            amount: 5000.0,
            currency: "USD".to_string(),
            thresholds: vec![50.0, 75.0, 90.0, 100.0],
            period_start: None,
            period_end: chrono::Utc.with_ymd_and_hms(2024, 1, 31, 23, 0, 0).unwrap(),
            scope: BudgetScope::Global,
        });

        let report = pipeline()
            .run(AnalysisRequest::new(records).with_policies(vec![budget]))
            .await
            .unwrap();

        assert_eq!(report.series_count, 0);
        assert!(report.forecasts.is_empty());
        assert_eq!(report.omissions_with(ReasonCode::DiscontinuousSeries).count(), 1);
        assert_eq!(report.policy_results[0].status, PolicyStatus::Violated);
        let PolicyDetails::Budget(details) = &report.policy_results[0].details else {
            panic!("expected budget details");
        };
        assert_eq!(details.current_spend, 6000.0);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let pipeline = pipeline();
        let mut records = cost_records("vm-1", 10);
        records.push(RawUsageRecord::from(json!({"timestamp": "2024-01-01", "cost": 1.0})));
        pipeline.run(AnalysisRequest::new(records)).await.unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.records_ingested, 11);
        assert_eq!(stats.malformed_records, 1);
    }
}
