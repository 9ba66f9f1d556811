//! Pipeline metrics

use parking_lot::RwLock;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::report::AnalysisReport;
use crate::error::{CostAnalyticsError, CostAnalyticsResult};

/// Cumulative pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Completed runs
    pub runs: u64,
    /// Raw records received
    pub records_ingested: u64,
    /// Records skipped as malformed
    pub malformed_records: u64,
    /// Series produced by normalization
    pub series_analyzed: u64,
    /// Anomaly flags raised
    pub anomalies_detected: u64,
    /// Ranked recommendations returned
    pub recommendations_emitted: u64,
    /// Omissions reported
    pub omissions: u64,
}

impl PipelineStats {
    /// Share of ingested records that were malformed
    pub fn malformed_rate(&self) -> f64 {
        if self.records_ingested == 0 {
            0.0
        } else {
            self.malformed_records as f64 / self.records_ingested as f64
        }
    }
}

fn metrics_error(e: prometheus::Error) -> CostAnalyticsError {
    CostAnalyticsError::MetricsError {
        message: e.to_string(),
    }
}

/// Prometheus instruments on a private registry
pub(crate) struct PipelineMetrics {
    registry: Registry,
    runs: IntCounter,
    records: IntCounter,
    malformed: IntCounter,
    series: IntCounter,
    anomalies: IntCounter,
    recommendations: IntCounter,
    omissions: IntCounter,
    run_duration: Histogram,
    stats: RwLock<PipelineStats>,
}

impl PipelineMetrics {
    pub(crate) fn new() -> CostAnalyticsResult<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> CostAnalyticsResult<IntCounter> {
            let counter = IntCounter::new(name, help).map_err(metrics_error)?;
            registry.register(Box::new(counter.clone())).map_err(metrics_error)?;
            Ok(counter)
        };

        let runs = counter("cost_analytics_runs_total", "Completed analysis runs")?;
        let records = counter("cost_analytics_records_total", "Raw records ingested")?;
        let malformed = counter("cost_analytics_malformed_records_total", "Records skipped as malformed")?;
        let series = counter("cost_analytics_series_total", "Series analyzed")?;
        let anomalies = counter("cost_analytics_anomalies_total", "Anomaly flags raised")?;
        let recommendations = counter("cost_analytics_recommendations_total", "Recommendations emitted")?;
        let omissions = counter("cost_analytics_omissions_total", "Items omitted from results")?;

        let run_duration = Histogram::with_opts(HistogramOpts::new(
            "cost_analytics_run_duration_seconds",
            "Analysis run duration in seconds",
        ))
        .map_err(metrics_error)?;
        registry
            .register(Box::new(run_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            runs,
            records,
            malformed,
            series,
            anomalies,
            recommendations,
            omissions,
            run_duration,
            stats: RwLock::new(PipelineStats::default()),
        })
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn record_run(&self, records: usize, report: &AnalysisReport, elapsed: Duration) {
        let counts = [
            (&self.records, records),
            (&self.malformed, report.malformed_records),
            (&self.series, report.series_count),
            (&self.anomalies, report.anomalies.len()),
            (&self.recommendations, report.recommendations.len()),
            (&self.omissions, report.omissions.len()),
        ];
        for (counter, count) in counts {
            counter.inc_by(count as u64);
        }
        self.runs.inc();
        self.run_duration.observe(elapsed.as_secs_f64());

        let mut stats = self.stats.write();
        stats.runs += 1;
        stats.records_ingested += records as u64;
        stats.malformed_records += report.malformed_records as u64;
        stats.series_analyzed += report.series_count as u64;
        stats.anomalies_detected += report.anomalies.len() as u64;
        stats.recommendations_emitted += report.recommendations.len() as u64;
        stats.omissions += report.omissions.len() as u64;
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register() {
        let metrics = PipelineMetrics::new().unwrap();
        let families = metrics.registry().gather();
        assert_eq!(families.len(), 8);
        assert_eq!(metrics.snapshot(), PipelineStats::default());
    }

    #[test]
    fn test_record_run_accumulates() {
        let metrics = PipelineMetrics::new().unwrap();
        let report = AnalysisReport {
            malformed_records: 2,
            series_count: 3,
            ..Default::default()
        };
        metrics.record_run(10, &report, Duration::from_millis(5));
        metrics.record_run(10, &report, Duration::from_millis(5));

        let stats = metrics.snapshot();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.records_ingested, 20);
        assert_eq!(stats.series_analyzed, 6);
        assert!((stats.malformed_rate() - 0.2).abs() < 1e-12);
        assert_eq!(metrics.runs.get(), 2);
    }
}
