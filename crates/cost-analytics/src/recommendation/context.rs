//! Per-resource inputs gathered for the analyzers

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::pricing::StorageTier;
use super::types::Evidence;
use crate::anomaly::AnomalyFlag;
use crate::forecast::ForecastResult;
use crate::series::{Granularity, MetricKind, SeriesId, TimeSeries, HOURS_PER_MONTH};

/// Average days per billing month
pub const DAYS_PER_MONTH: f64 = HOURS_PER_MONTH / 24.0;

/// Inventory facts about a resource that usage records do not carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// Resource identifier
    pub resource_id: String,
    /// Pricing family, e.g. `vm` or `blob`
    pub resource_type: Option<String>,
    /// Size tier within the family, e.g. `Standard_D4s_v3`
    pub size_tier: Option<String>,
    /// Deployment region
    pub region: Option<String>,
    /// Current storage tier
    pub storage_tier: Option<StorageTier>,
}

impl ResourceMetadata {
    /// Metadata with only an id
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Default::default()
        }
    }

    /// Set the pricing family and size tier
    pub fn with_compute(mut self, resource_type: impl Into<String>, size_tier: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.size_tier = Some(size_tier.into());
        self
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the storage tier
    pub fn with_storage_tier(mut self, tier: StorageTier) -> Self {
        self.storage_tier = Some(tier);
        self
    }
}

/// Everything known about one resource
#[derive(Debug, Clone)]
pub struct ResourceBundle {
    /// Inventory facts
    pub metadata: ResourceMetadata,
    /// Normalized series for the resource, sorted by id
    pub series: Vec<TimeSeries>,
    /// Forecasts of those series
    pub forecasts: Vec<ForecastResult>,
    /// Anomaly flags on those series
    pub anomalies: Vec<AnomalyFlag>,
    /// Violated or at-risk policies covering this resource
    pub policy_ids: Vec<String>,
}

impl ResourceBundle {
    /// Bundle with no series attached yet
    pub fn new(metadata: ResourceMetadata) -> Self {
        Self {
            metadata,
            series: Vec::new(),
            forecasts: Vec::new(),
            anomalies: Vec::new(),
            policy_ids: Vec::new(),
        }
    }

    /// Resource identifier
    pub fn resource_id(&self) -> &str {
        &self.metadata.resource_id
    }

    /// Region from metadata, falling back to the usage dimensions
    pub fn region(&self) -> Option<&str> {
        self.metadata
            .region
            .as_deref()
            .or_else(|| self.series.iter().find_map(|s| s.dimensions.region.as_deref()))
    }

    /// Finest-grained series for a metric
    pub fn series(&self, metric: MetricKind) -> Option<&TimeSeries> {
        self.series
            .iter()
            .filter(|s| s.id.metric == metric)
            .min_by(|a, b| {
                a.id.granularity
                    .hours_per_bucket()
                    .total_cmp(&b.id.granularity.hours_per_bucket())
            })
    }

    /// Forecast of one series, if it was forecast
    pub fn forecast_for(&self, series_id: &SeriesId) -> Option<&ForecastResult> {
        self.forecasts.iter().find(|f| &f.series_id == series_id)
    }

    /// Anomaly flags raised on any of `series`
    pub fn flags_for<'a>(&'a self, series: &'a [&'a TimeSeries]) -> impl Iterator<Item = &'a AnomalyFlag> + 'a {
        self.anomalies
            .iter()
            .filter(move |f| series.iter().any(|s| s.id == f.series_id))
    }

    /// Evidence referencing `series`, their anomaly flags and an optional forecast
    pub fn evidence(&self, series: &[&TimeSeries], forecast: Option<&ForecastResult>) -> Evidence {
        let mut anomaly_ids: Vec<_> = self.flags_for(series).map(|f| f.id).collect();
        anomaly_ids.sort();
        Evidence {
            series_ids: series.iter().map(|s| s.id.clone()).collect(),
            anomaly_ids,
            forecast_id: forecast.map(|f| f.id),
            policy_ids: self.policy_ids.clone(),
        }
    }

    /// Whether any analyzer has input for this resource
    pub fn has_analyzable_series(&self) -> bool {
        self.series.iter().any(|s| {
            matches!(
                s.id.metric,
                MetricKind::CpuUtilization
                    | MetricKind::StorageAccessCount
                    | MetricKind::UsageHours
                    | MetricKind::EgressGb
                    | MetricKind::CrossRegionGb
            )
        })
    }
}

/// One calendar day of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DailyValue {
    pub date: NaiveDate,
    pub mean: f64,
    pub total: f64,
    pub peak: f64,
}

/// Roll a series up to calendar days; `None` for monthly series
pub(crate) fn daily_values(series: &TimeSeries) -> Option<Vec<DailyValue>> {
    if series.id.granularity == Granularity::Monthly {
        return None;
    }
    let mut days: BTreeMap<NaiveDate, (f64, f64, usize)> = BTreeMap::new();
    for point in series.points() {
        let entry = days
            .entry(point.timestamp.date_naive())
            .or_insert((0.0, f64::MIN, 0));
        entry.0 += point.value;
        entry.1 = entry.1.max(point.value);
        entry.2 += 1;
    }
    Some(
        days.into_iter()
            .map(|(date, (total, peak, count))| DailyValue {
                date,
                mean: total / count as f64,
                total,
                peak,
            })
            .collect(),
    )
}

/// Longest suffix of consecutive days satisfying `predicate`
pub(crate) fn trailing_run(days: &[DailyValue], predicate: impl Fn(&DailyValue) -> bool) -> &[DailyValue] {
    let mut start = days.len();
    while start > 0 {
        let day = &days[start - 1];
        if !predicate(day) {
            break;
        }
        if start < days.len() && days[start].date - day.date != Duration::days(1) {
            break;
        }
        start -= 1;
    }
    &days[start..]
}

/// Last `count` days
pub(crate) fn last_days(days: &[DailyValue], count: usize) -> &[DailyValue] {
    &days[days.len().saturating_sub(count)..]
}

/// Mean over a slice of days of `value`
pub(crate) fn mean_of(days: &[DailyValue], value: impl Fn(&DailyValue) -> f64) -> f64 {
    if days.is_empty() {
        return 0.0;
    }
    days.iter().map(value).sum::<f64>() / days.len() as f64
}
