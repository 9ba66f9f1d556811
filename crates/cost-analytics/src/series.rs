//! Canonical time series shared by every analytics component

use chrono::{DateTime, Datelike, Duration, DurationRound, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CostAnalyticsError, CostAnalyticsResult};

/// Hours in an average billing month
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Kind of measurement carried by a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Spend in the series currency
    Cost,
    /// CPU utilization percent
    CpuUtilization,
    /// Memory utilization percent
    MemoryUtilization,
    /// Stored data in GB
    StorageUsedGb,
    /// Read/write operations against a storage resource
    StorageAccessCount,
    /// Internet egress in GB
    EgressGb,
    /// Inter-region transfer in GB
    CrossRegionGb,
    /// Runtime hours
    UsageHours,
}

impl MetricKind {
    /// All metric kinds
    pub const ALL: [MetricKind; 8] = [
        MetricKind::Cost,
        MetricKind::CpuUtilization,
        MetricKind::MemoryUtilization,
        MetricKind::StorageUsedGb,
        MetricKind::StorageAccessCount,
        MetricKind::EgressGb,
        MetricKind::CrossRegionGb,
        MetricKind::UsageHours,
    ];

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cost => "cost",
            MetricKind::CpuUtilization => "cpu_utilization",
            MetricKind::MemoryUtilization => "memory_utilization",
            MetricKind::StorageUsedGb => "storage_used_gb",
            MetricKind::StorageAccessCount => "storage_access_count",
            MetricKind::EgressGb => "egress_gb",
            MetricKind::CrossRegionGb => "cross_region_gb",
            MetricKind::UsageHours => "usage_hours",
        }
    }

    /// Resolve a metric name as it appears in raw records
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-', '.'], "_");
        let kind = match normalized.as_str() {
            "cost" | "spend" | "unblendedcost" | "costinbillingcurrency" | "pretaxcost" => {
                MetricKind::Cost
            }
            "cpu" | "cpu_utilization" | "cpu_percent" | "percentage_cpu" => {
                MetricKind::CpuUtilization
            }
            "memory" | "memory_utilization" | "memory_percent" | "available_memory_percent" => {
                MetricKind::MemoryUtilization
            }
            "storage" | "storage_used" | "storage_used_gb" | "used_capacity" => {
                MetricKind::StorageUsedGb
            }
            "storage_access" | "storage_access_count" | "transactions" | "requests" => {
                MetricKind::StorageAccessCount
            }
            "egress" | "egress_gb" | "bandwidth" | "data_transfer_out" => MetricKind::EgressGb,
            "cross_region" | "cross_region_gb" | "inter_region_transfer" => {
                MetricKind::CrossRegionGb
            }
            "usage_hours" | "hours" | "runtime_hours" | "virtual_machines" => {
                MetricKind::UsageHours
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Additive metrics are summed within a bucket, the rest are averaged
    pub fn is_additive(&self) -> bool {
        !matches!(
            self,
            MetricKind::CpuUtilization | MetricKind::MemoryUtilization | MetricKind::StorageUsedGb
        )
    }

    /// Utilization metrics are bounded percentages
    pub fn is_utilization(&self) -> bool {
        matches!(
            self,
            MetricKind::CpuUtilization | MetricKind::MemoryUtilization
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket width of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One point per hour
    Hourly,
    /// One point per day
    Daily,
    /// One point per calendar month
    Monthly,
}

impl Granularity {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }

    /// Start of the bucket containing `timestamp`
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hourly => timestamp
                .duration_trunc(Duration::hours(1))
                .unwrap_or(timestamp),
            Granularity::Daily => Utc.from_utc_datetime(&timestamp.date_naive().and_time(NaiveTime::MIN)),
            Granularity::Monthly => NaiveDate::from_ymd_opt(timestamp.year(), timestamp.month(), 1)
                .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
                .unwrap_or(timestamp),
        }
    }

    /// Start of the bucket following the one starting at `bucket`
    pub fn next(&self, bucket: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hourly => bucket + Duration::hours(1),
            Granularity::Daily => bucket + Duration::days(1),
            Granularity::Monthly => bucket
                .checked_add_months(Months::new(1))
                .unwrap_or(bucket + Duration::days(30)),
        }
    }

    /// Forecast steps per month
    pub fn steps_per_month(&self) -> usize {
        match self {
            Granularity::Hourly => 720,
            Granularity::Daily => 30,
            Granularity::Monthly => 1,
        }
    }

    /// Seasonal cycle length in buckets
    pub fn seasonal_period(&self) -> usize {
        match self {
            Granularity::Hourly => 24,
            Granularity::Daily => 7,
            Granularity::Monthly => 12,
        }
    }

    /// Wall-clock hours covered by one bucket
    pub fn hours_per_bucket(&self) -> f64 {
        match self {
            Granularity::Hourly => 1.0,
            Granularity::Daily => 24.0,
            Granularity::Monthly => HOURS_PER_MONTH,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a canonical series
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesId {
    /// Cloud resource identifier
    pub resource_id: String,
    /// Metric kind
    pub metric: MetricKind,
    /// Bucket width
    pub granularity: Granularity,
}

impl SeriesId {
    /// Create a new series id
    pub fn new(resource_id: impl Into<String>, metric: MetricKind, granularity: Granularity) -> Self {
        Self {
            resource_id: resource_id.into(),
            metric,
            granularity,
        }
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_id, self.metric, self.granularity)
    }
}

/// Single bucketed observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Bucket start
    pub timestamp: DateTime<Utc>,
    /// Value in canonical units
    pub value: f64,
    /// True when the value was synthesized by gap filling
    pub is_estimated: bool,
}

impl SeriesPoint {
    /// Observed point
    pub fn observed(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            is_estimated: false,
        }
    }

    /// Gap-filled point
    pub fn estimated(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            is_estimated: true,
        }
    }
}

/// Dimension tags attached at series level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Resource group / account / project
    pub resource_group: Option<String>,
    /// Region
    pub region: Option<String>,
    /// Service type (e.g. "Virtual Machines", "AmazonS3")
    pub service_type: Option<String>,
    /// Currency of cost series
    pub currency: Option<String>,
    /// Free-form resource tags
    pub tags: BTreeMap<String, String>,
}

impl Dimensions {
    /// Tag value by key
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Ordered series of bucketed points for one resource and metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Series identity
    pub id: SeriesId,
    /// Dimension tags, fixed at creation
    pub dimensions: Dimensions,
    points: Vec<SeriesPoint>,
    version: u64,
}

impl TimeSeries {
    /// Empty series
    pub fn new(id: SeriesId, dimensions: Dimensions) -> Self {
        Self {
            id,
            dimensions,
            points: Vec::new(),
            version: 0,
        }
    }

    /// Build a series from points that must already be strictly increasing in time
    pub fn from_points(
        id: SeriesId,
        dimensions: Dimensions,
        points: Vec<SeriesPoint>,
    ) -> CostAnalyticsResult<Self> {
        let mut series = Self::new(id, dimensions);
        series.extend(points)?;
        Ok(series)
    }

    /// Append a point after the current last point
    pub fn append(&mut self, point: SeriesPoint) -> CostAnalyticsResult<()> {
        if !point.value.is_finite() {
            return Err(CostAnalyticsError::InvalidSeries {
                series_id: self.id.to_string(),
                reason: format!("non-finite value at {}", point.timestamp),
            });
        }
        if let Some(last) = self.points.last() {
            if point.timestamp <= last.timestamp {
                return Err(CostAnalyticsError::InvalidSeries {
                    series_id: self.id.to_string(),
                    reason: format!(
                        "point at {} is not after last point at {}",
                        point.timestamp, last.timestamp
                    ),
                });
            }
        }
        self.points.push(point);
        self.version += 1;
        Ok(())
    }

    /// Append several points in order
    pub fn extend(&mut self, points: impl IntoIterator<Item = SeriesPoint>) -> CostAnalyticsResult<()> {
        for point in points {
            self.append(point)?;
        }
        Ok(())
    }

    /// Points in time order
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Point values in time order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Monotonic version, bumped on every append
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Hash of the full history: timestamps, values and estimation flags.
    ///
    /// Two series with equal fingerprints hold the same points, regardless of how
    /// they were built.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.points.len().hash(&mut hasher);
        for point in &self.points {
            point.timestamp.timestamp_micros().hash(&mut hasher);
            point.value.to_bits().hash(&mut hasher);
            point.is_estimated.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the series has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point
    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    /// Last point
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Fraction of points that were observed rather than gap-filled
    pub fn completeness(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let observed = self.points.iter().filter(|p| !p.is_estimated).count();
        observed as f64 / self.points.len() as f64
    }

    /// Trailing points covering at most `days` days before the last point
    pub fn trailing_days(&self, days: i64) -> &[SeriesPoint] {
        let Some(last) = self.points.last() else {
            return &[];
        };
        let cutoff = last.timestamp - Duration::days(days);
        let start = self.points.partition_point(|p| p.timestamp <= cutoff);
        &self.points[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_metric_kind_aliases() {
        assert_eq!(MetricKind::from_name("CPU Utilization"), Some(MetricKind::CpuUtilization));
        assert_eq!(MetricKind::from_name("egress-gb"), Some(MetricKind::EgressGb));
        assert_eq!(MetricKind::from_name("UnblendedCost"), Some(MetricKind::Cost));
        assert_eq!(MetricKind::from_name("gpu_temperature"), None);
        for kind in MetricKind::ALL {
            assert_eq!(MetricKind::from_name(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_additive_metrics() {
        assert!(MetricKind::Cost.is_additive());
        assert!(MetricKind::EgressGb.is_additive());
        assert!(!MetricKind::CpuUtilization.is_additive());
        assert!(!MetricKind::StorageUsedGb.is_additive());
    }

    #[test]
    fn test_bucket_start() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 13, 47, 12).unwrap();
        assert_eq!(
            Granularity::Hourly.bucket_start(ts),
            Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap()
        );
        assert_eq!(
            Granularity::Daily.bucket_start(ts),
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Granularity::Monthly.bucket_start(ts),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_bucket_handles_month_lengths() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let feb = Granularity::Monthly.next(jan);
        assert_eq!(feb, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(
            Granularity::Monthly.next(feb),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_series_id_display() {
        let id = SeriesId::new("vm-1", MetricKind::CpuUtilization, Granularity::Daily);
        assert_eq!(id.to_string(), "vm-1/cpu_utilization/daily");
    }

    #[test]
    fn test_append_bumps_version() {
        let id = SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily);
        let mut series = TimeSeries::new(id, Dimensions::default());
        assert_eq!(series.version(), 0);
        series.append(SeriesPoint::observed(day(1), 10.0)).unwrap();
        series.append(SeriesPoint::observed(day(2), 12.0)).unwrap();
        assert_eq!(series.version(), 2);
        assert_eq!(series.values(), vec![10.0, 12.0]);
    }

    #[test]
    fn test_fingerprint_tracks_history_not_length() {
        let id = SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily);
        let build = |values: &[f64]| {
            TimeSeries::from_points(
                id.clone(),
                Dimensions::default(),
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| SeriesPoint::observed(day(i as u32 + 1), *v))
                    .collect(),
            )
            .unwrap()
        };
        let a = build(&[10.0, 10.0, 10.0]);
        let b = build(&[10.0, 10.0, 500.0]);
        assert_eq!(a.version(), b.version());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), build(&[10.0, 10.0, 10.0]).fingerprint());

        let mut estimated = build(&[10.0, 10.0]);
        estimated.append(SeriesPoint::estimated(day(3), 10.0)).unwrap();
        assert_ne!(a.fingerprint(), estimated.fingerprint());
    }

    #[test]
    fn test_append_rejects_out_of_order() {
        let id = SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily);
        let mut series = TimeSeries::new(id, Dimensions::default());
        series.append(SeriesPoint::observed(day(2), 10.0)).unwrap();

        let duplicate = series.append(SeriesPoint::observed(day(2), 11.0));
        assert!(matches!(duplicate, Err(CostAnalyticsError::InvalidSeries { .. })));
        let earlier = series.append(SeriesPoint::observed(day(1), 11.0));
        assert!(earlier.is_err());
        assert_eq!(series.len(), 1);
        assert_eq!(series.version(), 1);
    }

    #[test]
    fn test_completeness() {
        let id = SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily);
        let series = TimeSeries::from_points(
            id,
            Dimensions::default(),
            vec![
                SeriesPoint::observed(day(1), 1.0),
                SeriesPoint::estimated(day(2), 0.0),
                SeriesPoint::observed(day(3), 1.0),
                SeriesPoint::observed(day(4), 1.0),
            ],
        )
        .unwrap();
        assert_eq!(series.completeness(), 0.75);
    }

    #[test]
    fn test_trailing_days() {
        let id = SeriesId::new("vm-1", MetricKind::Cost, Granularity::Daily);
        let points = (1..=10).map(|d| SeriesPoint::observed(day(d), d as f64)).collect();
        let series = TimeSeries::from_points(id, Dimensions::default(), points).unwrap();
        let tail = series.trailing_days(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].value, 8.0);
    }
}
