//! Normalizer: heterogeneous provider records into canonical time series
//!
//! Records are aliased onto a common field set, converted to canonical units,
//! bucketed to the configured granularity and checked for gaps. Bad records are
//! skipped and counted; the batch always completes.

mod gaps;
mod schema;
mod units;

pub use gaps::{apply_gap_policy, GapOutcome, GapPolicy};
pub use schema::{field, parse_timestamp, parse_value, CanonicalRecord, RawUsageRecord};
pub use units::to_canonical_value;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{CostAnalyticsError, CostAnalyticsResult};
use crate::omission::{Omission, ReasonCode};
use crate::series::{Dimensions, Granularity, SeriesId, TimeSeries};

/// Normalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Bucket width of produced series
    pub granularity: Granularity,
    /// Currency assumed for cost records that carry none
    pub default_currency: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Daily,
            default_currency: "USD".to_string(),
        }
    }
}

impl NormalizerConfig {
    /// Validate configuration
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        let currency = self.default_currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CostAnalyticsError::ConfigurationError {
                message: format!(
                    "default_currency must be a 3-letter code, got '{}'",
                    self.default_currency
                ),
            });
        }
        Ok(())
    }
}

/// Normalization output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationOutput {
    /// Canonical series sorted by id
    pub series: Vec<TimeSeries>,
    /// Series with gaps under `GapPolicy::Drop`, observed points only, sorted by id.
    /// Usable where continuity is not required, such as spend totals and tag checks.
    pub discontinuous: Vec<TimeSeries>,
    /// Number of records skipped as malformed
    pub malformed_count: usize,
    /// Skipped records and excluded series
    pub omissions: Vec<Omission>,
}

#[derive(Debug)]
struct SeriesAccumulator {
    dimensions: Dimensions,
    buckets: BTreeMap<DateTime<Utc>, (f64, usize)>,
}

/// Record normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    /// Create a new normalizer
    pub fn new(config: NormalizerConfig) -> CostAnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize a batch of raw records
    pub fn normalize(&self, records: &[RawUsageRecord], gap_policy: GapPolicy) -> NormalizationOutput {
        let granularity = self.config.granularity;
        let mut output = NormalizationOutput::default();
        let mut accumulators: BTreeMap<SeriesId, SeriesAccumulator> = BTreeMap::new();

        for (index, raw) in records.iter().enumerate() {
            let record = match CanonicalRecord::from_raw(raw, &self.config.default_currency) {
                Ok(record) => record,
                Err(reason) => {
                    self.skip_record(&mut output, index, reason);
                    continue;
                }
            };

            let id = SeriesId::new(record.resource_id.clone(), record.metric, granularity);
            let accumulator = accumulators.entry(id).or_insert_with(|| SeriesAccumulator {
                dimensions: record.dimensions.clone(),
                buckets: BTreeMap::new(),
            });

            if record.dimensions.currency != accumulator.dimensions.currency {
                let reason = format!(
                    "currency {:?} does not match series currency {:?}",
                    record.dimensions.currency, accumulator.dimensions.currency
                );
                self.skip_record(&mut output, index, reason);
                continue;
            }

            let bucket = accumulator
                .buckets
                .entry(granularity.bucket_start(record.timestamp))
                .or_insert((0.0, 0));
            bucket.0 += record.value;
            bucket.1 += 1;
        }

        for (id, accumulator) in accumulators {
            let additive = id.metric.is_additive();
            let buckets: BTreeMap<DateTime<Utc>, f64> = accumulator
                .buckets
                .into_iter()
                .map(|(ts, (sum, count))| {
                    let value = if additive { sum } else { sum / count as f64 };
                    (ts, value)
                })
                .collect();

            match apply_gap_policy(&buckets, granularity, gap_policy) {
                GapOutcome::Contiguous(points) => {
                    match TimeSeries::from_points(id.clone(), accumulator.dimensions, points) {
                        Ok(series) => output.series.push(series),
                        Err(e) => output.omissions.push(Omission::from_error(id.to_string(), &e)),
                    }
                }
                GapOutcome::Discontinuous { observed, missing } => {
                    debug!("Series {} has {} missing buckets; kept for policy checks only", id, missing);
                    output.omissions.push(Omission::new(
                        id.to_string(),
                        ReasonCode::DiscontinuousSeries,
                        format!("{} missing {} buckets", missing, granularity),
                    ));
                    match TimeSeries::from_points(id.clone(), accumulator.dimensions, observed) {
                        Ok(series) => output.discontinuous.push(series),
                        Err(e) => output.omissions.push(Omission::from_error(id.to_string(), &e)),
                    }
                }
            }
        }

        info!(
            "Normalized {} records into {} series ({} discontinuous, {} malformed)",
            records.len(),
            output.series.len(),
            output.discontinuous.len(),
            output.malformed_count
        );
        output
    }

    fn skip_record(&self, output: &mut NormalizationOutput, index: usize, reason: String) {
        let error = CostAnalyticsError::MalformedRecord { index, reason };
        debug!("Skipping record: {}", error);
        output.malformed_count += 1;
        output
            .omissions
            .push(Omission::from_error(format!("record[{}]", index), &error));
    }
}
