//! Pipeline input and output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anomaly::{AnomalyFlag, DetectionMethod, Sensitivity};
use crate::forecast::{ForecastFactors, ForecastResult};
use crate::normalizer::{GapPolicy, RawUsageRecord};
use crate::omission::{Omission, ReasonCode};
use crate::policy::{InvalidPolicyReport, Policy, PolicyResult};
use crate::recommendation::{Recommendation, ResourceMetadata};

/// One analysis run's inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Raw provider records
    pub records: Vec<RawUsageRecord>,
    /// Gap handling during normalization
    #[serde(default)]
    pub gap_policy: GapPolicy,
    /// Budget and tag policies
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Inventory facts used for pricing
    #[serde(default)]
    pub metadata: Vec<ResourceMetadata>,
    /// Anomaly baseline
    #[serde(default = "default_method")]
    pub detection_method: DetectionMethod,
    /// Anomaly sensitivity
    #[serde(default = "default_sensitivity")]
    pub sensitivity: Sensitivity,
    /// Adjustments applied to every forecast
    #[serde(default)]
    pub forecast_factors: ForecastFactors,
}

fn default_method() -> DetectionMethod {
    DetectionMethod::Statistical
}

fn default_sensitivity() -> Sensitivity {
    Sensitivity::Medium
}

impl AnalysisRequest {
    /// Request over `records` with default options
    pub fn new(records: Vec<RawUsageRecord>) -> Self {
        Self {
            records,
            gap_policy: GapPolicy::default(),
            policies: Vec::new(),
            metadata: Vec::new(),
            detection_method: default_method(),
            sensitivity: default_sensitivity(),
            forecast_factors: ForecastFactors::none(),
        }
    }

    /// Set the gap policy
    pub fn with_gap_policy(mut self, gap_policy: GapPolicy) -> Self {
        self.gap_policy = gap_policy;
        self
    }

    /// Set the policies
    pub fn with_policies(mut self, policies: Vec<Policy>) -> Self {
        self.policies = policies;
        self
    }

    /// Set the resource metadata
    pub fn with_metadata(mut self, metadata: Vec<ResourceMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the detection method and sensitivity
    pub fn with_detection(mut self, method: DetectionMethod, sensitivity: Sensitivity) -> Self {
        self.detection_method = method;
        self.sensitivity = sensitivity;
        self
    }

    /// Set the forecast factors
    pub fn with_forecast_factors(mut self, factors: ForecastFactors) -> Self {
        self.forecast_factors = factors;
        self
    }
}

/// Everything one analysis run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Run identifier
    pub run_id: Uuid,
    /// Completion time
    pub generated_at: DateTime<Utc>,
    /// Continuous series forecast and scanned; gapped series reach policies only
    pub series_count: usize,
    /// Ranked recommendations
    pub recommendations: Vec<Recommendation>,
    /// Results of valid policies
    pub policy_results: Vec<PolicyResult>,
    /// Policies rejected as malformed
    pub policy_errors: Vec<InvalidPolicyReport>,
    /// Anomaly flags ordered by series then time
    pub anomalies: Vec<AnomalyFlag>,
    /// Forecasts ordered by series
    pub forecasts: Vec<ForecastResult>,
    /// Every skipped record, series, resource or plan
    pub omissions: Vec<Omission>,
    /// Count of malformed records
    pub malformed_records: usize,
}

impl AnalysisReport {
    /// Sum of estimated monthly savings across recommendations
    pub fn total_monthly_savings(&self) -> f64 {
        self.recommendations
            .iter()
            .map(|r| r.estimated_monthly_savings)
            .sum()
    }

    /// Omissions with a given reason
    pub fn omissions_with(&self, reason: ReasonCode) -> impl Iterator<Item = &Omission> {
        self.omissions.iter().filter(move |o| o.reason == reason)
    }

    /// Policy results needing attention
    pub fn policies_needing_attention(&self) -> impl Iterator<Item = &PolicyResult> {
        self.policy_results.iter().filter(|r| r.needs_attention())
    }
}
