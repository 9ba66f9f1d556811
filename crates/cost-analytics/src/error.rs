//! Cost analytics error types

use thiserror::Error;

use crate::omission::ReasonCode;

/// Cost analytics error types
#[derive(Debug, Error)]
pub enum CostAnalyticsError {
    /// Raw record could not be normalized
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Position in the input batch
        index: usize,
        /// What was wrong with the record
        reason: String,
    },

    /// Not enough history to compute a result
    #[error("Insufficient data for {series_id}: required {required} points, available {available}")]
    InsufficientData {
        /// Series lacking history
        series_id: String,
        /// Points needed
        required: usize,
        /// Points present
        available: usize,
    },

    /// Series mutation or construction violated ordering
    #[error("Invalid series {series_id}: {reason}")]
    InvalidSeries {
        /// Offending series
        series_id: String,
        /// Violated constraint
        reason: String,
    },

    /// Policy definition is malformed
    #[error("Invalid policy {policy_id}: {reason}")]
    InvalidPolicy {
        /// Rejected policy
        policy_id: String,
        /// Validation failure
        reason: String,
    },

    /// Pricing lookup failed
    #[error("Pricing data unavailable for {resource_type} in {region}")]
    PricingUnavailable {
        /// Pricing family or size tier looked up
        resource_type: String,
        /// Region looked up
        region: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    ConfigurationError {
        /// Offending setting
        message: String,
    },

    /// Metrics collection failed
    #[error("Metrics collection failed: {message}")]
    MetricsError {
        /// Registry or instrument failure
        message: String,
    },

    /// Cost calculation error
    #[error("Cost calculation error: {details}")]
    CalculationError {
        /// Failed computation
        details: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying serde_json error
        #[from]
        source: serde_json::Error,
    },
}

impl CostAnalyticsError {
    /// Reason code recorded when this error causes an item to be skipped
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            CostAnalyticsError::MalformedRecord { .. } | CostAnalyticsError::JsonError { .. } => {
                ReasonCode::MalformedRecord
            }
            CostAnalyticsError::InsufficientData { .. } => ReasonCode::InsufficientData,
            CostAnalyticsError::InvalidSeries { .. } => ReasonCode::DiscontinuousSeries,
            CostAnalyticsError::InvalidPolicy { .. } => ReasonCode::InvalidPolicy,
            CostAnalyticsError::PricingUnavailable { .. } => ReasonCode::MissingPricing,
            CostAnalyticsError::ConfigurationError { .. }
            | CostAnalyticsError::MetricsError { .. }
            | CostAnalyticsError::CalculationError { .. } => ReasonCode::CalculationFailed,
        }
    }
}

/// Cost analytics result type
pub type CostAnalyticsResult<T> = Result<T, CostAnalyticsError>;
