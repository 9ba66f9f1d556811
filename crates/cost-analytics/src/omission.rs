//! Omission records: every record, series or plan skipped during a run is reported here
//! with a machine-readable reason.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CostAnalyticsError;

/// Why an item was left out of the results
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Raw record missing identity/timestamp or carrying an unparsable value or unit
    MalformedRecord,
    /// Series too short for the requested computation
    InsufficientData,
    /// Series had gaps under the `Drop` gap policy
    DiscontinuousSeries,
    /// No reserved-capacity plan satisfied the constraints
    InfeasiblePlan,
    /// Pricing table or resource metadata had no entry
    MissingPricing,
    /// Policy definition rejected
    InvalidPolicy,
    /// Run was cancelled before the item was processed
    Cancelled,
    /// Internal numeric or task failure
    CalculationFailed,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ReasonCode::MalformedRecord => "malformed_record",
            ReasonCode::InsufficientData => "insufficient_data",
            ReasonCode::DiscontinuousSeries => "discontinuous_series",
            ReasonCode::InfeasiblePlan => "infeasible_plan",
            ReasonCode::MissingPricing => "missing_pricing",
            ReasonCode::InvalidPolicy => "invalid_policy",
            ReasonCode::Cancelled => "cancelled",
            ReasonCode::CalculationFailed => "calculation_failed",
        };
        f.write_str(code)
    }
}

/// A skipped item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Omission {
    /// What was skipped: a record index, series id, resource id or policy id
    pub scope: String,
    /// Reason code
    pub reason: ReasonCode,
    /// Human-readable detail
    pub detail: String,
}

impl Omission {
    /// Create a new omission
    pub fn new(scope: impl Into<String>, reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            reason,
            detail: detail.into(),
        }
    }

    /// Build an omission from the error that caused it
    pub fn from_error(scope: impl Into<String>, error: &CostAnalyticsError) -> Self {
        Self::new(scope, error.reason_code(), error.to_string())
    }
}
