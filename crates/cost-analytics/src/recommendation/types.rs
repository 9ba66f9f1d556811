//! Recommendation types

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use super::pricing::{PaymentOption, ReservedTerm, StorageTier, TrafficClass};
use crate::omission::Omission;
use crate::series::SeriesId;

/// Kind of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    /// Remove an idle or unused resource
    Decommission,
    /// Move to the next-smaller size tier
    RightSize,
    /// Move data to a cheaper storage tier
    StorageTier,
    /// Purchase a reserved-capacity commitment
    ReservedCapacity,
    /// Reserve bandwidth or move traffic in-region
    Bandwidth,
}

impl RecommendationType {
    /// Global priority; lower ranks first when everything else ties
    pub fn priority(&self) -> u8 {
        match self {
            RecommendationType::Decommission => 0,
            RecommendationType::RightSize => 1,
            RecommendationType::StorageTier => 2,
            RecommendationType::ReservedCapacity => 3,
            RecommendationType::Bandwidth => 4,
        }
    }

    /// Recommendations in the same group are mutually exclusive for one resource
    pub fn conflict_group(&self) -> ConflictGroup {
        match self {
            RecommendationType::Decommission
            | RecommendationType::RightSize
            | RecommendationType::StorageTier
            | RecommendationType::ReservedCapacity => ConflictGroup::Capacity,
            RecommendationType::Bandwidth => ConflictGroup::Network,
        }
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecommendationType::Decommission => "decommission",
            RecommendationType::RightSize => "right_size",
            RecommendationType::StorageTier => "storage_tier",
            RecommendationType::ReservedCapacity => "reserved_capacity",
            RecommendationType::Bandwidth => "bandwidth",
        };
        f.write_str(name)
    }
}

/// Mutually exclusive recommendation groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConflictGroup {
    /// Changes to what is provisioned or committed
    Capacity,
    /// Changes to how traffic is billed or routed
    Network,
}

/// Implementation risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Reversible with no expected service impact
    Low,
    /// Reversible, with some chance of user impact
    Medium,
    /// Likely to affect users if the evidence is wrong
    High,
}

impl RiskLevel {
    /// Risk from a utilization peak relative to its threshold
    pub fn from_peak(peak: f64, threshold: f64) -> Self {
        if peak < threshold {
            RiskLevel::Low
        } else if peak < 2.0 * threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// What to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecommendationAction {
    /// Move to a smaller size tier
    Resize {
        /// Size tier in use
        current_tier: String,
        /// Next smaller tier
        target_tier: String,
    },
    /// Remove the resource
    Decommission,
    /// Move stored data to another tier
    ChangeStorageTier {
        /// Tier in use
        current_tier: StorageTier,
        /// Colder tier to move to
        target_tier: StorageTier,
        /// Average stored volume
        stored_gb: f64,
    },
    /// Buy a reserved-capacity commitment
    PurchaseReservation {
        /// Reservation term
        term: ReservedTerm,
        /// Payment option
        payment: PaymentOption,
        /// Committed instances (fractional commitments allowed)
        commitment_quantity: f64,
        /// Amount due at purchase
        upfront_cost: f64,
        /// Upfront plus recurring charges over the term
        total_commitment: f64,
        /// Months until savings cover the upfront payment
        break_even_months: f64,
    },
    /// Commit to a monthly bandwidth volume
    ReserveBandwidth {
        /// Traffic class covered
        traffic: TrafficClass,
        /// Volume included in the commitment
        committed_gb: f64,
        /// Observed monthly volume
        monthly_volume_gb: f64,
    },
    /// Move the traffic's consumers into the same region
    CoLocate {
        /// Observed monthly cross-region volume
        monthly_volume_gb: f64,
    },
}

/// What a recommendation was derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Series the analysis read
    pub series_ids: Vec<SeriesId>,
    /// Anomalies on those series
    pub anomaly_ids: Vec<Uuid>,
    /// Forecast consulted, if any
    pub forecast_id: Option<Uuid>,
    /// Violated or at-risk policies covering the resource
    pub policy_ids: Vec<String>,
}

/// Savings-scored optimization suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Target resource
    pub resource_id: String,
    /// Recommendation kind
    pub recommendation_type: RecommendationType,
    /// Estimated monthly savings, never negative
    pub estimated_monthly_savings: f64,
    /// Currency of the savings
    pub currency: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Implementation risk
    pub risk: RiskLevel,
    /// Inputs behind the recommendation
    pub evidence: Evidence,
    /// Concrete change to make
    pub action: RecommendationAction,
    /// Human-readable explanation
    pub rationale: String,
    /// Ordered steps to apply the change
    pub implementation_steps: Vec<String>,
}

impl Recommendation {
    /// Identity key
    pub fn identity(&self) -> (&str, RecommendationType) {
        (&self.resource_id, self.recommendation_type)
    }

    /// Conflict preference: higher savings, then lower risk, then type priority
    pub fn preference(&self, other: &Self) -> Ordering {
        other
            .estimated_monthly_savings
            .total_cmp(&self.estimated_monthly_savings)
            .then_with(|| self.risk.cmp(&other.risk))
            .then_with(|| {
                self.recommendation_type
                    .priority()
                    .cmp(&other.recommendation_type.priority())
            })
    }
}

/// Recommendations plus everything that could not be evaluated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOutput {
    /// Recommendations produced
    pub recommendations: Vec<Recommendation>,
    /// Analyses that could not run
    pub omissions: Vec<Omission>,
}

impl RecommendationOutput {
    /// Merge another output into this one
    pub fn merge(&mut self, other: RecommendationOutput) {
        self.recommendations.extend(other.recommendations);
        self.omissions.extend(other.omissions);
    }
}
