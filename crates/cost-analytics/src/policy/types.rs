//! Policy definitions and evaluation results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::budget::BudgetPolicy;
use super::tags::TagPolicy;

/// A policy definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Policy {
    /// Spend against a budget
    Budget(BudgetPolicy),
    /// Required resource tags
    Tag(TagPolicy),
}

impl Policy {
    /// Policy id
    pub fn id(&self) -> &str {
        match self {
            Policy::Budget(p) => &p.id,
            Policy::Tag(p) => &p.id,
        }
    }

    /// Policy kind
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::Budget(_) => PolicyKind::Budget,
            Policy::Tag(_) => PolicyKind::Tag,
        }
    }
}

/// Policy kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Budget policy
    Budget,
    /// Tag compliance policy
    Tag,
}

/// Compliance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// Within budget and no threshold newly crossed
    Compliant,
    /// Over budget, or resources failing tag rules
    Violated,
    /// Forecast crosses a threshold not yet reached
    AtRisk,
}

/// Supporting values for a budget result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDetails {
    /// Budget currency
    pub currency: String,
    /// Observed spend within the period
    pub current_spend: f64,
    /// Budget amount
    pub budget_amount: f64,
    /// Current spend as a percentage of the amount
    pub utilization_percent: f64,
    /// Current spend plus forecast spend through period end
    pub projected_spend: f64,
    /// Highest threshold reached now or, when at risk, by period end
    pub crossed_threshold: Option<f64>,
    /// When the forecast first reaches a threshold not yet crossed
    pub forecast_breach_date: Option<DateTime<Utc>>,
    /// Days until the remaining amount is spent at the observed daily average;
    /// `None` when nothing has been spent
    pub days_until_depletion: Option<u64>,
}

/// Why a tag rule failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagViolationReason {
    /// Required tag absent
    Missing,
    /// Value outside the allowed set
    NotAllowed,
    /// Value does not match the pattern
    PatternMismatch,
}

/// Failed tag rule on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagViolation {
    /// Offending resource
    pub resource_id: String,
    /// Tag key
    pub tag: String,
    /// Failure reason
    pub reason: TagViolationReason,
}

/// Supporting values for a tag result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDetails {
    /// Distinct resources checked
    pub resources_evaluated: usize,
    /// Number of non-compliant resources
    pub violation_count: usize,
    /// Non-compliant resource ids, sorted
    pub non_compliant_resources: Vec<String>,
    /// Share of compliant resources, 100 when none were evaluated
    pub compliance_percent: f64,
    /// Every failed rule
    pub violations: Vec<TagViolation>,
}

/// Kind-specific result values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyDetails {
    /// Budget result values
    Budget(BudgetDetails),
    /// Tag result values
    Tag(TagDetails),
}

/// Outcome of evaluating one policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    /// Evaluated policy
    pub policy_id: String,
    /// Policy kind
    pub kind: PolicyKind,
    /// Compliance status
    pub status: PolicyStatus,
    /// Resources in scope (budget) or non-compliant (tag)
    pub affected_resources: Vec<String>,
    /// Kind-specific values
    pub details: PolicyDetails,
}

impl PolicyResult {
    /// True for violated or at-risk results
    pub fn needs_attention(&self) -> bool {
        self.status != PolicyStatus::Compliant
    }
}

/// Policy rejected as malformed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidPolicyReport {
    /// Rejected policy
    pub policy_id: String,
    /// Validation failure
    pub reason: String,
}

/// Results for a batch of policies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    /// Results for valid policies, in input order
    pub results: Vec<PolicyResult>,
    /// Policies rejected as malformed
    pub errors: Vec<InvalidPolicyReport>,
}
