//! Policy evaluation: budget compliance and tag compliance

mod budget;
mod evaluator;
mod tags;
mod types;

pub use budget::{BudgetPolicy, BudgetScope};
pub use evaluator::PolicyEvaluator;
pub use tags::{TagMatcher, TagPolicy, TagRule};
pub use types::{
    BudgetDetails, InvalidPolicyReport, Policy, PolicyDetails, PolicyEvaluation, PolicyKind,
    PolicyResult, PolicyStatus, TagDetails, TagViolation, TagViolationReason,
};
