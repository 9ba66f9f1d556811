//! Budget policies: current spend and forecast threshold crossings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::types::{BudgetDetails, PolicyDetails, PolicyKind, PolicyResult, PolicyStatus};
use crate::error::{CostAnalyticsError, CostAnalyticsResult};
use crate::forecast::ForecastResult;
use crate::series::{Dimensions, MetricKind, SeriesId, TimeSeries};

/// Which cost series count toward a budget
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    /// Every cost series
    #[default]
    Global,
    /// Series whose resource group matches, case-insensitively
    ResourceGroup(String),
    /// Series whose service type matches, case-insensitively
    ServiceType(String),
    /// Series in the region
    Region(String),
    /// Series carrying the tag with exactly this value
    Tag {
        /// Tag key
        key: String,
        /// Required value
        value: String,
    },
}

impl BudgetScope {
    /// True when a series with these dimensions is in scope
    pub fn matches(&self, dimensions: &Dimensions) -> bool {
        let eq = |a: &Option<String>, b: &str| a.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(b));
        match self {
            BudgetScope::Global => true,
            BudgetScope::ResourceGroup(group) => eq(&dimensions.resource_group, group),
            BudgetScope::ServiceType(service) => eq(&dimensions.service_type, service),
            BudgetScope::Region(region) => eq(&dimensions.region, region),
            BudgetScope::Tag { key, value } => dimensions.tag(key) == Some(value.as_str()),
        }
    }
}

/// Budget policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPolicy {
    /// Policy identifier
    pub id: String,
    /// Budget amount for the period
    pub amount: f64,
    /// Currency of `amount`; series in other currencies are ignored
    pub currency: String,
    /// Alert thresholds in percent of `amount`, strictly ascending, within (0, 100]
    pub thresholds: Vec<f64>,
    /// Spend before this instant is ignored; unbounded when absent
    #[serde(default)]
    pub period_start: Option<DateTime<Utc>>,
    /// End of the budget period, inclusive
    pub period_end: DateTime<Utc>,
    /// Which series count toward the budget
    #[serde(default)]
    pub scope: BudgetScope,
}

impl BudgetPolicy {
    /// Reject malformed definitions
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        let invalid = |reason: String| CostAnalyticsError::InvalidPolicy {
            policy_id: self.id.clone(),
            reason,
        };

        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(invalid(format!("amount must be positive, got {}", self.amount)));
        }
        if self.currency.trim().is_empty() {
            return Err(invalid("currency is required".to_string()));
        }
        if self.thresholds.is_empty() {
            return Err(invalid("at least one threshold is required".to_string()));
        }
        if let Some(t) = self
            .thresholds
            .iter()
            .find(|t| !(t.is_finite() && **t > 0.0 && **t <= 100.0))
        {
            return Err(invalid(format!("threshold {} outside (0, 100]", t)));
        }
        if self.thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("thresholds must be strictly ascending".to_string()));
        }
        if let Some(start) = self.period_start {
            if start >= self.period_end {
                return Err(invalid("period_start must precede period_end".to_string()));
            }
        }
        Ok(())
    }

    fn in_period(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp <= self.period_end && self.period_start.map_or(true, |start| timestamp >= start)
    }

    fn covers(&self, series: &TimeSeries) -> bool {
        series.id.metric == MetricKind::Cost
            && self.scope.matches(&series.dimensions)
            && series
                .dimensions
                .currency
                .as_deref()
                .map_or(true, |c| c.eq_ignore_ascii_case(&self.currency))
    }

    /// Evaluate against observed cost series and their forecasts
    pub fn evaluate(
        &self,
        series: &[TimeSeries],
        forecasts: &HashMap<&SeriesId, &ForecastResult>,
    ) -> PolicyResult {
        let mut current_spend = 0.0;
        let mut resources = BTreeSet::new();
        let mut projected_by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        let mut observed_span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        for s in series.iter().filter(|s| self.covers(s)) {
            resources.insert(s.id.resource_id.clone());
            let in_period: Vec<_> = s.points().iter().filter(|p| self.in_period(p.timestamp)).collect();
            current_spend += in_period.iter().map(|p| p.value).sum::<f64>();

            if let (Some(first), Some(last)) = (in_period.first(), in_period.last()) {
                let end = s.id.granularity.next(last.timestamp);
                observed_span = Some(match observed_span {
                    Some((start, stop)) => (start.min(first.timestamp), stop.max(end)),
                    None => (first.timestamp, end),
                });
            }

            if let Some(forecast) = forecasts.get(&s.id) {
                let last_observed = s.last().map(|p| p.timestamp);
                for point in &forecast.points {
                    let after_history = last_observed.map_or(true, |last| point.timestamp > last);
                    if after_history && self.in_period(point.timestamp) {
                        *projected_by_time.entry(point.timestamp).or_insert(0.0) +=
                            point.point_estimate;
                    }
                }
            }
        }

        let utilization_percent = current_spend / self.amount * 100.0;
        let threshold_amount = |t: f64| self.amount * t / 100.0;
        let crossed_now = self
            .thresholds
            .iter()
            .copied()
            .filter(|t| current_spend >= threshold_amount(*t))
            .last();

        let mut cumulative = current_spend;
        let mut breach_date = None;
        for (timestamp, amount) in &projected_by_time {
            cumulative += amount;
            if breach_date.is_none()
                && self
                    .thresholds
                    .iter()
                    .any(|t| current_spend < threshold_amount(*t) && cumulative >= threshold_amount(*t))
            {
                breach_date = Some(*timestamp);
            }
        }
        let projected_spend = cumulative;
        let crossed_projected = self
            .thresholds
            .iter()
            .copied()
            .filter(|t| projected_spend >= threshold_amount(*t))
            .last();

        let days_until_depletion = observed_span.and_then(|(start, end)| {
            let observed_days = (end - start).num_hours() as f64 / 24.0;
            depletion_days(self.amount - current_spend, current_spend, observed_days)
        });

        let (status, crossed_threshold) = if utilization_percent > 100.0 {
            (PolicyStatus::Violated, crossed_now)
        } else if breach_date.is_some() {
            (PolicyStatus::AtRisk, crossed_projected)
        } else {
            (PolicyStatus::Compliant, crossed_now)
        };

        PolicyResult {
            policy_id: self.id.clone(),
            kind: PolicyKind::Budget,
            status,
            affected_resources: resources.into_iter().collect(),
            details: PolicyDetails::Budget(BudgetDetails {
                currency: self.currency.to_ascii_uppercase(),
                current_spend,
                budget_amount: self.amount,
                utilization_percent,
                projected_spend,
                crossed_threshold,
                forecast_breach_date: if status == PolicyStatus::AtRisk {
                    breach_date
                } else {
                    None
                },
                days_until_depletion,
            }),
        }
    }
}

/// Whole days until `remaining` is spent at the observed daily average.
/// Zero once the budget is exhausted; `None` without any burn.
fn depletion_days(remaining: f64, spent: f64, observed_days: f64) -> Option<u64> {
    if remaining <= 0.0 {
        return Some(0);
    }
    if observed_days <= 0.0 {
        return None;
    }
    let daily_average = spent / observed_days;
    if daily_average > 0.0 {
        Some((remaining / daily_average).floor() as u64)
    } else {
        None
    }
}
