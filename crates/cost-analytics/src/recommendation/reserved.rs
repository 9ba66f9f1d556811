//! Reserved capacity planning
//!
//! Usage hours are converted to concurrent instances per bucket. The commitment
//! is the smaller of `coverage_target` times average usage and a low usage
//! percentile, capped by forecast demand when a forecast exists, so the
//! reservation is not left idle. Every offer in the catalogue is priced and the
//! feasible plan with the largest monthly savings wins.

use ordered_float::OrderedFloat;
use statistical::{mean, standard_deviation};
use tracing::debug;

use super::confidence::{confidence_score, corroboration};
use super::config::ReservedPlanningConfig;
use super::pricing::{PricingCatalog, ReservedOffer, ReservedTerm};
use super::context::ResourceBundle;
use super::types::{Recommendation, RecommendationAction, RecommendationOutput, RecommendationType, RiskLevel};
use crate::omission::{Omission, ReasonCode};
use crate::series::{MetricKind, HOURS_PER_MONTH};

/// Priced reservation option
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReservationPlan {
    pub offer: ReservedOffer,
    pub quantity: f64,
    pub monthly_savings: f64,
    pub total_commitment: f64,
    pub upfront_cost: f64,
    pub risk: RiskLevel,
}

/// Nearest-rank percentile of unsorted values
fn percentile(values: &[f64], fraction: f64) -> f64 {
    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort();
    let rank = (fraction * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1].into_inner()
}

/// Longer terms and more volatile usage are riskier
pub(crate) fn plan_risk(term: ReservedTerm, coefficient_of_variation: f64) -> RiskLevel {
    match term {
        ReservedTerm::OneYear if coefficient_of_variation < 0.2 => RiskLevel::Low,
        ReservedTerm::OneYear if coefficient_of_variation < 0.5 => RiskLevel::Medium,
        ReservedTerm::ThreeYear if coefficient_of_variation < 0.2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

/// Price one offer for `quantity` instances at `hourly_rate`
pub(crate) fn price_plan(offer: ReservedOffer, quantity: f64, hourly_rate: f64, cv: f64) -> ReservationPlan {
    let monthly_on_demand = quantity * HOURS_PER_MONTH * hourly_rate;
    let monthly_committed = monthly_on_demand * (1.0 - offer.discount);
    let total_commitment = monthly_committed * offer.term.months();
    ReservationPlan {
        offer,
        quantity,
        monthly_savings: monthly_on_demand * offer.discount,
        total_commitment,
        upfront_cost: total_commitment * offer.upfront_fraction,
        risk: plan_risk(offer.term, cv),
    }
}

/// Best plan within the ceiling and risk tolerance
pub(crate) fn select_plan(
    plans: impl IntoIterator<Item = ReservationPlan>,
    config: &ReservedPlanningConfig,
) -> Option<ReservationPlan> {
    plans
        .into_iter()
        .filter(|p| p.risk <= config.risk_tolerance)
        .filter(|p| config.budget_ceiling.map_or(true, |ceiling| p.total_commitment <= ceiling))
        .filter(|p| p.monthly_savings > 0.0)
        .min_by(|a, b| {
            b.monthly_savings
                .total_cmp(&a.monthly_savings)
                .then_with(|| a.risk.cmp(&b.risk))
                .then_with(|| a.offer.term.cmp(&b.offer.term))
                .then_with(|| a.offer.payment.cmp(&b.offer.payment))
        })
}

/// Evaluate reserved capacity for a resource with usage-hour history
pub(crate) fn evaluate(
    bundle: &ResourceBundle,
    config: &ReservedPlanningConfig,
    pricing: &dyn PricingCatalog,
) -> RecommendationOutput {
    let mut output = RecommendationOutput::default();
    let Some(usage) = bundle.series(MetricKind::UsageHours) else {
        return output;
    };
    let scope = format!("{}/{}", bundle.resource_id(), RecommendationType::ReservedCapacity);
    if usage.len() < config.min_history_points {
        output.omissions.push(Omission::new(
            scope,
            ReasonCode::InsufficientData,
            format!("{} usage points, {} required", usage.len(), config.min_history_points),
        ));
        return output;
    }

    let hours_per_bucket = usage.id.granularity.hours_per_bucket();
    let instances: Vec<f64> = usage.values().iter().map(|h| h / hours_per_bucket).collect();
    let average = mean(&instances);
    if average <= 0.0 {
        return output;
    }
    let cv = standard_deviation(&instances, None) / average;

    let forecast = bundle.forecast_for(&usage.id);
    let mut quantity = (config.coverage_target * average).min(percentile(&instances, config.baseline_percentile));
    if let Some(expected) = forecast.and_then(|f| f.mean_estimate()) {
        quantity = quantity.min(expected / hours_per_bucket);
    }
    if quantity <= 0.0 {
        debug!(resource = bundle.resource_id(), "no always-on baseline to reserve");
        return output;
    }

    let Some(hourly_rate) = on_demand_rate(bundle, pricing) else {
        output.omissions.push(Omission::new(
            scope,
            ReasonCode::MissingPricing,
            "no on-demand price or cost history for the resource",
        ));
        return output;
    };
    let offers = bundle
        .metadata
        .resource_type
        .as_deref()
        .zip(bundle.region())
        .map(|(resource_type, region)| pricing.reserved_offers(resource_type, region))
        .unwrap_or_default();
    if offers.is_empty() {
        output.omissions.push(Omission::new(scope, ReasonCode::MissingPricing, "no reservation offers"));
        return output;
    }

    let plans = offers.into_iter().map(|offer| price_plan(offer, quantity, hourly_rate, cv));
    let Some(plan) = select_plan(plans, config) else {
        output.omissions.push(Omission::new(
            scope,
            ReasonCode::InfeasiblePlan,
            format!(
                "no offer fits budget ceiling {:?} within {:?} risk",
                config.budget_ceiling, config.risk_tolerance
            ),
        ));
        return output;
    };

    let evidence_series = [usage];
    let confidence = confidence_score(
        RecommendationType::ReservedCapacity,
        usage.completeness(),
        forecast.map(|f| f.goodness_of_fit),
        corroboration(bundle.flags_for(&evidence_series)),
    );
    let break_even_months = if plan.upfront_cost > 0.0 {
        plan.upfront_cost / plan.monthly_savings
    } else {
        0.0
    };

    output.recommendations.push(Recommendation {
        resource_id: bundle.resource_id().to_string(),
        recommendation_type: RecommendationType::ReservedCapacity,
        estimated_monthly_savings: plan.monthly_savings,
        currency: pricing.currency().to_string(),
        confidence,
        risk: plan.risk,
        evidence: bundle.evidence(&evidence_series, forecast),
        action: RecommendationAction::PurchaseReservation {
            term: plan.offer.term,
            payment: plan.offer.payment,
            commitment_quantity: plan.quantity,
            upfront_cost: plan.upfront_cost,
            total_commitment: plan.total_commitment,
            break_even_months,
        },
        rationale: format!(
            "Usage averaged {:.2} instances (cv {:.2}); reserving {:.2} at {:.0}% off saves {:.2}/month",
            average,
            cv,
            plan.quantity,
            plan.offer.discount * 100.0,
            plan.monthly_savings
        ),
        implementation_steps: vec![
            format!("Purchase {:.2} {:?} reservations ({:?})", plan.quantity, plan.offer.term, plan.offer.payment),
            "Scope the reservation to the subscription running the workload".to_string(),
            "Review utilization of the reservation monthly".to_string(),
        ],
    });
    output
}

/// On-demand hourly rate from the catalogue, else cost per usage hour
fn on_demand_rate(bundle: &ResourceBundle, pricing: &dyn PricingCatalog) -> Option<f64> {
    let meta = &bundle.metadata;
    if let (Some(resource_type), Some(size), Some(region)) =
        (meta.resource_type.as_deref(), meta.size_tier.as_deref(), bundle.region())
    {
        if let Some(price) = pricing.hourly_price(resource_type, size, region) {
            return Some(price);
        }
    }
    let hours: f64 = bundle.series(MetricKind::UsageHours)?.values().iter().sum();
    let cost: f64 = bundle.series(MetricKind::Cost)?.values().iter().sum();
    (hours > 0.0 && cost > 0.0).then(|| cost / hours)
}
