//! Reserved bandwidth and same-region placement

use tracing::debug;

use super::confidence::{confidence_score, corroboration};
use super::config::BandwidthConfig;
use super::context::{daily_values, last_days, mean_of, ResourceBundle, DAYS_PER_MONTH};
use super::pricing::{BandwidthOffer, PricingCatalog, TrafficClass};
use super::types::{Recommendation, RecommendationAction, RecommendationOutput, RecommendationType, RiskLevel};
use crate::omission::{Omission, ReasonCode};
use crate::series::{MetricKind, TimeSeries};

/// Evaluate egress and cross-region traffic for a resource
pub(crate) fn evaluate(
    bundle: &ResourceBundle,
    config: &BandwidthConfig,
    pricing: &dyn PricingCatalog,
) -> RecommendationOutput {
    let mut output = RecommendationOutput::default();
    for (metric, traffic) in [
        (MetricKind::EgressGb, TrafficClass::Egress),
        (MetricKind::CrossRegionGb, TrafficClass::CrossRegion),
    ] {
        if let Some(series) = bundle.series(metric) {
            match evaluate_traffic(bundle, series, traffic, config, pricing) {
                Ok(Some(rec)) => output.recommendations.push(rec),
                Ok(None) => {}
                Err(omission) => output.omissions.push(omission),
            }
        }
    }
    output
}

/// The cheaper of the commitment and same-region placement
fn best_option(
    offer: &BandwidthOffer,
    traffic: TrafficClass,
    monthly_volume_gb: f64,
) -> Option<(f64, RecommendationAction, RiskLevel)> {
    let on_demand = monthly_volume_gb * offer.on_demand_per_gb;
    let reserve = (
        on_demand - offer.committed_cost(monthly_volume_gb),
        RecommendationAction::ReserveBandwidth {
            traffic,
            committed_gb: offer.committed_gb,
            monthly_volume_gb,
        },
        RiskLevel::Low,
    );
    let colocate = match (traffic, offer.same_region_per_gb) {
        (TrafficClass::CrossRegion, Some(same_region)) => Some((
            monthly_volume_gb * (offer.on_demand_per_gb - same_region),
            RecommendationAction::CoLocate { monthly_volume_gb },
            RiskLevel::Medium,
        )),
        _ => None,
    };
    std::iter::once(reserve)
        .chain(colocate)
        .filter(|(savings, _, _)| *savings > 0.0)
        .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.2.cmp(&a.2)))
}

fn evaluate_traffic(
    bundle: &ResourceBundle,
    series: &TimeSeries,
    traffic: TrafficClass,
    config: &BandwidthConfig,
    pricing: &dyn PricingCatalog,
) -> Result<Option<Recommendation>, Omission> {
    let scope = format!("{}/{}/{}", bundle.resource_id(), RecommendationType::Bandwidth, series.id.metric);
    let days = daily_values(series).unwrap_or_default();
    if days.len() < config.lookback_days {
        return Err(Omission::new(
            scope,
            ReasonCode::InsufficientData,
            format!("{} days of traffic, {} required", days.len(), config.lookback_days),
        ));
    }
    let Some(offer) = bundle.region().and_then(|region| pricing.bandwidth_offer(traffic, region)) else {
        return Err(Omission::new(
            scope,
            ReasonCode::MissingPricing,
            format!("no {:?} bandwidth pricing for the resource region", traffic),
        ));
    };

    let window = last_days(&days, config.lookback_days);
    let daily_break_even = offer.break_even_gb() / DAYS_PER_MONTH;
    let sustained_days = window.iter().filter(|d| d.total >= daily_break_even).count();
    let sustained = sustained_days as f64 / window.len() as f64;
    if sustained < config.sustained_fraction {
        debug!(
            resource = bundle.resource_id(),
            ?traffic,
            sustained,
            "traffic not sustained above break-even"
        );
        return Ok(None);
    }

    let monthly_volume_gb = mean_of(window, |d| d.total) * DAYS_PER_MONTH;
    let Some((savings, action, risk)) = best_option(&offer, traffic, monthly_volume_gb) else {
        return Ok(None);
    };

    let evidence_series = [series];
    let forecast = bundle.forecast_for(&series.id);
    let confidence = confidence_score(
        RecommendationType::Bandwidth,
        series.completeness(),
        forecast.map(|f| f.goodness_of_fit),
        corroboration(bundle.flags_for(&evidence_series)),
    );
    let steps = match action {
        RecommendationAction::CoLocate { .. } => vec![
            "Identify the consumers in the remote region".to_string(),
            "Move the consumers or replicate the data into the same region".to_string(),
        ],
        _ => vec![
            format!("Purchase a {:.0} GB/month bandwidth commitment", offer.committed_gb),
            "Review overage charges after the first billing cycle".to_string(),
        ],
    };

    Ok(Some(Recommendation {
        resource_id: bundle.resource_id().to_string(),
        recommendation_type: RecommendationType::Bandwidth,
        estimated_monthly_savings: savings,
        currency: pricing.currency().to_string(),
        confidence,
        risk,
        evidence: bundle.evidence(&evidence_series, forecast),
        action,
        rationale: format!(
            "{:.0}% of the last {} days exceeded the {:.1} GB/day break-even; about {:.0} GB/month",
            sustained * 100.0,
            window.len(),
            daily_break_even,
            monthly_volume_gb
        ),
        implementation_steps: steps,
    }))
}
