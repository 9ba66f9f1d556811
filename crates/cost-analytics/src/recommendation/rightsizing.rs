//! Right-sizing and idle-resource detection from utilization history

use tracing::debug;

use super::confidence::{confidence_score, corroboration};
use super::config::RightSizingConfig;
use super::context::{daily_values, last_days, mean_of, trailing_run, DailyValue, ResourceBundle, DAYS_PER_MONTH};
use super::pricing::PricingCatalog;
use super::types::{Recommendation, RecommendationAction, RecommendationOutput, RecommendationType, RiskLevel};
use crate::omission::{Omission, ReasonCode};
use crate::series::{MetricKind, TimeSeries, HOURS_PER_MONTH};

fn peak(days: &[DailyValue]) -> f64 {
    days.iter().map(|d| d.peak).fold(0.0, f64::max)
}

fn scope(bundle: &ResourceBundle, recommendation_type: RecommendationType) -> String {
    format!("{}/{}", bundle.resource_id(), recommendation_type)
}

/// Monthly run cost from the size tier price, else from recent cost history
fn monthly_run_cost(bundle: &ResourceBundle, pricing: &dyn PricingCatalog) -> Option<f64> {
    let meta = &bundle.metadata;
    if let (Some(resource_type), Some(size), Some(region)) =
        (meta.resource_type.as_deref(), meta.size_tier.as_deref(), bundle.region())
    {
        if let Some(hourly) = pricing.hourly_price(resource_type, size, region) {
            return Some(hourly * HOURS_PER_MONTH);
        }
    }
    let cost = bundle.series(MetricKind::Cost)?;
    let days = daily_values(cost)?;
    let recent = last_days(&days, 30);
    if recent.is_empty() {
        return None;
    }
    Some(mean_of(recent, |d| d.total) * DAYS_PER_MONTH)
}

/// Evaluate decommission and right-size candidates for a compute resource
pub(crate) fn evaluate(
    bundle: &ResourceBundle,
    config: &RightSizingConfig,
    pricing: &dyn PricingCatalog,
) -> RecommendationOutput {
    let mut output = RecommendationOutput::default();
    let Some(cpu) = bundle.series(MetricKind::CpuUtilization) else {
        return output;
    };
    let Some(cpu_days) = daily_values(cpu) else {
        output.omissions.push(Omission::new(
            scope(bundle, RecommendationType::RightSize),
            ReasonCode::InsufficientData,
            "utilization analysis needs hourly or daily series",
        ));
        return output;
    };
    if cpu_days.len() < config.lookback_days {
        output.omissions.push(Omission::new(
            scope(bundle, RecommendationType::RightSize),
            ReasonCode::InsufficientData,
            format!(
                "{} days of CPU history, {} required",
                cpu_days.len(),
                config.lookback_days
            ),
        ));
        return output;
    }

    let memory = bundle.series(MetricKind::MemoryUtilization);
    let memory_days = memory.and_then(daily_values);

    let idle_run = trailing_run(&cpu_days, |d| d.mean < config.idle_threshold);
    if idle_run.len() >= config.lookback_days {
        match decommission(bundle, cpu, idle_run, config, pricing) {
            Some(rec) => output.recommendations.push(rec),
            None => output.omissions.push(Omission::new(
                scope(bundle, RecommendationType::Decommission),
                ReasonCode::MissingPricing,
                "no size tier price or cost history to value the resource",
            )),
        }
    }

    let cpu_run = trailing_run(&cpu_days, |d| d.mean < config.cpu_threshold);
    let memory_run = memory_days
        .as_deref()
        .map(|days| trailing_run(days, |d| d.mean < config.memory_threshold));
    let run_len = memory_run.map_or(cpu_run.len(), |m| m.len().min(cpu_run.len()));
    if run_len < config.lookback_days {
        debug!(
            resource = bundle.resource_id(),
            run_len, "utilization above right-sizing thresholds"
        );
        return output;
    }

    let cpu_peak = peak(last_days(cpu_run, run_len));
    let mut risk = RiskLevel::from_peak(cpu_peak, config.cpu_threshold);
    if let Some(memory_run) = memory_run {
        let memory_peak = peak(last_days(memory_run, run_len));
        risk = risk.max(RiskLevel::from_peak(memory_peak, config.memory_threshold));
    }

    match right_size(bundle, cpu, memory, run_len, cpu_peak, risk, config, pricing) {
        Ok(Some(rec)) => output.recommendations.push(rec),
        Ok(None) => {}
        Err(omission) => output.omissions.push(omission),
    }
    output
}

fn decommission(
    bundle: &ResourceBundle,
    cpu: &TimeSeries,
    idle_run: &[DailyValue],
    config: &RightSizingConfig,
    pricing: &dyn PricingCatalog,
) -> Option<Recommendation> {
    let savings = monthly_run_cost(bundle, pricing)?;
    if savings <= 0.0 {
        return None;
    }
    let evidence_series = [cpu];
    let run_peak = peak(idle_run);
    let risk = if run_peak < config.idle_threshold {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };
    let confidence = confidence_score(
        RecommendationType::Decommission,
        cpu.completeness(),
        None,
        corroboration(bundle.flags_for(&evidence_series)),
    );
    Some(Recommendation {
        resource_id: bundle.resource_id().to_string(),
        recommendation_type: RecommendationType::Decommission,
        estimated_monthly_savings: savings,
        currency: pricing.currency().to_string(),
        confidence,
        risk,
        evidence: bundle.evidence(&evidence_series, None),
        action: RecommendationAction::Decommission,
        rationale: format!(
            "CPU averaged {:.2}% over the last {} days (peak {:.1}%), below the {:.1}% idle threshold",
            mean_of(idle_run, |d| d.mean),
            idle_run.len(),
            run_peak,
            config.idle_threshold
        ),
        implementation_steps: vec![
            "Confirm with the owner that the resource is no longer needed".to_string(),
            "Snapshot attached disks".to_string(),
            "Stop the resource and monitor dependents for a week".to_string(),
            "Delete the resource".to_string(),
        ],
    })
}

#[allow(clippy::too_many_arguments)]
fn right_size(
    bundle: &ResourceBundle,
    cpu: &TimeSeries,
    memory: Option<&TimeSeries>,
    run_len: usize,
    cpu_peak: f64,
    risk: RiskLevel,
    config: &RightSizingConfig,
    pricing: &dyn PricingCatalog,
) -> Result<Option<Recommendation>, Omission> {
    let meta = &bundle.metadata;
    let missing = |detail: String| {
        Omission::new(scope(bundle, RecommendationType::RightSize), ReasonCode::MissingPricing, detail)
    };
    let (Some(resource_type), Some(size), Some(region)) =
        (meta.resource_type.as_deref(), meta.size_tier.as_deref(), bundle.region())
    else {
        return Err(missing("resource type, size tier and region are required".to_string()));
    };
    let Some(current_price) = pricing.hourly_price(resource_type, size, region) else {
        return Err(missing(format!("no price for {} {} in {}", resource_type, size, region)));
    };
    let Some(target) = pricing.next_smaller_tier(resource_type, size, region) else {
        debug!(resource = bundle.resource_id(), size, "already the smallest size tier");
        return Ok(None);
    };

    let savings = (current_price - target.hourly_price) * HOURS_PER_MONTH;
    if savings <= 0.0 {
        return Ok(None);
    }

    let mut evidence_series = vec![cpu];
    evidence_series.extend(memory);
    let completeness = mean_completeness(&evidence_series);
    let forecast = bundle.forecast_for(&cpu.id);
    let confidence = confidence_score(
        RecommendationType::RightSize,
        completeness,
        forecast.map(|f| f.goodness_of_fit),
        corroboration(bundle.flags_for(&evidence_series)),
    );

    Ok(Some(Recommendation {
        resource_id: bundle.resource_id().to_string(),
        recommendation_type: RecommendationType::RightSize,
        estimated_monthly_savings: savings,
        currency: pricing.currency().to_string(),
        confidence,
        risk,
        evidence: bundle.evidence(&evidence_series, forecast),
        action: RecommendationAction::Resize {
            current_tier: size.to_string(),
            target_tier: target.name.clone(),
        },
        rationale: format!(
            "Daily CPU stayed below {:.0}% for {} days (peak {:.1}%); {} costs {:.3}/h less than {}",
            config.cpu_threshold,
            run_len,
            cpu_peak,
            target.name,
            current_price - target.hourly_price,
            size
        ),
        implementation_steps: vec![
            format!("Schedule a maintenance window for {}", bundle.resource_id()),
            format!("Resize from {} to {}", size, target.name),
            "Watch utilization for two weeks and roll back if the peak exceeds 80%".to_string(),
        ],
    }))
}

fn mean_completeness(series: &[&TimeSeries]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().map(|s| s.completeness()).sum::<f64>() / series.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::context::ResourceMetadata;
    use crate::recommendation::pricing::{SizeTierPrice, StaticPricingCatalog};
    use crate::series::{Dimensions, Granularity, SeriesId, SeriesPoint};
    use chrono::{Duration, TimeZone, Utc};

    fn daily(resource: &str, metric: MetricKind, values: &[f64]) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::observed(start + Duration::days(i as i64), *v))
            .collect();
        TimeSeries::from_points(
            SeriesId::new(resource, metric, Granularity::Daily),
            Dimensions::default(),
            points,
        )
        .unwrap()
    }

    fn catalog() -> StaticPricingCatalog {
        StaticPricingCatalog::new("USD").with_size_ladder(
            "vm",
            "eastus",
            vec![
                SizeTierPrice::new("D2", 0.096),
                SizeTierPrice::new("D4", 0.192),
            ],
        )
    }

    fn bundle(series: Vec<TimeSeries>) -> ResourceBundle {
        let mut bundle = ResourceBundle::new(
            ResourceMetadata::new("vm-1")
                .with_compute("vm", "D4")
                .with_region("eastus"),
        );
        bundle.series = series;
        bundle
    }

    fn cpu_around(level: f64, days: usize) -> Vec<f64> {
        (0..days).map(|i| level + (i % 5) as f64 - 2.0).collect()
    }

    #[test]
    fn test_low_cpu_yields_rightsizing() {
        let bundle = bundle(vec![daily("vm-1", MetricKind::CpuUtilization, &cpu_around(12.0, 90))]);
        let output = evaluate(&bundle, &RightSizingConfig::default(), &catalog());

        assert_eq!(output.recommendations.len(), 1);
        let rec = &output.recommendations[0];
        assert_eq!(rec.recommendation_type, RecommendationType::RightSize);
        assert!((rec.estimated_monthly_savings - 0.096 * 730.0).abs() < 1e-6);
        assert_eq!(rec.risk, RiskLevel::Low);
        assert!(rec.confidence > 0.0 && rec.confidence <= 1.0);
    }

    #[test]
    fn test_busy_memory_blocks_rightsizing() {
        let bundle = bundle(vec![
            daily("vm-1", MetricKind::CpuUtilization, &cpu_around(12.0, 30)),
            daily("vm-1", MetricKind::MemoryUtilization, &[75.0; 30]),
        ]);
        let output = evaluate(&bundle, &RightSizingConfig::default(), &catalog());
        assert!(output.recommendations.is_empty());
        assert!(output.omissions.is_empty());
    }

    #[test]
    fn test_idle_cpu_yields_decommission_and_rightsize() {
        let bundle = bundle(vec![daily("vm-1", MetricKind::CpuUtilization, &[0.5; 20])]);
        let output = evaluate(&bundle, &RightSizingConfig::default(), &catalog());

        let types: Vec<_> = output.recommendations.iter().map(|r| r.recommendation_type).collect();
        assert_eq!(types, vec![RecommendationType::Decommission, RecommendationType::RightSize]);
        let decommission = &output.recommendations[0];
        assert!((decommission.estimated_monthly_savings - 0.192 * 730.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_history_is_omitted() {
        let bundle = bundle(vec![daily("vm-1", MetricKind::CpuUtilization, &[5.0; 5])]);
        let output = evaluate(&bundle, &RightSizingConfig::default(), &catalog());
        assert!(output.recommendations.is_empty());
        assert_eq!(output.omissions[0].reason, ReasonCode::InsufficientData);
    }

    #[test]
    fn test_unknown_size_is_missing_pricing() {
        let mut bundle = bundle(vec![daily("vm-1", MetricKind::CpuUtilization, &cpu_around(12.0, 30))]);
        bundle.metadata.size_tier = Some("M128".to_string());
        let output = evaluate(&bundle, &RightSizingConfig::default(), &catalog());
        assert_eq!(output.omissions.len(), 1);
        assert_eq!(output.omissions[0].reason, ReasonCode::MissingPricing);
        assert_eq!(output.omissions[0].scope, "vm-1/right_size");
    }

    #[test]
    fn test_hourly_spike_raises_risk() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = (0..24 * 20)
            .map(|h| {
                let value = if h == 24 * 19 + 12 { 55.0 } else { 8.0 };
                SeriesPoint::observed(start + Duration::hours(h), value)
            })
            .collect();
        let cpu = TimeSeries::from_points(
            SeriesId::new("vm-1", MetricKind::CpuUtilization, Granularity::Hourly),
            Dimensions::default(),
            points,
        )
        .unwrap();
        let output = evaluate(&bundle(vec![cpu]), &RightSizingConfig::default(), &catalog());
        assert_eq!(output.recommendations[0].risk, RiskLevel::High);
    }
}
