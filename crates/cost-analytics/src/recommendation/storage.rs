//! Storage tiering from access history

use tracing::debug;

use super::confidence::{confidence_score, corroboration};
use super::config::StorageTieringConfig;
use super::context::{daily_values, last_days, mean_of, trailing_run, ResourceBundle};
use super::pricing::{PricingCatalog, StorageTier};
use super::types::{Recommendation, RecommendationAction, RecommendationOutput, RecommendationType, RiskLevel};
use crate::omission::{Omission, ReasonCode};
use crate::series::MetricKind;

#[derive(Debug, Clone, Copy)]
enum Move {
    Tier(StorageTier),
    Delete,
}

/// Evaluate tier moves and deletion for a storage resource
pub(crate) fn evaluate(
    bundle: &ResourceBundle,
    config: &StorageTieringConfig,
    pricing: &dyn PricingCatalog,
) -> RecommendationOutput {
    let mut output = RecommendationOutput::default();
    let Some(access) = bundle.series(MetricKind::StorageAccessCount) else {
        return output;
    };
    let scope = format!("{}/{}", bundle.resource_id(), RecommendationType::StorageTier);

    let Some(days) = daily_values(access) else {
        output.omissions.push(Omission::new(
            scope,
            ReasonCode::InsufficientData,
            "access analysis needs hourly or daily series",
        ));
        return output;
    };
    let Some(used) = bundle.series(MetricKind::StorageUsedGb) else {
        output.omissions.push(Omission::new(
            scope,
            ReasonCode::InsufficientData,
            "no storage_used_gb series to size the move",
        ));
        return output;
    };
    let stored_gb = used.last().map_or(0.0, |p| p.value);
    if stored_gb <= 0.0 {
        return output;
    }

    let current = bundle.metadata.storage_tier.unwrap_or(StorageTier::Hot);
    let zero_run = trailing_run(&days, |d| d.total == 0.0).len();
    let planned = if zero_run >= config.archive_days {
        Move::Delete
    } else if zero_run >= config.unused_days {
        Move::Tier(StorageTier::Archive)
    } else if days.len() >= config.unused_days
        && current <= StorageTier::Hot
        && mean_of(last_days(&days, config.unused_days), |d| d.total) < config.cool_access_threshold
    {
        Move::Tier(StorageTier::Cool)
    } else {
        return output;
    };
    if let Move::Tier(target) = planned {
        if target <= current {
            debug!(resource = bundle.resource_id(), ?current, "already in a colder tier");
            return output;
        }
    }

    let Some(region) = bundle.region() else {
        output.omissions.push(Omission::new(scope, ReasonCode::MissingPricing, "resource region unknown"));
        return output;
    };
    let Some(current_price) = pricing.storage_price(current, region) else {
        output.omissions.push(Omission::new(
            scope,
            ReasonCode::MissingPricing,
            format!("no {:?} storage price in {}", current, region),
        ));
        return output;
    };

    let evidence_series = [access, used];
    let corroborated = corroboration(bundle.flags_for(&evidence_series));
    let completeness = access.completeness();

    let recommendation = match planned {
        Move::Delete => Recommendation {
            resource_id: bundle.resource_id().to_string(),
            recommendation_type: RecommendationType::Decommission,
            estimated_monthly_savings: stored_gb * current_price,
            currency: pricing.currency().to_string(),
            confidence: confidence_score(RecommendationType::Decommission, completeness, None, corroborated),
            risk: RiskLevel::High,
            evidence: bundle.evidence(&evidence_series, None),
            action: RecommendationAction::Decommission,
            rationale: format!("No reads or writes for {} days ({:.1} GB stored)", zero_run, stored_gb),
            implementation_steps: vec![
                "Export an inventory of the stored objects".to_string(),
                "Confirm retention requirements with the data owner".to_string(),
                "Delete the storage resource".to_string(),
            ],
        },
        Move::Tier(target) => {
            let Some(target_price) = pricing.storage_price(target, region) else {
                output.omissions.push(Omission::new(
                    scope,
                    ReasonCode::MissingPricing,
                    format!("no {:?} storage price in {}", target, region),
                ));
                return output;
            };
            let savings = stored_gb * (current_price - target_price);
            if savings <= 0.0 {
                return output;
            }
            Recommendation {
                resource_id: bundle.resource_id().to_string(),
                recommendation_type: RecommendationType::StorageTier,
                estimated_monthly_savings: savings,
                currency: pricing.currency().to_string(),
                confidence: confidence_score(RecommendationType::StorageTier, completeness, None, corroborated),
                risk: if target == StorageTier::Archive {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                },
                evidence: bundle.evidence(&evidence_series, None),
                action: RecommendationAction::ChangeStorageTier {
                    current_tier: current,
                    target_tier: target,
                    stored_gb,
                },
                rationale: if zero_run > 0 {
                    format!("No access for {} days; {:.1} GB can move to {:?}", zero_run, stored_gb, target)
                } else {
                    format!(
                        "Averaged {:.1} accesses/day over {} days; {:.1} GB can move to {:?}",
                        mean_of(last_days(&days, config.unused_days), |d| d.total),
                        config.unused_days,
                        stored_gb,
                        target
                    )
                },
                implementation_steps: vec![
                    format!("Add a lifecycle rule moving data to the {:?} tier", target),
                    "Verify that readers tolerate the retrieval latency of the new tier".to_string(),
                ],
            }
        }
    };
    output.recommendations.push(recommendation);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::context::ResourceMetadata;
    use crate::recommendation::pricing::StaticPricingCatalog;
    use crate::series::{Dimensions, Granularity, SeriesId, SeriesPoint, TimeSeries};
    use chrono::{Duration, TimeZone, Utc};

    fn daily(metric: MetricKind, values: &[f64]) -> TimeSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::observed(start + Duration::days(i as i64), *v))
            .collect();
        TimeSeries::from_points(
            SeriesId::new("bucket-1", metric, Granularity::Daily),
            Dimensions::default(),
            points,
        )
        .unwrap()
    }

    fn catalog() -> StaticPricingCatalog {
        StaticPricingCatalog::new("USD")
            .with_storage_price(StorageTier::Hot, "eastus", 0.0184)
            .with_storage_price(StorageTier::Cool, "eastus", 0.01)
            .with_storage_price(StorageTier::Archive, "eastus", 0.00099)
    }

    fn bundle(access: Vec<f64>, tier: StorageTier) -> ResourceBundle {
        let days = access.len();
        let mut bundle = ResourceBundle::new(
            ResourceMetadata::new("bucket-1")
                .with_region("eastus")
                .with_storage_tier(tier),
        );
        bundle.series = vec![
            daily(MetricKind::StorageAccessCount, &access),
            daily(MetricKind::StorageUsedGb, &vec![1000.0; days]),
        ];
        bundle
    }

    #[test]
    fn test_unused_hot_data_moves_to_archive() {
        let mut access = vec![50.0; 10];
        access.extend(vec![0.0; 40]);
        let output = evaluate(&bundle(access, StorageTier::Hot), &StorageTieringConfig::default(), &catalog());

        let rec = &output.recommendations[0];
        assert_eq!(rec.recommendation_type, RecommendationType::StorageTier);
        assert!((rec.estimated_monthly_savings - 1000.0 * (0.0184 - 0.00099)).abs() < 1e-9);
        assert_eq!(rec.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_rarely_read_hot_data_moves_to_cool() {
        let output = evaluate(
            &bundle(vec![3.0; 45], StorageTier::Hot),
            &StorageTieringConfig::default(),
            &catalog(),
        );
        let rec = &output.recommendations[0];
        match &rec.action {
            RecommendationAction::ChangeStorageTier { target_tier, .. } => {
                assert_eq!(*target_tier, StorageTier::Cool)
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert!((rec.estimated_monthly_savings - 8.4).abs() < 1e-9);
    }

    #[test]
    fn test_long_unused_data_is_deleted() {
        let output = evaluate(
            &bundle(vec![0.0; 200], StorageTier::Cool),
            &StorageTieringConfig::default(),
            &catalog(),
        );
        let rec = &output.recommendations[0];
        assert_eq!(rec.recommendation_type, RecommendationType::Decommission);
        assert!((rec.estimated_monthly_savings - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_data_stays() {
        let output = evaluate(
            &bundle(vec![500.0; 60], StorageTier::Hot),
            &StorageTieringConfig::default(),
            &catalog(),
        );
        assert!(output.recommendations.is_empty());
        assert!(output.omissions.is_empty());
    }

    #[test]
    fn test_missing_tier_price_is_omitted() {
        let output = evaluate(
            &bundle(vec![0.0; 40], StorageTier::Premium),
            &StorageTieringConfig::default(),
            &catalog(),
        );
        assert_eq!(output.omissions[0].reason, ReasonCode::MissingPricing);
    }
}
