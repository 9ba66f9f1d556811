//! Recommendation engine

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use super::config::RecommendationConfig;
use super::context::{ResourceBundle, ResourceMetadata};
use super::pricing::PricingCatalog;
use super::types::{ConflictGroup, Recommendation, RecommendationOutput};
use super::{network, reserved, rightsizing, storage};
use crate::anomaly::AnomalyFlag;
use crate::error::CostAnalyticsResult;
use crate::forecast::ForecastResult;
use crate::policy::PolicyResult;
use crate::series::TimeSeries;

/// Keep one recommendation per conflict group: higher savings, then lower risk,
/// then type priority
pub fn resolve_conflicts(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut best: BTreeMap<(String, ConflictGroup), Recommendation> = BTreeMap::new();
    for rec in recommendations {
        let key = (rec.resource_id.clone(), rec.recommendation_type.conflict_group());
        match best.get(&key) {
            Some(current) if current.preference(&rec).is_le() => {
                debug!(
                    "{} {} superseded by {}",
                    rec.resource_id, rec.recommendation_type, current.recommendation_type
                );
            }
            _ => {
                best.insert(key, rec);
            }
        }
    }
    best.into_values().collect()
}

/// Turns per-resource evidence into savings recommendations
pub struct RecommendationEngine {
    config: Arc<RecommendationConfig>,
    pricing: Arc<dyn PricingCatalog>,
}

impl RecommendationEngine {
    /// Create a new recommendation engine
    pub fn new(config: RecommendationConfig, pricing: Arc<dyn PricingCatalog>) -> CostAnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            pricing,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Group analysis results by resource, in resource id order
    pub fn bundles(
        series: &[TimeSeries],
        forecasts: &[ForecastResult],
        anomalies: &[AnomalyFlag],
        policy_results: &[PolicyResult],
        metadata: &[ResourceMetadata],
    ) -> Vec<ResourceBundle> {
        let metadata: HashMap<&str, &ResourceMetadata> =
            metadata.iter().map(|m| (m.resource_id.as_str(), m)).collect();
        let mut bundles: BTreeMap<&str, ResourceBundle> = BTreeMap::new();

        for s in series {
            let resource_id = s.id.resource_id.as_str();
            bundles
                .entry(resource_id)
                .or_insert_with(|| {
                    let meta = metadata
                        .get(resource_id)
                        .map(|m| (*m).clone())
                        .unwrap_or_else(|| ResourceMetadata::new(resource_id));
                    ResourceBundle::new(meta)
                })
                .series
                .push(s.clone());
        }
        for forecast in forecasts {
            if let Some(bundle) = bundles.get_mut(forecast.series_id.resource_id.as_str()) {
                bundle.forecasts.push(forecast.clone());
            }
        }
        for flag in anomalies {
            if let Some(bundle) = bundles.get_mut(flag.series_id.resource_id.as_str()) {
                bundle.anomalies.push(flag.clone());
            }
        }
        for result in policy_results.iter().filter(|r| r.needs_attention()) {
            for resource_id in &result.affected_resources {
                if let Some(bundle) = bundles.get_mut(resource_id.as_str()) {
                    bundle.policy_ids.push(result.policy_id.clone());
                }
            }
        }

        bundles
            .into_values()
            .filter(ResourceBundle::has_analyzable_series)
            .map(|mut bundle| {
                bundle.policy_ids.sort();
                bundle.policy_ids.dedup();
                bundle
            })
            .collect()
    }

    /// Recommendations for one resource, conflicts resolved
    pub fn recommend_resource(&self, bundle: &ResourceBundle) -> RecommendationOutput {
        let pricing = self.pricing.as_ref();
        let mut output = rightsizing::evaluate(bundle, &self.config.rightsizing, pricing);
        output.merge(storage::evaluate(bundle, &self.config.storage, pricing));
        output.merge(reserved::evaluate(bundle, &self.config.reserved, pricing));
        output.merge(network::evaluate(bundle, &self.config.bandwidth, pricing));

        let candidates = output.recommendations.len();
        output.recommendations = resolve_conflicts(output.recommendations);
        debug!(
            "{}: {} candidates, {} kept, {} omissions",
            bundle.resource_id(),
            candidates,
            output.recommendations.len(),
            output.omissions.len()
        );
        output
    }

    /// Recommendations for every resource
    pub fn recommend(
        &self,
        series: &[TimeSeries],
        forecasts: &[ForecastResult],
        anomalies: &[AnomalyFlag],
        policy_results: &[PolicyResult],
        metadata: &[ResourceMetadata],
    ) -> RecommendationOutput {
        let bundles = Self::bundles(series, forecasts, anomalies, policy_results, metadata);
        let mut output = RecommendationOutput::default();
        for bundle in &bundles {
            output.merge(self.recommend_resource(bundle));
        }
        info!(
            "Generated {} recommendations for {} resources ({} omissions)",
            output.recommendations.len(),
            bundles.len(),
            output.omissions.len()
        );
        output
    }
}
