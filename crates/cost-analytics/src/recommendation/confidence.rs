//! Confidence scoring
//!
//! Each recommendation type blends data completeness, forecast fit and anomaly
//! corroboration with its own weights. Weights per type sum to one.

use super::types::RecommendationType;
use crate::anomaly::AnomalyFlag;

/// Fit assumed when no forecast backs a recommendation
pub const DEFAULT_FIT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Weights {
    completeness: f64,
    fit: f64,
    corroboration: f64,
}

fn weights(recommendation_type: RecommendationType) -> Weights {
    let (completeness, fit, corroboration) = match recommendation_type {
        RecommendationType::RightSize => (0.6, 0.2, 0.2),
        RecommendationType::StorageTier => (0.7, 0.0, 0.3),
        RecommendationType::ReservedCapacity => (0.4, 0.4, 0.2),
        RecommendationType::Bandwidth => (0.5, 0.3, 0.2),
        RecommendationType::Decommission => (0.7, 0.0, 0.3),
    };
    Weights {
        completeness,
        fit,
        corroboration,
    }
}

/// One when the evidence series carry no anomaly flags, else one minus the worst severity
pub fn corroboration<'a>(flags: impl IntoIterator<Item = &'a AnomalyFlag>) -> f64 {
    let worst = flags
        .into_iter()
        .map(|f| f.severity)
        .fold(0.0_f64, f64::max);
    (1.0 - worst).clamp(0.0, 1.0)
}

/// Weighted confidence in [0, 1]
pub fn confidence_score(
    recommendation_type: RecommendationType,
    completeness: f64,
    fit: Option<f64>,
    corroboration: f64,
) -> f64 {
    let w = weights(recommendation_type);
    let fit = fit.unwrap_or(DEFAULT_FIT);
    let score = w.completeness * completeness.clamp(0.0, 1.0)
        + w.fit * fit.clamp(0.0, 1.0)
        + w.corroboration * corroboration.clamp(0.0, 1.0);
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_sum_to_one() {
        for t in [
            RecommendationType::RightSize,
            RecommendationType::StorageTier,
            RecommendationType::ReservedCapacity,
            RecommendationType::Bandwidth,
            RecommendationType::Decommission,
        ] {
            let w = weights(t);
            assert_relative_eq!(w.completeness + w.fit + w.corroboration, 1.0);
        }
    }

    #[test]
    fn test_rightsizing_score() {
        let score = confidence_score(RecommendationType::RightSize, 1.0, Some(0.5), 1.0);
        assert_relative_eq!(score, 0.9);
    }

    #[test]
    fn test_missing_fit_uses_default() {
        let with_default = confidence_score(RecommendationType::ReservedCapacity, 1.0, None, 1.0);
        let explicit = confidence_score(RecommendationType::ReservedCapacity, 1.0, Some(DEFAULT_FIT), 1.0);
        assert_relative_eq!(with_default, explicit);
    }

    #[test]
    fn test_no_flags_is_full_corroboration() {
        assert_relative_eq!(corroboration(std::iter::empty()), 1.0);
    }
}
