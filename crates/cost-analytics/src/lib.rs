//! Cost and utilization analytics
//!
//! This crate turns raw provider usage and billing records into:
//! - Canonical per-resource time series
//! - Trend and seasonal cost forecasts with confidence bands
//! - Anomaly flags from rolling or learned baselines
//! - Budget and tag policy compliance results
//! - Ranked savings recommendations (right-sizing, idle resources, storage
//!   tiering, reserved capacity, bandwidth)
//!
//! [`AnalysisPipeline`] runs all of them over one batch.

#![warn(missing_docs)]

pub mod anomaly;
pub mod config;
pub mod error;
pub mod forecast;
pub mod normalizer;
pub mod omission;
pub mod pipeline;
pub mod policy;
pub mod ranking;
pub mod recommendation;
pub mod series;

pub use config::AnalyticsConfig;
pub use error::{CostAnalyticsError, CostAnalyticsResult};
pub use omission::{Omission, ReasonCode};

// Canonical series
pub use series::{
    Dimensions, Granularity, MetricKind, SeriesId, SeriesPoint, TimeSeries, HOURS_PER_MONTH,
};

// Normalization
pub use normalizer::{GapPolicy, NormalizationOutput, Normalizer, NormalizerConfig, RawUsageRecord};

// Forecasting
pub use forecast::{
    BacktestReport, FactorAdjustment, ForecastConfig, ForecastEngine, ForecastFactors,
    ForecastPoint, ForecastResult, TrendDirection,
};

// Anomaly detection
pub use anomaly::{
    AnomalyConfig, AnomalyDetector, AnomalyDirection, AnomalyFlag, DetectionMethod, Sensitivity,
};

// Policy evaluation
pub use policy::{
    BudgetPolicy, BudgetScope, Policy, PolicyEvaluation, PolicyEvaluator, PolicyResult,
    PolicyStatus, TagPolicy, TagRule,
};

// Recommendations
pub use recommendation::{
    PricingCatalog, Recommendation, RecommendationConfig, RecommendationEngine,
    RecommendationType, ResourceMetadata, RiskLevel, StaticPricingCatalog,
};

// Ranking and pipeline
pub use pipeline::{AnalysisPipeline, AnalysisReport, AnalysisRequest, PipelineConfig, PipelineStats};
pub use ranking::{rank, RankingConfig};
