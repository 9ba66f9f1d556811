//! Savings recommendations
//!
//! Analyzers for right-sizing, idle resources, storage tiering, reserved
//! capacity and bandwidth each look at one resource at a time. Their candidates
//! are scored for confidence, and mutually exclusive candidates for the same
//! resource are resolved before ranking.

mod confidence;
mod config;
mod context;
mod engine;
mod network;
mod pricing;
mod reserved;
mod rightsizing;
mod storage;
mod types;

pub use confidence::{confidence_score, corroboration, DEFAULT_FIT};
pub use config::{
    BandwidthConfig, RecommendationConfig, ReservedPlanningConfig, RightSizingConfig,
    StorageTieringConfig,
};
pub use context::{ResourceBundle, ResourceMetadata, DAYS_PER_MONTH};
pub use engine::{resolve_conflicts, RecommendationEngine};
pub use pricing::{
    BandwidthOffer, PaymentOption, PricingCatalog, ReservedOffer, ReservedTerm, SizeTierPrice,
    StaticPricingCatalog, StorageTier, TrafficClass,
};
pub use types::{
    ConflictGroup, Evidence, Recommendation, RecommendationAction, RecommendationOutput,
    RecommendationType, RiskLevel,
};
