//! Trend and forecast engine
//!
//! Fits an ordinary least squares trend on the deseasonalized series, adds a
//! classical additive seasonal term when at least two cycles of history exist,
//! and projects point estimates with horizon-widening confidence bands.

mod algorithms;
mod config;
mod decomposition;
mod engine;
mod model;
mod types;

pub use algorithms::{
    fit_linear_regression, mean_absolute_error, mean_absolute_percentage_error, r_squared,
    root_mean_squared_error, z_score,
};
pub use config::ForecastConfig;
pub use decomposition::decompose;
pub use engine::ForecastEngine;
pub use model::{MODEL_LINEAR, MODEL_SEASONAL};
pub use types::{
    AccuracyMetrics, BacktestReport, FactorAdjustment, ForecastFactors, ForecastPoint,
    ForecastResult, SeasonalDecomposition, TrendDirection, TrendSummary,
};
