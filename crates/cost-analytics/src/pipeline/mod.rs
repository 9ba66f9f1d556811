//! Batch analysis pipeline tying every component together

mod config;
mod metrics;
mod report;
mod runner;

pub use config::PipelineConfig;
pub use metrics::PipelineStats;
pub use report::{AnalysisReport, AnalysisRequest};
pub use runner::AnalysisPipeline;
