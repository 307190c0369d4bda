// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod grading;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::{GraderConfig, LlmConfig};
pub use crate::grading::{
    grade, grade_with_llm, GradeOptions, GradeRequest, GradeResult, GradeSource, LegacyGrade,
    LlmGrader, Verdict,
};

use axum::Router;

/// Build the full in-process app: config from `GRADER_CONFIG_PATH` (or
/// `config/grader.toml`), grading routes and `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let config = GraderConfig::load_default()?;
    let state = AppState::from_config(config);
    let metrics = metrics::Metrics::init()?;
    Ok(router(state).merge(metrics.router()))
}
