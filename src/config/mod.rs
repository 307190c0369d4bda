// src/config/mod.rs
pub mod grader;

pub use grader::{GraderConfig, LlmConfig, DEFAULT_GRADER_CONFIG_PATH, ENV_GRADER_CONFIG_PATH};
