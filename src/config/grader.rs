// src/config/grader.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::grading::llm::{DEFAULT_MAX_PROMPT_CHARS, DEFAULT_MODEL};
use crate::grading::rubric::RubricWeights;

pub const DEFAULT_GRADER_CONFIG_PATH: &str = "config/grader.toml";
pub const ENV_GRADER_CONFIG_PATH: &str = "GRADER_CONFIG_PATH";
pub const ENV_LLM_ENABLED: &str = "GRADER_LLM_ENABLED";
pub const ENV_LLM_MODEL: &str = "GRADER_LLM_MODEL";

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_ms() -> u64 {
    12_000
}
fn default_connect_timeout_ms() -> u64 {
    4_000
}
fn default_max_prompt_chars() -> usize {
    DEFAULT_MAX_PROMPT_CHARS
}
fn default_max_tokens() -> u32 {
    700
}

/// Remote model settings. Disabled unless the config (or env) turns it on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_prompt_chars: default_max_prompt_chars(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// True when the key is still the "ENV" placeholder or empty.
    pub fn key_unresolved(&self) -> bool {
        let k = self.api_key.trim();
        k.is_empty() || k.eq_ignore_ascii_case("env")
    }
}

/// Root of `config/grader.toml`. Every table and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraderConfig {
    #[serde(default)]
    pub rubric: RubricWeights,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl GraderConfig {
    /// Load using GRADER_CONFIG_PATH or "config/grader.toml".
    /// A missing default file yields built-in defaults; a missing explicit path is an error.
    pub fn load_default() -> anyhow::Result<Self> {
        match env::var(ENV_GRADER_CONFIG_PATH) {
            Ok(p) if !p.trim().is_empty() => Self::load_from_file(PathBuf::from(p)),
            _ => {
                let path = PathBuf::from(DEFAULT_GRADER_CONFIG_PATH);
                if path.exists() {
                    Self::load_from_file(path)
                } else {
                    tracing::info!(path = DEFAULT_GRADER_CONFIG_PATH, "grader config not found; using defaults");
                    Self::from_toml_str("")
                }
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read grader config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&data)
    }

    /// Parse, apply env overrides, normalize and resolve the API key.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: GraderConfig = toml::from_str(toml_str)?;

        if let Some(on) = parse_bool_env(env::var(ENV_LLM_ENABLED).ok()) {
            cfg.llm.enabled = on;
        }
        if let Ok(model) = env::var(ENV_LLM_MODEL) {
            if !model.trim().is_empty() {
                cfg.llm.model = model.trim().to_string();
            }
        }

        // Normalize
        cfg.rubric = cfg.rubric.sanitized();
        cfg.llm.provider = cfg.llm.provider.trim().to_lowercase();
        if cfg.llm.max_prompt_chars == 0 {
            cfg.llm.max_prompt_chars = default_max_prompt_chars();
        }
        if cfg.llm.timeout_ms == 0 {
            cfg.llm.timeout_ms = default_timeout_ms();
        }

        // Resolve api key if "ENV"
        if cfg.llm.key_unresolved() {
            match cfg.llm.provider.as_str() {
                "openai" => match env::var("OPENAI_API_KEY") {
                    Ok(k) if !k.trim().is_empty() => cfg.llm.api_key = k.trim().to_string(),
                    _ if cfg.llm.enabled && !test_mode_active() => {
                        anyhow::bail!("Missing OPENAI_API_KEY env var")
                    }
                    _ => {}
                },
                other if cfg.llm.enabled => anyhow::bail!("Unsupported provider in config: {other}"),
                _ => {}
            }
        }

        Ok(cfg)
    }
}

fn parse_bool_env(raw: Option<String>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// AI_TEST_MODE swaps the provider for a mock, so no key is needed.
fn test_mode_active() -> bool {
    env::var("AI_TEST_MODE")
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}
