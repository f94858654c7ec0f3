use std::time::Duration;

use anyhow::{Context, Result};

use crate::extraction::estimator::HeuristicEstimator;
use crate::extraction::orchestrator::ExtractionStrategy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub llm_timeout: Duration,
    pub extraction_strategy: ExtractionStrategy,
    pub estimation_policy: HeuristicEstimator,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let strategy_name = env_or("EXTRACTION_STRATEGY", "chat");
        let extraction_strategy = ExtractionStrategy::by_name(&strategy_name).with_context(|| {
            format!("EXTRACTION_STRATEGY must be 'chat' or 'generate', got '{strategy_name}'")
        })?;

        let policy_name = env_or("ESTIMATION_POLICY", "current");
        let estimation_policy = HeuristicEstimator::by_name(&policy_name).with_context(|| {
            format!("ESTIMATION_POLICY must be 'current' or 'legacy', got '{policy_name}'")
        })?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            ollama_base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: env_or("OLLAMA_MODEL", "llama3.1"),
            llm_timeout: Duration::from_secs(
                env_or("LLM_TIMEOUT_SECS", "300")
                    .parse::<u64>()
                    .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            extraction_strategy,
            estimation_policy,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", "10485760")
                .parse::<usize>()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
