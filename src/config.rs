use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::error::VerdictError;

/// Default minimum gap between two consecutive model calls.
pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 1000;

/// Default trailing-window call ceiling (calls per 60s).
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: usize = 20;

/// Default retry budget per chunk dispatch.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default model output ceiling in tokens.
pub const DEFAULT_MAX_TOKENS: u64 = 8192;

/// Default batch fan-out width for concurrent content preparation.
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// Rough bytes-per-token used to derive the chunk byte budget from
/// `max_tokens`. Conservative on purpose: the prompt scaffolding around the
/// chunk also consumes input tokens.
const BYTES_PER_TOKEN: u64 = 4;

/// Hard ceiling on the chunk byte budget regardless of `max_tokens`.
const MAX_CHUNK_BUDGET_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the HTTP transport. Required to dispatch; validated at startup.
    pub api_key: Option<String>,
    /// Chat-completions endpoint URL.
    pub base_url: String,
    /// Model identifier sent in the request body.
    pub model: String,
    /// Model output ceiling. Also drives the chunk byte budget.
    pub max_tokens: u64,
    /// Retry budget per dispatch, bounds 1–10.
    pub retry_attempts: u32,
    pub min_request_interval_ms: u64,
    pub max_requests_per_minute: usize,
    /// Concurrent content-preparation width in batch mode.
    pub batch_size: usize,
}

/// Optional `verdict.toml` overlay. Every field is optional — absent fields
/// keep their environment/default values.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u64>,
    retry_attempts: Option<u32>,
    min_request_interval_ms: Option<u64>,
    max_requests_per_minute: Option<usize>,
    batch_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            min_request_interval_ms: DEFAULT_MIN_REQUEST_INTERVAL_MS,
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Load configuration: defaults → `verdict.toml` overlay (if present in
    /// the working directory) → environment overrides → validation.
    /// Validation failures are fatal at startup, never retried.
    pub fn load() -> Result<Self, VerdictError> {
        let mut config = Config::default();
        config.apply_file_overlay(Path::new("verdict.toml"))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_file_overlay(&mut self, path: &Path) -> Result<(), VerdictError> {
        if !path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| VerdictError::Config(format!("failed to read {}: {e}", path.display())))?;
        let file: FileConfig = toml::from_str(&raw)
            .map_err(|e| VerdictError::Config(format!("invalid {}: {e}", path.display())))?;

        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if let Some(v) = file.model {
            self.model = v;
        }
        if let Some(v) = file.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = file.retry_attempts {
            self.retry_attempts = v;
        }
        if let Some(v) = file.min_request_interval_ms {
            self.min_request_interval_ms = v;
        }
        if let Some(v) = file.max_requests_per_minute {
            self.max_requests_per_minute = v;
        }
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        self.api_key = env::var("VERDICT_API_KEY").ok().filter(|s| !s.is_empty());
        if self.api_key.is_none() {
            tracing::warn!("VERDICT_API_KEY not set — model dispatch unavailable");
        }

        if let Ok(v) = env::var("VERDICT_BASE_URL")
            && !v.is_empty()
        {
            self.base_url = v;
        }
        if let Ok(v) = env::var("VERDICT_MODEL")
            && !v.is_empty()
        {
            self.model = v;
        }
        if let Ok(v) = env::var("VERDICT_MAX_TOKENS")
            && let Ok(n) = v.parse()
        {
            self.max_tokens = n;
        }
        if let Ok(v) = env::var("VERDICT_RETRY_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            self.retry_attempts = n;
        }
    }

    /// Check numeric bounds. Called once at startup; a failure here is the
    /// only error class that stops the program.
    pub fn validate(&self) -> Result<(), VerdictError> {
        if !(1..=10).contains(&self.retry_attempts) {
            return Err(VerdictError::Config(format!(
                "retry_attempts must be in 1..=10, got {}",
                self.retry_attempts
            )));
        }
        if self.max_requests_per_minute == 0 {
            return Err(VerdictError::Config(
                "max_requests_per_minute must be nonzero".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(VerdictError::Config("max_tokens must be nonzero".to_string()));
        }
        if self.batch_size == 0 {
            return Err(VerdictError::Config("batch_size must be nonzero".to_string()));
        }
        Ok(())
    }

    /// Byte budget for a single chunk, derived from the model output ceiling.
    pub fn chunk_budget_bytes(&self) -> usize {
        ((self.max_tokens * BYTES_PER_TOKEN) as usize).min(MAX_CHUNK_BUDGET_BYTES)
    }
}
