use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::dispatch::ModelTransport;
use crate::error::VerdictError;

const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Generic OpenAI-compatible chat-completions transport. Vendor specifics
/// (endpoint, model name, key) come from configuration; everything else in
/// the crate only sees raw response text or a classified error.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    provider: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

impl HttpTransport {
    pub fn from_config(config: &Config) -> Result<Self, VerdictError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| VerdictError::Config("VERDICT_API_KEY is required".to_string()))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        let provider = provider_label(&config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
            provider,
        })
    }
}

impl ModelTransport for HttpTransport {
    async fn call_once(&self, prompt: &str, max_tokens: u64) -> Result<String, VerdictError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}]
        });

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerdictError::Timeout(REQUEST_TIMEOUT.as_millis() as u64)
                } else {
                    VerdictError::Request(e)
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(VerdictError::RateLimited {
                provider: self.provider.clone(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(VerdictError::AuthFailed {
                provider: self.provider.clone(),
                message: format!("{status}"),
            });
        }

        // Catch-all for any non-success status (4xx, 5xx, 3xx that wasn't followed).
        // Cap error body reads to MAX_RESPONSE_BYTES to prevent memory exhaustion.
        if !status.is_success() {
            let error_bytes = response.bytes().await.unwrap_or_default();
            let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
            let text = String::from_utf8_lossy(truncated);
            return Err(VerdictError::Upstream {
                provider: self.provider.clone(),
                message: format!("{status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        // Enforce response size limit before parsing.
        let bytes = response.bytes().await.map_err(|e| VerdictError::Upstream {
            provider: self.provider.clone(),
            message: format!("failed to read response body: {e}"),
            status: None,
        })?;

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(VerdictError::Upstream {
                provider: self.provider.clone(),
                message: format!(
                    "response too large: {} bytes (max {})",
                    bytes.len(),
                    MAX_RESPONSE_BYTES
                ),
                status: None,
            });
        }

        let completion: ChatCompletion = serde_json::from_slice(&bytes)
            .map_err(|e| VerdictError::SchemaParse(format!("failed to parse response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| VerdictError::Upstream {
                provider: self.provider.clone(),
                message: "empty choices or null content".to_string(),
                status: None,
            })
    }
}

/// Short provider label for error messages, derived from the endpoint host.
fn provider_label(base_url: &str) -> String {
    base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("provider")
        .to_string()
}
