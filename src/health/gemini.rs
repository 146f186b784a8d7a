// src/health/gemini.rs
// Live probe against the Google AI API: one lightweight generateContent
// call with a bounded timeout. Any failure, timeout, or empty response is
// an unhealthy finding; raw errors are truncated so the public-facing
// payload never carries a stack trace.

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::environment::{read_env_file, resolve_key, PRIVATE_KEYS};
use super::ProbeReport;
use crate::error::VigilError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROBE_PROMPT: &str = "Return the word 'ok'.";
const MAX_ERROR_LEN: usize = 200;
const MAX_RESPONSE_ECHO: usize = 100;

/// The live external-service check. Abstracted so tests and offline
/// deployments can substitute a double.
#[async_trait]
pub trait LiveProbe: Send + Sync {
    async fn check(&self) -> ProbeReport;
}

pub struct GeminiProbe {
    client: reqwest::Client,
    base_url: String,
    model: String,
    env_file: PathBuf,
}

impl GeminiProbe {
    pub fn new(model: String, timeout_secs: u64, env_file: PathBuf) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            env_file,
        }
    }

    /// Point the probe at a different endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn api_key(&self) -> Option<String> {
        resolve_key(&read_env_file(&self.env_file), PRIVATE_KEYS)
    }

    async fn generate(&self, api_key: &str) -> crate::error::Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );
        let request_body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": PROBE_PROMPT}]
            }],
            "generationConfig": {
                "maxOutputTokens": 16
            }
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| VigilError::Probe(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VigilError::Probe(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VigilError::Probe(e.to_string()))?;
        let text = body["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(VigilError::Probe("response contained no text".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LiveProbe for GeminiProbe {
    async fn check(&self) -> ProbeReport {
        let Some(api_key) = self.api_key() else {
            return ProbeReport::error(
                "SDK call failed: no API key found in env",
                json!({ "model": self.model, "healthy": false }),
            );
        };

        match self.generate(&api_key).await {
            Ok(text) => {
                let healthy = text.to_lowercase().contains("ok");
                let echo = truncate(&text, MAX_RESPONSE_ECHO);
                debug!("gemini probe responded: {}", echo);
                let detail = json!({
                    "model": self.model,
                    "response": echo,
                    "healthy": healthy,
                });
                if healthy {
                    ProbeReport::ok("Gemini API responding normally", detail)
                } else {
                    ProbeReport::error(format!("unexpected response: {}", echo), detail)
                }
            }
            Err(e) => {
                let reason = match e {
                    VigilError::Probe(reason) => reason,
                    other => other.to_string(),
                };
                ProbeReport::error(
                    format!("SDK call failed: {}", truncate(&reason, MAX_ERROR_LEN)),
                    json!({ "model": self.model, "healthy": false }),
                )
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}
