// src/alert/mod.rs
//
// Severity-gated alert dispatch. The outbound provider is only invoked at or
// above the configured minimum level; provider errors are logged and
// swallowed so alerting can never block the health pipeline. The most recent
// provider attempt is cached in a single-slot file for poll-based consumers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::write_json_atomic;

/// Typed severity carried alongside every finding from the moment a probe
/// produces it. Ordering follows declaration: Ok < Warn < Error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "info")]
    Ok,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" | "info" => Ok(Severity::Ok),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(anyhow::anyhow!("unknown severity: {}", s)),
        }
    }
}

/// The most recently dispatched notification. Overwritten on every provider
/// attempt; a single-slot cache, not a log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub level: Severity,
    pub message: String,
    pub time: DateTime<Utc>,
    pub provider: String,
    pub recipient: String,
}

/// Outbound notification collaborator. Either succeeds or raises; the
/// dispatcher never treats its failure as fatal.
#[async_trait]
pub trait AlertProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, level: Severity, subject: &str, body: &Value) -> anyhow::Result<()>;
}

/// Posts alerts as JSON to a configured webhook endpoint.
pub struct WebhookProvider {
    client: reqwest::Client,
    url: String,
}

impl WebhookProvider {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl AlertProvider for WebhookProvider {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, level: Severity, subject: &str, body: &Value) -> anyhow::Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("ALERTS_WEBHOOK_URL is not configured");
        }

        let payload = serde_json::json!({
            "level": level,
            "subject": subject,
            "body": body,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {}: {}", status, text);
        }

        Ok(())
    }
}

/// Fallback provider that only writes alerts to the service log. Used when
/// no webhook is configured so deployments without an outbound channel
/// still keep the dispatch path exercised.
pub struct LogProvider;

#[async_trait]
impl AlertProvider for LogProvider {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, level: Severity, subject: &str, _body: &Value) -> anyhow::Result<()> {
        warn!("alert [{}] {}", level, subject);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub sent: bool,
    pub level: Severity,
    pub provider_error: Option<String>,
}

/// Stateless apart from the cached last-alert slot; each dispatch call is a
/// complete, independent transaction.
pub struct AlertDispatcher {
    provider: Arc<dyn AlertProvider>,
    min_level: Severity,
    recipient: String,
    last_alert_path: PathBuf,
}

impl AlertDispatcher {
    pub fn new(
        provider: Arc<dyn AlertProvider>,
        min_level: Severity,
        recipient: String,
        data_dir: &Path,
    ) -> Self {
        Self {
            provider,
            min_level,
            recipient,
            last_alert_path: data_dir.join("last-alert.json"),
        }
    }

    /// Compare `level` against the configured minimum; below threshold the
    /// provider is not called and the last-alert slot stays untouched. At or
    /// above threshold, delegate to the provider (fail-soft) and overwrite
    /// the slot with the attempt.
    pub async fn dispatch(&self, level: Severity, subject: &str, body: &Value) -> DispatchOutcome {
        if level < self.min_level {
            debug!(
                "alert '{}' below threshold ({} < {}), not dispatched",
                subject, level, self.min_level
            );
            return DispatchOutcome {
                sent: false,
                level,
                provider_error: None,
            };
        }

        let provider_error = match self.provider.send(level, subject, body).await {
            Ok(()) => None,
            Err(e) => {
                warn!("alert provider '{}' failed: {:#}", self.provider.name(), e);
                Some(e.to_string())
            }
        };

        let record = AlertRecord {
            level,
            message: subject.to_string(),
            time: Utc::now(),
            provider: self.provider.name().to_string(),
            recipient: self.recipient.clone(),
        };
        if let Err(e) = write_json_atomic(&self.last_alert_path, &record) {
            warn!("failed to update last-alert cache: {}", e);
        }

        DispatchOutcome {
            sent: provider_error.is_none(),
            level,
            provider_error,
        }
    }

    /// Cheap poll-friendly read of the last dispatched alert. `None` means
    /// nothing has been dispatched yet.
    pub fn last_alert(&self) -> Option<AlertRecord> {
        let raw = std::fs::read_to_string(&self.last_alert_path).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records calls instead of sending; optionally fails every send.
    struct RecordingProvider {
        calls: Mutex<Vec<(Severity, String)>>,
        fail: bool,
    }

    impl RecordingProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AlertProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, level: Severity, subject: &str, _body: &Value) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((level, subject.to_string()));
            if self.fail {
                anyhow::bail!("simulated provider outage");
            }
            Ok(())
        }
    }

    fn dispatcher(provider: Arc<RecordingProvider>, dir: &TempDir) -> AlertDispatcher {
        AlertDispatcher::new(provider, Severity::Warn, "ops".to_string(), dir.path())
    }

    #[test]
    fn test_severity_ordering_and_parsing() {
        assert!(Severity::Ok < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
        assert_eq!("info".parse::<Severity>().unwrap(), Severity::Ok);
        assert_eq!("error".parse::<Severity>().unwrap(), Severity::Error);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[tokio::test]
    async fn test_below_threshold_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let provider = RecordingProvider::new(false);
        let dispatcher = dispatcher(provider.clone(), &dir);

        let outcome = dispatcher
            .dispatch(Severity::Ok, "all healthy", &serde_json::json!({}))
            .await;

        assert!(!outcome.sent);
        assert_eq!(provider.call_count(), 0);
        assert!(dispatcher.last_alert().is_none());
    }

    #[tokio::test]
    async fn test_at_threshold_is_sent_and_cached() {
        let dir = TempDir::new().unwrap();
        let provider = RecordingProvider::new(false);
        let dispatcher = dispatcher(provider.clone(), &dir);

        let outcome = dispatcher
            .dispatch(Severity::Error, "probe down", &serde_json::json!({}))
            .await;

        assert!(outcome.sent);
        assert_eq!(provider.call_count(), 1);

        let record = dispatcher.last_alert().expect("cached record");
        assert_eq!(record.level, Severity::Error);
        assert_eq!(record.message, "probe down");
        assert_eq!(record.provider, "recording");
    }

    #[tokio::test]
    async fn test_provider_failure_is_soft() {
        let dir = TempDir::new().unwrap();
        let provider = RecordingProvider::new(true);
        let dispatcher = dispatcher(provider.clone(), &dir);

        let outcome = dispatcher
            .dispatch(Severity::Warn, "degraded", &serde_json::json!({}))
            .await;

        assert!(!outcome.sent);
        assert!(outcome.provider_error.is_some());
        // The slot still reflects the attempt
        assert_eq!(dispatcher.last_alert().unwrap().message, "degraded");
    }

    #[tokio::test]
    async fn test_last_alert_reflects_most_recent_call() {
        let dir = TempDir::new().unwrap();
        let provider = RecordingProvider::new(false);
        let dispatcher = dispatcher(provider.clone(), &dir);

        dispatcher
            .dispatch(Severity::Warn, "first", &serde_json::json!({}))
            .await;
        dispatcher
            .dispatch(Severity::Error, "second", &serde_json::json!({}))
            .await;

        assert_eq!(dispatcher.last_alert().unwrap().message, "second");
    }
}
