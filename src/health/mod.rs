// src/health/mod.rs

//! Health-check engine: three independent probes (codebase scan, environment
//! validation, live Gemini call) folded into one immutable [`Report`]. A
//! probe failing never aborts the other two; failures become structured
//! findings with a typed severity.

pub mod codebase;
pub mod environment;
pub mod gemini;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::alert::Severity;
use codebase::CodebaseScanner;
use environment::EnvironmentCheck;
use gemini::LiveProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    #[serde(rename = "read-only")]
    ReadOnly,
    #[serde(rename = "dry-run")]
    DryRun,
    #[serde(rename = "repair")]
    Repair,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::ReadOnly => "read-only",
            RunMode::DryRun => "dry-run",
            RunMode::Repair => "repair",
        };
        write!(f, "{}", s)
    }
}

/// One probe's result: typed severity from the moment of production, a
/// human message, and structured detail for the dashboard collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub severity: Severity,
    pub message: String,
    pub detail: Value,
}

impl ProbeReport {
    pub fn ok(message: impl Into<String>, detail: Value) -> Self {
        Self {
            severity: Severity::Ok,
            message: message.into(),
            detail,
        }
    }

    pub fn warn(message: impl Into<String>, detail: Value) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
            detail,
        }
    }

    pub fn error(message: impl Into<String>, detail: Value) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            detail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checks {
    pub codebase: ProbeReport,
    pub environment: ProbeReport,
    pub sdk: ProbeReport,
}

/// The result of one health-check run. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub mode: RunMode,
    pub checks: Checks,
    pub overall: Severity,
}

/// One-line summary for the last-health cache and alert subjects.
pub fn overall_headline(overall: Severity) -> &'static str {
    match overall {
        Severity::Ok => "everything looks good",
        Severity::Warn => "some issues detected",
        Severity::Error => "critical failure detected",
    }
}

pub struct HealthCheckEngine {
    scanner: CodebaseScanner,
    env_check: EnvironmentCheck,
    probe: Arc<dyn LiveProbe>,
}

impl HealthCheckEngine {
    pub fn new(
        scanner: CodebaseScanner,
        env_check: EnvironmentCheck,
        probe: Arc<dyn LiveProbe>,
    ) -> Self {
        Self {
            scanner,
            env_check,
            probe,
        }
    }

    /// Run all three probes sequentially and fold them into one report.
    /// `overall` is `error` if the live probe is unhealthy, `warn` if the
    /// environment or codebase probes produced findings, else `ok`.
    pub async fn run(&self, mode: RunMode) -> Report {
        debug!("running health check ({} mode)", mode);

        let codebase = self.scanner.check();
        let environment = self.env_check.check();
        let sdk = self.probe.check().await;

        let overall = if sdk.severity == Severity::Error {
            Severity::Error
        } else if environment.severity >= Severity::Warn || codebase.severity >= Severity::Warn {
            Severity::Warn
        } else {
            Severity::Ok
        };

        Report {
            timestamp: Utc::now(),
            mode,
            checks: Checks {
                codebase,
                environment,
                sdk,
            },
            overall,
        }
    }
}
