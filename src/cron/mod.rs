// src/cron/mod.rs

//! Scheduled cycles driven by an external scheduler hitting the cron
//! endpoints. Every entry point is safe to call more than once per period:
//! the hourly cycle just appends another log entry, the daily cycle is
//! guarded by wall-clock hour plus snapshot-file existence, and the weekly
//! cycle by wall-clock weekday. All three serialize on one mutex so two
//! overlapping triggers can never interleave archive and prune.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::alert::{AlertDispatcher, DispatchOutcome, Severity};
use crate::health::{overall_headline, HealthCheckEngine, RunMode};
use crate::store::archive::ArchiveManager;
use crate::store::event_log::{EventLog, LogEntry};
use crate::trend::{TrendAnalyzer, WeeklyRollup};

/// Who triggered a run. Only a one-way fingerprint of the caller's
/// credential is ever persisted.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub source_address: String,
    pub key_fingerprint: String,
}

impl CallerIdentity {
    pub fn new(source_address: impl Into<String>, access_key: &str) -> Self {
        Self {
            source_address: source_address.into(),
            key_fingerprint: key_fingerprint(access_key),
        }
    }
}

/// First 16 hex chars of SHA-256, enough to correlate callers in the log
/// without being reversible.
pub fn key_fingerprint(access_key: &str) -> String {
    if access_key.is_empty() {
        return "no-key".to_string();
    }
    let digest = Sha256::digest(access_key.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyOutcome {
    pub overall: Severity,
    pub total_entries: usize,
    pub alert: DispatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyOutcome {
    pub triggered: bool,
    pub archived: bool,
    pub pruned: usize,
    pub cleaned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DispatchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<WeeklyOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyOutcome {
    pub triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup: Option<WeeklyRollup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<DispatchOutcome>,
}

pub struct CronOrchestrator {
    engine: Arc<HealthCheckEngine>,
    log: EventLog,
    archive: ArchiveManager,
    dispatcher: Arc<AlertDispatcher>,
    trend: TrendAnalyzer,
    daily_hour: u32,
    weekly_day: Weekday,
    retention_days: i64,
    // Single-writer guard across all cycles.
    lock: Mutex<()>,
}

impl CronOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<HealthCheckEngine>,
        log: EventLog,
        archive: ArchiveManager,
        dispatcher: Arc<AlertDispatcher>,
        trend: TrendAnalyzer,
        daily_hour: u32,
        weekly_day: Weekday,
        retention_days: i64,
    ) -> Self {
        Self {
            engine,
            log,
            archive,
            dispatcher,
            trend,
            daily_hour,
            weekly_day,
            retention_days,
            lock: Mutex::new(()),
        }
    }

    /// Hourly cycle: one read-only health check, logged and alerted on.
    pub async fn run_hourly(&self, caller: &CallerIdentity) -> crate::error::Result<HourlyOutcome> {
        let _guard = self.lock.lock().await;

        let report = self.engine.run(RunMode::ReadOnly).await;
        let entry = LogEntry::from_report(&report, &caller.source_address, &caller.key_fingerprint);
        let total_entries = self.log.append(entry)?;

        let subject = overall_headline(report.overall);
        let body = json!({
            "sdk": report.checks.sdk.message,
            "environment": report.checks.environment.message,
            "codebase": report.checks.codebase.message,
            "time": report.timestamp,
        });
        let alert = self.dispatcher.dispatch(report.overall, subject, &body).await;

        info!(
            "hourly cycle complete: overall={} entries={}",
            report.overall, total_entries
        );
        Ok(HourlyOutcome {
            overall: report.overall,
            total_entries,
            alert,
        })
    }

    /// Daily cycle: snapshot, then prune, then retention cleanup. Only runs
    /// at the configured UTC hour; the snapshot itself is once-per-date, so
    /// repeated triggers inside that hour do no further archival work. When
    /// the day is also the weekly trigger day, the weekly cycle runs in the
    /// same critical section.
    pub async fn run_daily(&self, now: DateTime<Utc>) -> crate::error::Result<DailyOutcome> {
        let _guard = self.lock.lock().await;
        self.daily_inner(now).await
    }

    /// Weekly cycle: trend rollup plus a summary alert. Only runs on the
    /// configured weekday.
    pub async fn run_weekly(&self, now: DateTime<Utc>) -> crate::error::Result<WeeklyOutcome> {
        let _guard = self.lock.lock().await;
        self.weekly_inner(now).await
    }

    async fn daily_inner(&self, now: DateTime<Utc>) -> crate::error::Result<DailyOutcome> {
        if now.hour() != self.daily_hour {
            return Ok(DailyOutcome {
                triggered: false,
                archived: false,
                pruned: 0,
                cleaned: 0,
                summary: None,
                weekly: None,
            });
        }

        // Archive strictly before pruning; the snapshot is the only place
        // pruned entries survive.
        let archived = self.archive.snapshot_if_missing(&self.log, now.date_naive())?;

        let trend = self.trend.daily_trend(7, now);
        let summary = if let Some(today) = trend.last() {
            let level = if today.error_count > 0 {
                Severity::Warn
            } else {
                Severity::Ok
            };
            let subject = format!(
                "daily summary: {} run(s) today, {}% success",
                today.error_count + today.warn_count + today.ok_count,
                today.success_rate
            );
            let body = serde_json::to_value(&trend).unwrap_or_default();
            Some(self.dispatcher.dispatch(level, &subject, &body).await)
        } else {
            None
        };

        let pruned = self.log.prune(self.log.max_active())?;
        let cleaned = self.archive.cleanup_older_than(self.retention_days, now)?;

        let weekly = if now.weekday() == self.weekly_day {
            Some(self.weekly_inner(now).await?)
        } else {
            None
        };

        info!(
            "daily cycle complete: archived={} pruned={} cleaned={}",
            archived, pruned, cleaned
        );
        Ok(DailyOutcome {
            triggered: true,
            archived,
            pruned,
            cleaned,
            summary,
            weekly,
        })
    }

    async fn weekly_inner(&self, now: DateTime<Utc>) -> crate::error::Result<WeeklyOutcome> {
        if now.weekday() != self.weekly_day {
            return Ok(WeeklyOutcome {
                triggered: false,
                rollup: None,
                alert: None,
            });
        }

        let rollup = self.trend.weekly_rollup(now);
        let level = if rollup.confidence < 50 {
            Severity::Error
        } else if rollup.confidence < 80 {
            Severity::Warn
        } else {
            Severity::Ok
        };
        let subject = format!(
            "weekly rollup: {}% confidence ({} runs)",
            rollup.confidence, rollup.this_week.total
        );
        let body = serde_json::to_value(&rollup).unwrap_or_default();
        let alert = self.dispatcher.dispatch(level, &subject, &body).await;

        info!("weekly cycle complete: confidence={}", rollup.confidence);
        Ok(WeeklyOutcome {
            triggered: true,
            rollup: Some(rollup),
            alert: Some(alert),
        })
    }
}
