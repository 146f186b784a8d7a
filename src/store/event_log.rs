// src/store/event_log.rs
// Append-only, size-bounded store of health reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::write_json_atomic;
use crate::alert::Severity;
use crate::error::StorageError;
use crate::health::{overall_headline, Report, RunMode};

/// A persisted, denormalized projection of a [`Report`] plus caller
/// metadata. Never updated; deleted only by pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic within one store, seeded from epoch millis.
    pub id: i64,
    pub time: DateTime<Utc>,
    pub source_address: String,
    /// One-way hash prefix of the caller's credential, never the raw key.
    pub caller_key_fingerprint: String,
    pub mode: RunMode,
    pub overall: Severity,
    pub sdk: String,
    pub environment: String,
    pub codebase: String,
}

impl LogEntry {
    /// Project a report into its persisted form. The id is assigned by
    /// [`EventLog::append`].
    pub fn from_report(report: &Report, source_address: &str, caller_key_fingerprint: &str) -> Self {
        Self {
            id: 0,
            time: report.timestamp,
            source_address: source_address.to_string(),
            caller_key_fingerprint: caller_key_fingerprint.to_string(),
            mode: report.mode,
            overall: report.overall,
            sdk: report.checks.sdk.message.clone(),
            environment: report.checks.environment.message.clone(),
            codebase: report.checks.codebase.message.clone(),
        }
    }
}

/// Single-slot cache of the most recent health run. Overwritten by every
/// append, even when no alert is dispatched; distinct from the dispatcher's
/// last-alert slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthState {
    pub level: Severity,
    pub message: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    health_path: PathBuf,
    max_active: usize,
}

impl EventLog {
    pub fn new(data_dir: &Path, max_active: usize) -> Self {
        Self {
            path: data_dir.join("health-log.json"),
            health_path: data_dir.join("last-health.json"),
            max_active,
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                op: "create directory",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// All entries, oldest first. A missing file is an empty log. Callers
    /// may re-read freely; reading has no side effects.
    pub fn read_all(&self) -> Result<Vec<LogEntry>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| StorageError::Io {
            op: "read",
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Append one entry, dropping the oldest overflow in the same operation
    /// when the bound is exceeded. An unreadable log is treated as empty
    /// rather than aborting (availability over strict durability); write
    /// failures propagate. Returns the resulting total count.
    pub fn append(&self, mut entry: LogEntry) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("health log unreadable, starting fresh: {}", e);
                Vec::new()
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        entry.id = match entries.last() {
            Some(last) if last.id >= now_ms => last.id + 1,
            _ => now_ms,
        };

        entries.push(entry.clone());
        if entries.len() > self.max_active {
            let overflow = entries.len() - self.max_active;
            entries.drain(..overflow);
        }

        write_json_atomic(&self.path, &entries)?;

        let state = HealthState {
            level: entry.overall,
            message: overall_headline(entry.overall).to_string(),
            time: entry.time,
        };
        if let Err(e) = write_json_atomic(&self.health_path, &state) {
            warn!("failed to update last-health cache: {}", e);
        }

        Ok(entries.len())
    }

    /// Explicit truncation for the daily cycle. Keeps the `max_active` most
    /// recent entries; returns how many were dropped.
    pub fn prune(&self, max_active: usize) -> Result<usize, StorageError> {
        let mut entries = self.read_all()?;
        if entries.len() <= max_active {
            return Ok(0);
        }

        let overflow = entries.len() - max_active;
        let retained = entries.split_off(overflow);
        write_json_atomic(&self.path, &retained)?;
        info!("pruned {} old health log entries", overflow);
        Ok(overflow)
    }

    /// The last-health single-slot cache, if any run has been recorded.
    pub fn last_health(&self) -> Option<HealthState> {
        let raw = std::fs::read_to_string(&self.health_path).ok()?;
        serde_json::from_str(&raw).ok()
    }
}
