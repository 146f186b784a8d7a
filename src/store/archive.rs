// src/store/archive.rs
// Daily point-in-time snapshots of the event log, one file per UTC date.

use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::event_log::{EventLog, LogEntry};
use super::write_json_atomic;
use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct ArchiveManager {
    dir: PathBuf,
}

impl ArchiveManager {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("archive"),
        }
    }

    fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::Io {
            op: "create directory",
            path: self.dir.clone(),
            source: e,
        })
    }

    /// Copy the current event log contents into a snapshot keyed by `date`,
    /// unless one already exists (first writer wins). Must run before any
    /// same-cycle prune, or a turn of pruning is lost to history. Returns
    /// whether a new snapshot was written.
    pub fn snapshot_if_missing(&self, log: &EventLog, date: NaiveDate) -> Result<bool, StorageError> {
        self.ensure_dir()?;

        let path = self.snapshot_path(date);
        if path.exists() {
            return Ok(false);
        }

        let entries = match log.read_all() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("event log unreadable while archiving, snapshotting empty: {}", e);
                Vec::new()
            }
        };

        write_json_atomic(&path, &entries)?;
        info!("archived daily snapshot: {}", path.display());
        Ok(true)
    }

    /// Delete snapshots whose date key is strictly older than
    /// `now - retention_days`. Files whose names do not parse as a date are
    /// skipped, never deleted. Returns how many were removed.
    pub fn cleanup_older_than(
        &self,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let cutoff = (now - chrono::Duration::days(retention_days)).date_naive();
        let read_dir = std::fs::read_dir(&self.dir).map_err(|e| StorageError::Io {
            op: "read directory",
            path: self.dir.clone(),
            source: e,
        })?;

        let mut deleted = 0;
        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                // Never destroy data we cannot positively classify.
                continue;
            };

            if date < cutoff {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("failed to delete archive {}: {}", path.display(), e);
                } else {
                    deleted += 1;
                }
            }
        }

        if deleted > 0 {
            info!(
                "cleaned {} archive snapshot(s) older than {} days",
                deleted, retention_days
            );
        }
        Ok(deleted)
    }

    /// Read one day's snapshot, if present and parseable.
    pub fn read_snapshot(&self, date: NaiveDate) -> Option<Vec<LogEntry>> {
        let raw = std::fs::read_to_string(self.snapshot_path(date)).ok()?;
        serde_json::from_str(&raw).ok()
    }
}
