// src/trend/mod.rs

//! Buckets event log entries by day and by week, producing trend series and
//! week-over-week rollups. Everything here is derived on demand from the
//! active log merged with archive snapshots; nothing is persisted.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::store::archive::ArchiveManager;
use crate::store::event_log::{EventLog, LogEntry};
use crate::alert::Severity;

/// Tallies for one UTC calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub error_count: usize,
    pub warn_count: usize,
    pub ok_count: usize,
    pub success_rate: u8,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WeeklySummary {
    pub total: usize,
    pub errors: usize,
    pub warns: usize,
    pub oks: usize,
    pub success_rate: u8,
}

/// Week-over-week change vector (this week minus last week).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WeeklyDelta {
    pub errors: i64,
    pub warns: i64,
    pub oks: i64,
    pub success_rate: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyRollup {
    pub this_week: WeeklySummary,
    pub last_week: WeeklySummary,
    pub delta: WeeklyDelta,
    /// Bounded [0,100] proxy for system health: this week's success rate.
    pub confidence: u8,
}

/// `round(oks / total * 100)`, defined as 0 for an empty bucket.
fn success_rate(oks: usize, total: usize) -> u8 {
    if total == 0 {
        0
    } else {
        ((oks as f64 / total as f64) * 100.0).round() as u8
    }
}

/// Pure tally over a slice of entries.
pub fn summarize(entries: &[LogEntry]) -> WeeklySummary {
    let total = entries.len();
    let errors = entries.iter().filter(|e| e.overall == Severity::Error).count();
    let warns = entries.iter().filter(|e| e.overall == Severity::Warn).count();
    let oks = entries.iter().filter(|e| e.overall == Severity::Ok).count();

    WeeklySummary {
        total,
        errors,
        warns,
        oks,
        success_rate: success_rate(oks, total),
    }
}

#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    log: EventLog,
    archive: ArchiveManager,
}

impl TrendAnalyzer {
    pub fn new(log: EventLog, archive: ArchiveManager) -> Self {
        Self { log, archive }
    }

    /// Active log merged with archive snapshots covering `[from, now]`,
    /// deduplicated by id (an entry can appear both live and archived).
    fn entries_in_window(&self, from: DateTime<Utc>, now: DateTime<Utc>) -> Vec<LogEntry> {
        let mut entries = self.log.read_all().unwrap_or_default();
        let mut seen: HashSet<i64> = entries.iter().map(|e| e.id).collect();

        let mut date = from.date_naive();
        let last = now.date_naive();
        while date <= last {
            if let Some(snapshot) = self.archive.read_snapshot(date) {
                for entry in snapshot {
                    if seen.insert(entry.id) {
                        entries.push(entry);
                    }
                }
            }
            date += Duration::days(1);
        }

        entries.retain(|e| e.time >= from && e.time <= now);
        entries
    }

    /// One point per UTC calendar day for the `days` most recent days,
    /// oldest first, ending today.
    pub fn daily_trend(&self, days: u32, now: DateTime<Utc>) -> Vec<TrendPoint> {
        let days = days.max(1) as i64;
        let from = now - Duration::days(days);
        let entries = self.entries_in_window(from, now);

        (0..days)
            .rev()
            .map(|offset| {
                let date = (now - Duration::days(offset)).date_naive();
                let day: Vec<&LogEntry> =
                    entries.iter().filter(|e| e.time.date_naive() == date).collect();

                let errors = day.iter().filter(|e| e.overall == Severity::Error).count();
                let warns = day.iter().filter(|e| e.overall == Severity::Warn).count();
                let oks = day.iter().filter(|e| e.overall == Severity::Ok).count();

                TrendPoint {
                    date,
                    error_count: errors,
                    warn_count: warns,
                    ok_count: oks,
                    success_rate: success_rate(oks, day.len()),
                }
            })
            .collect()
    }

    /// Compare `[now-14d, now-7d)` against `[now-7d, now)`.
    pub fn weekly_rollup(&self, now: DateTime<Utc>) -> WeeklyRollup {
        let week_ago = now - Duration::days(7);
        let two_weeks_ago = now - Duration::days(14);
        let entries = self.entries_in_window(two_weeks_ago, now);

        let this_week_entries: Vec<LogEntry> = entries
            .iter()
            .filter(|e| e.time >= week_ago && e.time < now)
            .cloned()
            .collect();
        let last_week_entries: Vec<LogEntry> = entries
            .iter()
            .filter(|e| e.time >= two_weeks_ago && e.time < week_ago)
            .cloned()
            .collect();

        let this_week = summarize(&this_week_entries);
        let last_week = summarize(&last_week_entries);

        WeeklyRollup {
            this_week,
            last_week,
            delta: WeeklyDelta {
                errors: this_week.errors as i64 - last_week.errors as i64,
                warns: this_week.warns as i64 - last_week.warns as i64,
                oks: this_week.oks as i64 - last_week.oks as i64,
                success_rate: this_week.success_rate as i64 - last_week.success_rate as i64,
            },
            confidence: this_week.success_rate.min(100),
        }
    }
}
