//! Service counters and the periodic human-readable status summary.

use analysis_core::{DirStats, QueueStats, RecordStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

const RULE: &str = "==================================================";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStats {
    pub started_at: DateTime<Utc>,
    pub cycles: u64,
    pub messages_processed: u64,
    pub files_downloaded: u64,
    pub processing_errors: u64,
    pub messages_rejected: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ServiceStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            cycles: 0,
            messages_processed: 0,
            files_downloaded: 0,
            processing_errors: 0,
            messages_rejected: 0,
            last_activity: None,
        }
    }
}

/// Snapshot rendered by [`Display`] as the operator status block.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub uptime: Duration,
    pub max_runtime: Option<Duration>,
    pub stats: ServiceStats,
    pub queue: QueueStats,
    pub scratch: DirStats,
    /// `None` when the record store could not be queried.
    pub records: Option<RecordStats>,
    pub durable_records: bool,
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn or_unknown(value: Option<u64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

impl StatusReport {
    pub fn time_remaining(&self) -> Option<Duration> {
        self.max_runtime
            .map(|max| max.saturating_sub(self.uptime))
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "ANALYSIS SERVICE STATUS")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Uptime: {}", format_duration(self.uptime))?;
        match self.time_remaining() {
            None => writeln!(f, "Time Limit: Unlimited")?,
            Some(remaining) if remaining.is_zero() => writeln!(f, "Time Limit: EXCEEDED")?,
            Some(remaining) => writeln!(
                f,
                "Time Remaining: {:.1} hours",
                remaining.as_secs_f64() / 3600.0
            )?,
        }
        writeln!(f, "Cycles: {}", self.stats.cycles)?;
        writeln!(f, "Messages Processed: {}", self.stats.messages_processed)?;
        writeln!(f, "Files Downloaded: {}", self.stats.files_downloaded)?;
        writeln!(f, "Processing Errors: {}", self.stats.processing_errors)?;
        writeln!(f, "Messages Rejected: {}", self.stats.messages_rejected)?;
        match self.stats.last_activity {
            Some(at) => writeln!(f, "Last Activity: {}", at.to_rfc3339())?,
            None => writeln!(f, "Last Activity: None")?,
        }

        if self.queue.is_unknown() {
            writeln!(f, "Queue Stats: Unavailable")?;
        } else {
            writeln!(f, "Queue Messages: {}", or_unknown(self.queue.approx_visible))?;
            writeln!(
                f,
                "Messages in Flight: {}",
                or_unknown(self.queue.approx_in_flight)
            )?;
            writeln!(
                f,
                "Messages Delayed: {}",
                or_unknown(self.queue.approx_delayed)
            )?;
        }

        if self.scratch.exists {
            writeln!(f, "Download Dir Files: {}", self.scratch.file_count)?;
            writeln!(f, "Download Dir Size: {} MB", self.scratch.total_mb())?;
        } else {
            writeln!(
                f,
                "Download Dir: {} (not created yet)",
                self.scratch.dir.display()
            )?;
        }

        let store = if self.durable_records {
            "database"
        } else {
            "in-memory"
        };
        match &self.records {
            Some(records) => {
                let counts = &records.status_counts;
                writeln!(
                    f,
                    "Records ({}): {} total, {} processing, {} completed, {} failed",
                    store, records.total_records, counts.processing, counts.completed, counts.failed
                )?;
            }
            None => writeln!(f, "Records ({}): Unavailable", store)?,
        }
        write!(f, "{}", RULE)
    }
}
