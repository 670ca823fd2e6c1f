//! Run statistics for pipeline invocations.
//!
//! Counters are cumulative across runs when the log is backed by a file.
//! Only counts are kept; no patient values or identifiers are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Name of the persisted stats file inside the data directory.
pub const RUN_STATS_FILE: &str = "run_stats.json";

/// Atomic pipeline counters.
#[derive(Debug)]
pub struct RunLog {
    /// Number of pipeline runs started
    runs: AtomicU64,
    /// Source tables read successfully
    sources_read: AtomicU64,
    /// Source tables skipped as unreadable
    sources_skipped: AtomicU64,
    /// Normalized records produced
    records_ingested: AtomicU64,
    /// Rows dropped for lacking a stay id or offset
    rows_dropped: AtomicU64,
    /// Stays scored or featurized
    patients_processed: AtomicU64,
    /// Training windows written
    windows_emitted: AtomicU64,
    /// Forecasts and tabular estimates produced
    predictions_made: AtomicU64,
    /// When this log was created
    started: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            sources_read: AtomicU64::new(0),
            sources_skipped: AtomicU64::new(0),
            records_ingested: AtomicU64::new(0),
            rows_dropped: AtomicU64::new(0),
            patients_processed: AtomicU64::new(0),
            windows_emitted: AtomicU64::new(0),
            predictions_made: AtomicU64::new(0),
            started: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by a stats file, loading any previous totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous run stats: {e}");
        }

        log
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ingestion(&self, sources_read: u64, sources_skipped: u64, records: u64, dropped: u64) {
        self.sources_read.fetch_add(sources_read, Ordering::Relaxed);
        self.sources_skipped
            .fetch_add(sources_skipped, Ordering::Relaxed);
        self.records_ingested.fetch_add(records, Ordering::Relaxed);
        self.rows_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn record_patients(&self, count: u64) {
        self.patients_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_windows(&self, count: u64) {
        self.windows_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_predictions(&self, count: u64) {
        self.predictions_made.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            runs: self.runs.load(Ordering::Relaxed),
            sources_read: self.sources_read.load(Ordering::Relaxed),
            sources_skipped: self.sources_skipped.load(Ordering::Relaxed),
            records_ingested: self.records_ingested.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            patients_processed: self.patients_processed.load(Ordering::Relaxed),
            windows_emitted: self.windows_emitted.load(Ordering::Relaxed),
            predictions_made: self.predictions_made.load(Ordering::Relaxed),
            started: self.started,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Runs: {}\n\
             - Sources read: {}\n\
             - Sources skipped: {}\n\
             - Records ingested: {}\n\
             - Rows dropped: {}\n\
             - Patients processed: {}\n\
             - Windows emitted: {}\n\
             - Predictions made: {}",
            stats.runs,
            stats.sources_read,
            stats.sources_skipped,
            stats.records_ingested,
            stats.rows_dropped,
            stats.patients_processed,
            stats.windows_emitted,
            stats.predictions_made
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                stats: self.stats(),
                last_updated: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;
                let s = persisted.stats;

                self.runs.store(s.runs, Ordering::Relaxed);
                self.sources_read.store(s.sources_read, Ordering::Relaxed);
                self.sources_skipped
                    .store(s.sources_skipped, Ordering::Relaxed);
                self.records_ingested
                    .store(s.records_ingested, Ordering::Relaxed);
                self.rows_dropped.store(s.rows_dropped, Ordering::Relaxed);
                self.patients_processed
                    .store(s.patients_processed, Ordering::Relaxed);
                self.windows_emitted
                    .store(s.windows_emitted, Ordering::Relaxed);
                self.predictions_made
                    .store(s.predictions_made, Ordering::Relaxed);
                self.started = s.started;
            }
        }
        Ok(())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub runs: u64,
    pub sources_read: u64,
    pub sources_skipped: u64,
    pub records_ingested: u64,
    pub rows_dropped: u64,
    pub patients_processed: u64,
    pub windows_emitted: u64,
    pub predictions_made: u64,
    /// First run covered by these totals
    pub started: DateTime<Utc>,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(flatten)]
    stats: RunStats,
    last_updated: DateTime<Utc>,
}
