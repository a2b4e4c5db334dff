//! Monitoring activity counters.
//!
//! Tracks what a session has done - samples ingested, store writes,
//! classifications, alerts, autosaves - for the `status` command and for
//! operators auditing a long-running agent. Counters persist across
//! sessions as a small JSON file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity counters for the current session.
#[derive(Debug)]
pub struct MonitorStats {
    /// Samples accepted into the window
    samples_ingested: AtomicU64,
    /// Successful store appends
    store_writes: AtomicU64,
    /// Store appends that failed and were swallowed
    store_failures: AtomicU64,
    /// Classifier invocations
    classifications: AtomicU64,
    /// Alerts added to the alert list
    alerts_raised: AtomicU64,
    /// Autosave snapshots written
    snapshots_saved: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting counters
    persist_path: Option<PathBuf>,
}

impl MonitorStats {
    /// Create a new stats log.
    pub fn new() -> Self {
        Self {
            samples_ingested: AtomicU64::new(0),
            store_writes: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            classifications: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            snapshots_saved: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a stats log with persistence, seeding counters from disk.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);
        if let Err(e) = stats.load() {
            tracing::debug!("No previous monitor stats loaded: {e}");
        }
        stats
    }

    pub fn record_sample_ingested(&self) {
        self.samples_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_write(&self) {
        self.store_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification(&self) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_saved(&self) {
        self.snapshots_saved.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current counter values.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            store_writes: self.store_writes.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            snapshots_saved: self.snapshots_saved.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable report for the CLI.
    pub fn report(&self) -> String {
        let s = self.summary();
        format!(
            "Session Statistics:\n\
             - Samples ingested: {}\n\
             - Store writes: {} ({} failed)\n\
             - Classifications run: {}\n\
             - Alerts raised: {}\n\
             - Autosave snapshots: {}\n\
             - Session duration: {} seconds",
            s.samples_ingested,
            s.store_writes,
            s.store_failures,
            s.classifications,
            s.alerts_raised,
            s.snapshots_saved,
            s.session_duration_secs
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let s = self.summary();
            let persisted = PersistedStats {
                samples_ingested: s.samples_ingested,
                store_writes: s.store_writes,
                store_failures: s.store_failures,
                classifications: s.classifications,
                alerts_raised: s.alerts_raised,
                snapshots_saved: s.snapshots_saved,
                last_updated: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counters from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;
                self.samples_ingested
                    .store(persisted.samples_ingested, Ordering::Relaxed);
                self.store_writes
                    .store(persisted.store_writes, Ordering::Relaxed);
                self.store_failures
                    .store(persisted.store_failures, Ordering::Relaxed);
                self.classifications
                    .store(persisted.classifications, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
                self.snapshots_saved
                    .store(persisted.snapshots_saved, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_ingested.store(0, Ordering::Relaxed);
        self.store_writes.store(0, Ordering::Relaxed);
        self.store_failures.store(0, Ordering::Relaxed);
        self.classifications.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
        self.snapshots_saved.store(0, Ordering::Relaxed);
    }
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    pub samples_ingested: u64,
    pub store_writes: u64,
    pub store_failures: u64,
    pub classifications: u64,
    pub alerts_raised: u64,
    pub snapshots_saved: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Counter format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_ingested: u64,
    store_writes: u64,
    store_failures: u64,
    classifications: u64,
    alerts_raised: u64,
    snapshots_saved: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared stats log.
pub type SharedMonitorStats = Arc<MonitorStats>;

/// Create a new shared stats log.
pub fn create_shared_stats() -> SharedMonitorStats {
    Arc::new(MonitorStats::new())
}

/// Create a new shared stats log with persistence.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedMonitorStats {
    Arc::new(MonitorStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = MonitorStats::new();
        stats.record_sample_ingested();
        stats.record_sample_ingested();
        stats.record_store_write();
        stats.record_store_failure();
        stats.record_alert();

        let s = stats.summary();
        assert_eq!(s.samples_ingested, 2);
        assert_eq!(s.store_writes, 1);
        assert_eq!(s.store_failures, 1);
        assert_eq!(s.alerts_raised, 1);
        assert_eq!(s.classifications, 0);
    }

    #[test]
    fn test_reset() {
        let stats = MonitorStats::new();
        stats.record_sample_ingested();
        stats.record_classification();
        stats.reset();

        let s = stats.summary();
        assert_eq!(s.samples_ingested, 0);
        assert_eq!(s.classifications, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor_stats.json");

        let stats = MonitorStats::with_persistence(path.clone());
        stats.record_sample_ingested();
        stats.record_snapshot_saved();
        stats.save().unwrap();

        let reloaded = MonitorStats::with_persistence(path);
        let s = reloaded.summary();
        assert_eq!(s.samples_ingested, 1);
        assert_eq!(s.snapshots_saved, 1);
    }

    #[test]
    fn test_report_format() {
        let stats = MonitorStats::new();
        let report = stats.report();
        assert!(report.contains("Samples ingested"));
        assert!(report.contains("Classifications run"));
        assert!(report.contains("Autosave snapshots"));
    }
}
