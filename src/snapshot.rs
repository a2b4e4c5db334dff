//! Autosave snapshot persistence.
//!
//! The autosave task periodically serializes the trailing window plus the
//! current rate and risk into a portable snapshot, written as one JSON file
//! per save keyed by timestamp under the local data directory.

use crate::core::classifier::RiskAssessment;
use crate::source::types::SignalSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A portable autosave snapshot of the monitoring state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveSnapshot {
    /// When this snapshot was written
    pub saved_at: DateTime<Utc>,
    /// Timezone label for downstream consumers
    pub timezone: String,
    /// Subject being monitored
    pub owner_id: String,
    /// Device that produced the window
    pub device_id: String,
    /// Trailing window samples, oldest first
    pub window: Vec<SignalSample>,
    /// Current heart-rate estimate, if one has been derived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    /// Most recent risk assessment, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
}

impl AutosaveSnapshot {
    pub fn new(
        owner_id: impl Into<String>,
        device_id: impl Into<String>,
        window: Vec<SignalSample>,
        heart_rate: Option<f64>,
        risk: Option<RiskAssessment>,
    ) -> Self {
        Self {
            saved_at: Utc::now(),
            timezone: chrono_tz::Tz::UTC.to_string(),
            owner_id: owner_id.into(),
            device_id: device_id.into(),
            window,
            heart_rate,
            risk,
        }
    }
}

/// File-backed key-value store for autosave snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot keyed by its save time.
    pub fn save(&self, snapshot: &AutosaveSnapshot) -> Result<PathBuf, std::io::Error> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "autosave_{}.json",
            snapshot.saved_at.timestamp_millis()
        ));
        let json = serde_json::to_string_pretty(snapshot).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Paths of all stored snapshots, oldest first.
    pub fn list(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with("autosave_") && n.ends_with(".json"))
                            .unwrap_or(false)
                    })
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }

    /// Load every stored snapshot, oldest first. Unreadable files are
    /// skipped.
    pub fn load_all(&self) -> Vec<AutosaveSnapshot> {
        self.list()
            .iter()
            .filter_map(|path| std::fs::read_to_string(path).ok())
            .filter_map(|content| serde_json::from_str(&content).ok())
            .collect()
    }
}
