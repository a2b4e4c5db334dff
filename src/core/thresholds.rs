//! Alert threshold policy.
//!
//! Stateless comparison of a measured vital against a configured [min, max]
//! range. Values outside the range are critical; values inside but within
//! 10% of either bound are a warning. Two independent threshold sets exist:
//! one for standard subjects and a tighter one for infants.

use serde::{Deserialize, Serialize};

/// Fraction of the range width treated as the warning band at each bound.
const WARNING_BAND: f64 = 0.1;

/// Severity of a single vital reading relative to its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalStatus {
    Normal,
    Warning,
    Critical,
}

impl VitalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalStatus::Normal => "normal",
            VitalStatus::Warning => "warning",
            VitalStatus::Critical => "critical",
        }
    }
}

impl std::fmt::Display for VitalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inclusive safe range for one vital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalRange {
    pub min: f64,
    pub max: f64,
}

impl VitalRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Classify a measured value against this range.
    ///
    /// The bounds themselves sit inside the warning band, so a value exactly
    /// at `min` or `max` is never normal.
    pub fn evaluate(&self, value: f64) -> VitalStatus {
        if value < self.min || value > self.max {
            return VitalStatus::Critical;
        }
        let band = (self.max - self.min) * WARNING_BAND;
        if value <= self.min + band || value >= self.max - band {
            return VitalStatus::Warning;
        }
        VitalStatus::Normal
    }
}

/// Per-vital safe ranges for one monitoring session. Immutable once the
/// session starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub heart_rate: VitalRange,
    pub temperature: VitalRange,
    pub breathing_rate: VitalRange,
}

impl AlertThresholds {
    /// Ranges for standard (adult) subjects.
    pub fn standard() -> Self {
        Self {
            heart_rate: VitalRange::new(60.0, 100.0),
            temperature: VitalRange::new(97.0, 99.5),
            breathing_rate: VitalRange::new(12.0, 20.0),
        }
    }

    /// Tighter ranges for infant subjects.
    pub fn infant() -> Self {
        Self {
            heart_rate: VitalRange::new(100.0, 160.0),
            temperature: VitalRange::new(96.8, 99.5),
            breathing_rate: VitalRange::new(30.0, 60.0),
        }
    }
}
