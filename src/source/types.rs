//! Typed sample model shared by the sources, the store, and the HTTP surface.
//!
//! Inbound device payloads are validated into these types at the ingress
//! boundary; nothing downstream ever sees an untyped field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Default unit for ECG voltage samples.
pub const DEFAULT_UNIT: &str = "mV";

/// Default device identifier for samples with no device attribution.
pub const DEFAULT_DEVICE_ID: &str = "ESP32";

/// Kind of vital-sign metric a sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Ecg,
    HeartRate,
    Temperature,
    BreathingRate,
}

impl MetricType {
    /// Wire name of this metric type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Ecg => "ecg",
            MetricType::HeartRate => "heart_rate",
            MetricType::Temperature => "temperature",
            MetricType::BreathingRate => "breathing_rate",
        }
    }
}

impl FromStr for MetricType {
    type Err = UnknownMetricType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ecg" => Ok(MetricType::Ecg),
            "heart_rate" => Ok(MetricType::HeartRate),
            "temperature" => Ok(MetricType::Temperature),
            "breathing_rate" => Ok(MetricType::BreathingRate),
            other => Err(UnknownMetricType(other.to_string())),
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for metric type strings outside the known set.
#[derive(Debug, Clone)]
pub struct UnknownMetricType(pub String);

impl std::fmt::Display for UnknownMetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown metric type: {}", self.0)
    }
}

impl std::error::Error for UnknownMetricType {}

/// A persisted vital-sign sample. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    /// Store-assigned record identifier
    pub id: Uuid,
    /// Subject this sample belongs to
    pub owner_id: String,
    /// Kind of metric
    pub metric_type: MetricType,
    /// Measured value
    pub value: f64,
    /// Unit of measurement
    pub unit: String,
    /// Device that produced the sample
    pub device_id: String,
    /// Optional opaque payload supplied by the device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    /// When the sample was recorded
    pub recorded_at: DateTime<Utc>,
}

/// A validated sample ready for insertion, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetricSample {
    pub owner_id: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

impl NewMetricSample {
    /// Create a sample with the default unit and recording time of now.
    pub fn new(owner_id: impl Into<String>, metric_type: MetricType, value: f64) -> Self {
        Self {
            owner_id: owner_id.into(),
            metric_type,
            value,
            unit: DEFAULT_UNIT.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            raw_data: None,
            recorded_at: Utc::now(),
        }
    }

    /// Set the device identifier.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Set the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Attach the store-assigned id, producing the persisted form.
    pub fn into_sample(self, id: Uuid) -> MetricSample {
        MetricSample {
            id,
            owner_id: self.owner_id,
            metric_type: self.metric_type,
            value: self.value,
            unit: self.unit,
            device_id: self.device_id,
            raw_data: self.raw_data,
            recorded_at: self.recorded_at,
        }
    }
}

/// A single point in the in-memory signal window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    /// When the value was produced
    pub recorded_at: DateTime<Utc>,
    /// Signal amplitude (mV for ECG)
    pub value: f64,
}

impl SignalSample {
    pub fn new(value: f64) -> Self {
        Self {
            recorded_at: Utc::now(),
            value,
        }
    }

    pub fn at(recorded_at: DateTime<Utc>, value: f64) -> Self {
        Self { recorded_at, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_type_round_trip() {
        for t in [
            MetricType::Ecg,
            MetricType::HeartRate,
            MetricType::Temperature,
            MetricType::BreathingRate,
        ] {
            assert_eq!(t.as_str().parse::<MetricType>().unwrap(), t);
        }
    }

    #[test]
    fn test_metric_type_rejects_unknown() {
        assert!("blood_oxygen".parse::<MetricType>().is_err());
        assert!("".parse::<MetricType>().is_err());
    }

    #[test]
    fn test_new_sample_defaults() {
        let sample = NewMetricSample::new("patient-1", MetricType::Ecg, 0.42);
        assert_eq!(sample.unit, DEFAULT_UNIT);
        assert_eq!(sample.device_id, DEFAULT_DEVICE_ID);
        assert!(sample.raw_data.is_none());
    }

    #[test]
    fn test_into_sample_preserves_fields() {
        let id = Uuid::new_v4();
        let sample = NewMetricSample::new("patient-1", MetricType::HeartRate, 72.0)
            .with_device_id("bedside-7")
            .with_unit("BPM")
            .into_sample(id);
        assert_eq!(sample.id, id);
        assert_eq!(sample.device_id, "bedside-7");
        assert_eq!(sample.unit, "BPM");
        assert_eq!(sample.metric_type, MetricType::HeartRate);
    }
}
