//! Metric store client.
//!
//! Thin interface over the record store holding metric samples and
//! persisted risk predictions. Two backends: a remote row store spoken to
//! over HTTP, and an in-process memory store used for local sessions,
//! demos, and tests. Appends are single-row atomic; ordering of reads is
//! by recorded time, most recent first.

use crate::core::classifier::RiskAssessment;
use crate::source::types::{MetricSample, MetricType, NewMetricSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Table name for vital-sign samples.
pub const METRICS_TABLE: &str = "health_metrics";

/// Table name for persisted risk predictions.
pub const PREDICTIONS_TABLE: &str = "risk_predictions";

/// Store client error types.
#[derive(Debug)]
pub enum StoreError {
    /// Caller is not authenticated/authorized for the owner
    Unauthorized,
    /// Network/HTTP error
    Network(String),
    /// Backend returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unauthorized => write!(f, "Store auth error: not authorized for owner"),
            StoreError::Network(msg) => write!(f, "Store network error: {msg}"),
            StoreError::Server { status, message } => {
                write!(f, "Store server error ({status}): {message}")
            }
            StoreError::Serialization(msg) => write!(f, "Store serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A persisted classification result, tagged with its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Record identifier
    pub id: Uuid,
    /// Subject the prediction is about
    pub owner_id: String,
    /// Kind of prediction; currently always "ecg_analysis"
    pub prediction_type: String,
    /// Tier and details from the classifier
    pub assessment: RiskAssessment,
    /// Heart-rate estimate the classifier was given
    pub heart_rate: f64,
    /// Timestamp the caller associated with the window
    pub recorded_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Build a record from a classifier result.
    pub fn new(
        owner_id: impl Into<String>,
        assessment: RiskAssessment,
        heart_rate: f64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            prediction_type: "ecg_analysis".to_string(),
            assessment,
            heart_rate,
            recorded_at,
        }
    }
}

/// Remote record store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the record store, e.g. `http://127.0.0.1:9000`
    pub base_url: String,
    /// Bearer authentication token
    pub token: String,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            token: token.into(),
        }
    }

    /// Insert endpoint for a table.
    pub fn records_url(&self, table: &str) -> String {
        format!("{}/v1/records/{table}", self.base_url)
    }

    /// Query endpoint for a table: equality filters, descending order on
    /// recorded time, and a row limit.
    pub fn query_url(
        &self,
        table: &str,
        owner_id: &str,
        metric_type: Option<MetricType>,
        limit: usize,
    ) -> String {
        let mut url = format!(
            "{}/v1/records/{table}?owner_id=eq.{owner_id}&order=recorded_at.desc&limit={limit}",
            self.base_url
        );
        if let Some(t) = metric_type {
            url.push_str("&metric_type=eq.");
            url.push_str(t.as_str());
        }
        url
    }
}

/// HTTP client for the remote record store.
#[cfg(feature = "store")]
#[derive(Clone)]
pub struct RemoteStore {
    config: StoreConfig,
    client: reqwest::Client,
}

#[cfg(feature = "store")]
impl RemoteStore {
    /// Create a new remote store client.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::Unauthorized);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Append a sample; the store assigns the record id.
    pub async fn append(&self, sample: NewMetricSample) -> Result<MetricSample, StoreError> {
        let response = self
            .client
            .post(self.config.records_url(METRICS_TABLE))
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(&sample)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Query samples for an owner, most recent first.
    pub async fn query(
        &self,
        owner_id: &str,
        metric_type: Option<MetricType>,
        limit: usize,
    ) -> Result<Vec<MetricSample>, StoreError> {
        let url = self
            .config
            .query_url(METRICS_TABLE, owner_id, metric_type, limit);
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Persist a classification result.
    pub async fn append_prediction(&self, record: PredictionRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.config.records_url(PREDICTIONS_TABLE))
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(&record)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Self::check_status(response).await?;
        Ok(())
    }
}

/// In-process store used for local sessions and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    samples: Vec<MetricSample>,
    predictions: Vec<PredictionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, sample: NewMetricSample) -> Result<MetricSample, StoreError> {
        let sample = sample.into_sample(Uuid::new_v4());
        let mut inner = self.inner.write().await;
        inner.samples.push(sample.clone());
        Ok(sample)
    }

    pub async fn query(
        &self,
        owner_id: &str,
        metric_type: Option<MetricType>,
        limit: usize,
    ) -> Result<Vec<MetricSample>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<MetricSample> = inner
            .samples
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .filter(|s| metric_type.map_or(true, |t| s.metric_type == t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        rows.truncate(limit);
        Ok(rows)
    }

    pub async fn append_prediction(&self, record: PredictionRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.predictions.push(record);
        Ok(())
    }

    /// Persisted predictions for an owner, insertion order.
    pub async fn predictions(&self, owner_id: &str) -> Vec<PredictionRecord> {
        let inner = self.inner.read().await;
        inner
            .predictions
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Total number of stored samples, all owners.
    pub async fn sample_count(&self) -> usize {
        self.inner.read().await.samples.len()
    }
}

/// The metric store a session writes to.
#[derive(Clone)]
pub enum MetricStore {
    #[cfg(feature = "store")]
    Remote(RemoteStore),
    Memory(MemoryStore),
}

impl MetricStore {
    /// An in-process store.
    pub fn memory() -> Self {
        MetricStore::Memory(MemoryStore::new())
    }

    /// A client for a remote record store.
    #[cfg(feature = "store")]
    pub fn remote(config: StoreConfig) -> Result<Self, StoreError> {
        Ok(MetricStore::Remote(RemoteStore::new(config)?))
    }

    /// Append a sample and return the persisted record.
    pub async fn append(&self, sample: NewMetricSample) -> Result<MetricSample, StoreError> {
        match self {
            #[cfg(feature = "store")]
            MetricStore::Remote(s) => s.append(sample).await,
            MetricStore::Memory(s) => s.append(sample).await,
        }
    }

    /// Query an owner's samples, most recent first.
    pub async fn query(
        &self,
        owner_id: &str,
        metric_type: Option<MetricType>,
        limit: usize,
    ) -> Result<Vec<MetricSample>, StoreError> {
        match self {
            #[cfg(feature = "store")]
            MetricStore::Remote(s) => s.query(owner_id, metric_type, limit).await,
            MetricStore::Memory(s) => s.query(owner_id, metric_type, limit).await,
        }
    }

    /// Persist a classification result.
    pub async fn append_prediction(&self, record: PredictionRecord) -> Result<(), StoreError> {
        match self {
            #[cfg(feature = "store")]
            MetricStore::Remote(s) => s.append_prediction(record).await,
            MetricStore::Memory(s) => s.append_prediction(record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::classify;
    use chrono::Duration;

    #[test]
    fn test_store_config_urls() {
        let config = StoreConfig::new("http://127.0.0.1:9000/", "test-token");
        assert_eq!(
            config.records_url("health_metrics"),
            "http://127.0.0.1:9000/v1/records/health_metrics"
        );
        assert_eq!(
            config.query_url("health_metrics", "patient-1", None, 50),
            "http://127.0.0.1:9000/v1/records/health_metrics?owner_id=eq.patient-1&order=recorded_at.desc&limit=50"
        );
        assert_eq!(
            config.query_url("health_metrics", "patient-1", Some(MetricType::Ecg), 10),
            "http://127.0.0.1:9000/v1/records/health_metrics?owner_id=eq.patient-1&order=recorded_at.desc&limit=10&metric_type=eq.ecg"
        );
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MetricStore::memory();
        let persisted = store
            .append(NewMetricSample::new("patient-1", MetricType::Ecg, 0.42))
            .await
            .unwrap();
        assert_eq!(persisted.owner_id, "patient-1");

        let rows = store.query("patient-1", None, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, persisted.id);
    }

    #[tokio::test]
    async fn test_memory_store_orders_most_recent_first() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut sample = NewMetricSample::new("patient-1", MetricType::Ecg, i as f64);
            sample.recorded_at = base + Duration::seconds(i);
            store.append(sample).await.unwrap();
        }

        let rows = store.query("patient-1", None, 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value, 4.0);
        assert_eq!(rows[1].value, 3.0);
        assert_eq!(rows[2].value, 2.0);
    }

    #[tokio::test]
    async fn test_memory_store_filters_by_owner_and_type() {
        let store = MemoryStore::new();
        store
            .append(NewMetricSample::new("patient-1", MetricType::Ecg, 0.1))
            .await
            .unwrap();
        store
            .append(NewMetricSample::new("patient-1", MetricType::HeartRate, 72.0))
            .await
            .unwrap();
        store
            .append(NewMetricSample::new("patient-2", MetricType::Ecg, 0.2))
            .await
            .unwrap();

        let ecg = store
            .query("patient-1", Some(MetricType::Ecg), 10)
            .await
            .unwrap();
        assert_eq!(ecg.len(), 1);
        assert_eq!(ecg[0].value, 0.1);

        let all = store.query("patient-1", None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s.owner_id == "patient-1"));
    }

    #[tokio::test]
    async fn test_prediction_persistence() {
        let store = MemoryStore::new();
        let assessment = classify(&[0.0; 6], 72.0);
        let record = PredictionRecord::new("patient-1", assessment, 72.0, Utc::now());
        store.append_prediction(record).await.unwrap();

        let predictions = store.predictions("patient-1").await;
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].prediction_type, "ecg_analysis");
        assert!(store.predictions("patient-2").await.is_empty());
    }
}
