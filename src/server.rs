//! HTTP surface for device ingress and session queries.
//!
//! This module provides an HTTP server that:
//! - Accepts device sample writes on POST /v1/metrics, gated by device keys
//! - Serves a subject's own samples on GET /v1/metrics
//! - Runs and persists classifications on POST /v1/predict
//! - Feeds a live pushed-source session via POST /v1/push
//!
//! # Architecture
//!
//! ```text
//! Device ──→ POST /v1/metrics ──→ credential gate ──→ metric store
//! Session ─→ GET  /v1/metrics ──→ session check ───→ metric store
//! Session ─→ POST /v1/predict ──→ classifier ──────→ metric store
//! ```

use crate::core::classifier::{classify, RiskAssessment};
use crate::credentials::CredentialRegistry;
use crate::identity::SessionProvider;
use crate::source::types::{MetricSample, MetricType, NewMetricSample, SignalSample};
use crate::source::PushHandle;
use crate::store::{MetricStore, PredictionRecord, StoreError};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

/// Default row limit for sample queries.
const DEFAULT_QUERY_LIMIT: usize = 50;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state.
pub struct ServerState {
    /// Metric store backing all endpoints
    store: MetricStore,
    /// Issued device keys
    registry: RwLock<CredentialRegistry>,
    /// Session token verifier
    sessions: SessionProvider,
    /// Feed into a running pushed-source session, if one is attached
    push: Option<PushHandle>,
    /// Where to persist registry updates (last-used stamps), if anywhere
    registry_path: Option<PathBuf>,
}

impl ServerState {
    /// Create new server state.
    pub fn new(store: MetricStore, registry: CredentialRegistry, sessions: SessionProvider) -> Self {
        Self {
            store,
            registry: RwLock::new(registry),
            sessions,
            push: None,
            registry_path: None,
        }
    }

    /// Attach the feed handle of a running pushed-source session.
    pub fn with_push_handle(mut self, push: PushHandle) -> Self {
        self.push = Some(push);
        self
    }

    /// Persist registry updates to this path after authenticated writes.
    pub fn with_registry_path(mut self, path: PathBuf) -> Self {
        self.registry_path = Some(path);
        self
    }
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Device write request body.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub metric_type: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub device_id: Option<String>,
    pub raw_data: Option<serde_json::Value>,
}

/// Response for a persisted device write.
#[derive(Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
    pub data: MetricSample,
}

/// Query string for the sample read endpoint.
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub metric_type: Option<String>,
    pub limit: Option<usize>,
}

/// Response for the sample read endpoint.
#[derive(Serialize)]
pub struct MetricsResponse {
    pub data: Vec<MetricSample>,
}

/// Classification request body.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub window: Vec<f64>,
    pub rate: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Push request body for a live pushed-source session.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub value: f64,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Extract the bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                "Missing or invalid API key",
                "MISSING_CREDENTIAL",
            )
        })
}

/// Resolve a session bearer to an owner id.
fn session_owner(state: &ServerState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = bearer_token(headers)?;
    state.sessions.verify(token).map_err(|_| {
        api_error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "INVALID_SESSION",
        )
    })
}

fn store_error(e: StoreError) -> ApiError {
    tracing::error!("store error: {e}");
    match e {
        StoreError::Unauthorized => api_error(
            StatusCode::UNAUTHORIZED,
            "Not authorized for owner",
            "STORE_UNAUTHORIZED",
        ),
        _ => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to access health data",
            "STORE_ERROR",
        ),
    }
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /v1/metrics
///
/// Device write path: validates the device key, validates the payload into
/// a typed sample, persists it, and stamps the key's last-used time.
async fn ingest_metric(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let key = bearer_token(&headers)?;
    let owner_id = {
        let registry = state.registry.read().await;
        registry.authenticate(key).map_err(|_| {
            api_error(StatusCode::UNAUTHORIZED, "Invalid API key", "INVALID_API_KEY")
        })?
    };

    // Schema check before any processing: both fields must be present and
    // the metric type must be a known one.
    let (metric_type, value) = match (body.metric_type.as_deref(), body.value) {
        (Some(t), Some(v)) => match MetricType::from_str(t) {
            Ok(metric_type) => (metric_type, v),
            Err(e) => {
                return Err(api_error(StatusCode::BAD_REQUEST, e.to_string(), "VALIDATION"))
            }
        },
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Missing required fields: metric_type, value",
                "VALIDATION",
            ))
        }
    };

    let mut sample = NewMetricSample::new(owner_id, metric_type, value);
    if let Some(unit) = body.unit {
        sample = sample.with_unit(unit);
    }
    if let Some(device_id) = body.device_id {
        sample = sample.with_device_id(device_id);
    }
    sample.raw_data = body.raw_data;

    let persisted = state.store.append(sample).await.map_err(store_error)?;

    // Last-used stamp is best-effort and never delays the response.
    let state_for_touch = state.clone();
    let key = key.to_string();
    tokio::spawn(async move {
        let mut registry = state_for_touch.registry.write().await;
        registry.touch(&key);
        if let Some(ref path) = state_for_touch.registry_path {
            if let Err(e) = registry.save(path) {
                tracing::warn!("failed to persist registry: {e}");
            }
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            status: "ok".to_string(),
            message: "Health data saved successfully".to_string(),
            data: persisted,
        }),
    ))
}

/// GET /v1/metrics
///
/// Session read path: returns the caller's own samples, most recent first.
async fn query_metrics(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let owner_id = session_owner(&state, &headers)?;

    let metric_type = match params.metric_type.as_deref() {
        Some(t) => Some(MetricType::from_str(t).map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, e.to_string(), "VALIDATION")
        })?),
        None => None,
    };
    let limit = params.limit.unwrap_or(DEFAULT_QUERY_LIMIT);

    let data = state
        .store
        .query(&owner_id, metric_type, limit)
        .await
        .map_err(store_error)?;

    Ok(Json(MetricsResponse { data }))
}

/// POST /v1/predict
///
/// Session classification path: classifies the supplied window, persists
/// the result tagged with the caller, and returns the assessment.
async fn predict(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<PredictRequest>,
) -> Result<Json<RiskAssessment>, ApiError> {
    let owner_id = session_owner(&state, &headers)?;

    let assessment = classify(&body.window, body.rate);
    let record = PredictionRecord::new(
        owner_id,
        assessment.clone(),
        body.rate,
        body.timestamp.unwrap_or_else(Utc::now),
    );
    state
        .store
        .append_prediction(record)
        .await
        .map_err(store_error)?;

    Ok(Json(assessment))
}

/// POST /v1/push
///
/// Feeds one sample into the live pushed-source session.
async fn push_sample(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<PushRequest>,
) -> Result<StatusCode, ApiError> {
    session_owner(&state, &headers)?;

    let Some(ref push) = state.push else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "No live session is accepting pushed samples",
            "NOT_ACCEPTING",
        ));
    };

    let sample = match body.recorded_at {
        Some(at) => SignalSample::at(at, body.value),
        None => SignalSample::new(body.value),
    };
    if !push.push(sample) {
        return Err(api_error(
            StatusCode::CONFLICT,
            "No live session is accepting pushed samples",
            "NOT_ACCEPTING",
        ));
    }

    Ok(StatusCode::ACCEPTED)
}

/// Build the router for the given state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/metrics", post(ingest_metric).get(query_metrics))
        .route("/v1/predict", post(predict))
        .route("/v1/push", post(push_sample))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server.
pub async fn run(
    config: ServerConfig,
    state: Arc<ServerState>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("monitor agent server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
