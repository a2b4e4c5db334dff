//! VitalPulse Monitor Agent - streaming vital-sign monitoring with rule-based risk annotation.
//!
//! This library ingests ECG-like signal samples (simulated or pushed by an
//! external device), keeps a bounded trailing window, persists samples to a
//! record store, and periodically derives a heart-rate estimate plus a
//! rule-based risk assessment with threshold alerts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  VitalPulse Monitor Agent                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │   Source   │──▶│   Window   │──▶│ Classifier │            │
//! │  │ (sim/push) │   │ (last 50)  │   │ (rule set) │            │
//! │  └────────────┘   └────────────┘   └────────────┘            │
//! │        │                │                 │                  │
//! │        ▼                ▼                 ▼                  │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │ Credential │   │   Metric   │   │ Thresholds │            │
//! │  │    Gate    │   │   Store    │   │  / Alerts  │            │
//! │  └────────────┘   └────────────┘   └────────────┘            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Device writes enter through the HTTP ingress guarded by the credential
//! gate; the monitor loop runs as a single cooperative task and never waits
//! on store writes before scheduling the next tick.
//!
//! # Example
//!
//! ```no_run
//! use vitalpulse_monitor_agent::{
//!     monitor::{MonitorConfig, MonitorSession},
//!     source::SimulatedSource,
//!     store::MetricStore,
//! };
//!
//! # async fn demo() {
//! let store = MetricStore::memory();
//! let source = Box::new(SimulatedSource::new("demo-device"));
//! let session = MonitorSession::new(MonitorConfig::default(), source, store, "patient-1");
//! let handle = session.start();
//! // ... observe handle.snapshot() ...
//! handle.stop().await;
//! # }
//! ```

pub mod config;
pub mod core;
pub mod credentials;
pub mod identity;
pub mod monitor;
pub mod snapshot;
pub mod source;
pub mod stats;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::Config;
pub use core::{
    classify, AlertThresholds, RiskAssessment, RiskLevel, SignalWindow, VitalRange, VitalStatus,
};
pub use credentials::{AuthError, CredentialRegistry, DeviceCredential};
pub use identity::SessionProvider;
pub use monitor::{
    ConnectionStatus, MonitorConfig, MonitorHandle, MonitorProfile, MonitorSession,
    MonitorSnapshot, MonitorState,
};
pub use snapshot::{AutosaveSnapshot, SnapshotStore};
pub use source::{
    MetricSample, MetricType, NewMetricSample, PushHandle, PushedSource, SampleSource,
    SignalSample, SimulatedSource,
};
pub use stats::{create_shared_stats, MonitorStats, SharedMonitorStats, StatsSummary};
pub use store::{MetricStore, PredictionRecord, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
