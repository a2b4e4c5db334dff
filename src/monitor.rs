//! The monitoring session: a periodic ingestion loop over a signal source.
//!
//! A session is either `Idle` or `Monitoring`. While monitoring, a single
//! cooperative task multiplexes the sample tick, the autosave timer, and a
//! stop command channel. The window is owned exclusively by that task;
//! observers read cloned snapshots through a watch channel. Store appends
//! are fired and forgotten - a failed write loses one tick's side effect
//! and nothing else.

use crate::core::classifier::{classify, RiskAssessment};
use crate::core::thresholds::AlertThresholds;
use crate::core::window::{SignalWindow, DEFAULT_CAPACITY, RATE_WINDOW};
use crate::snapshot::{AutosaveSnapshot, SnapshotStore};
use crate::source::types::{MetricType, NewMetricSample};
use crate::source::SampleSource;
use crate::stats::SharedMonitorStats;
use crate::store::MetricStore;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Monitoring,
}

/// Cosmetic connectivity indicator surfaced to dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Threshold profile for the monitored subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorProfile {
    Standard,
    Infant,
}

impl MonitorProfile {
    /// The threshold set this profile monitors against.
    pub fn thresholds(&self) -> AlertThresholds {
        match self {
            MonitorProfile::Standard => AlertThresholds::standard(),
            MonitorProfile::Infant => AlertThresholds::infant(),
        }
    }
}

impl FromStr for MonitorProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(MonitorProfile::Standard),
            "infant" | "baby" => Ok(MonitorProfile::Infant),
            other => Err(format!("unknown profile: {other}")),
        }
    }
}

/// Tunables for a monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between sample ticks
    pub tick_interval: Duration,
    /// Maximum samples retained in the window
    pub window_capacity: usize,
    /// Run the classifier every this many ticks
    pub classify_every: u64,
    /// Interval between autosave snapshots
    pub autosave_interval: Duration,
    /// Whether the autosave task writes snapshots
    pub autosave_enabled: bool,
    /// Delay before the connectivity indicator turns Connected
    pub connect_delay: Duration,
    /// Threshold profile for alerting
    pub profile: MonitorProfile,
    /// Metric type persisted for ingested samples
    pub metric_type: MetricType,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            window_capacity: DEFAULT_CAPACITY,
            classify_every: 20,
            autosave_interval: Duration::from_secs(60),
            autosave_enabled: true,
            connect_delay: Duration::from_secs(2),
            profile: MonitorProfile::Standard,
            metric_type: MetricType::Ecg,
        }
    }
}

/// Observable state of a running session.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub state: MonitorState,
    pub connection: ConnectionStatus,
    pub window_len: usize,
    pub heart_rate: Option<f64>,
    pub last_assessment: Option<RiskAssessment>,
    pub alerts: Vec<String>,
    pub ticks: u64,
}

impl MonitorSnapshot {
    fn idle() -> Self {
        Self {
            state: MonitorState::Idle,
            connection: ConnectionStatus::Disconnected,
            window_len: 0,
            heart_rate: None,
            last_assessment: None,
            alerts: Vec::new(),
            ticks: 0,
        }
    }
}

enum Command {
    Stop,
}

/// An idle session, ready to start.
pub struct MonitorSession {
    config: MonitorConfig,
    source: Box<dyn SampleSource>,
    store: MetricStore,
    owner_id: String,
    snapshot_store: Option<SnapshotStore>,
    stats: Option<SharedMonitorStats>,
}

impl MonitorSession {
    /// Create an idle session for a subject.
    pub fn new(
        config: MonitorConfig,
        source: Box<dyn SampleSource>,
        store: MetricStore,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            owner_id: owner_id.into(),
            snapshot_store: None,
            stats: None,
        }
    }

    /// Attach an autosave snapshot store.
    pub fn with_snapshot_store(mut self, snapshot_store: SnapshotStore) -> Self {
        self.snapshot_store = Some(snapshot_store);
        self
    }

    /// Attach an activity counter log.
    pub fn with_stats(mut self, stats: SharedMonitorStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Transition Idle -> Monitoring: spawn the loop task and return its
    /// handle.
    pub fn start(self) -> MonitorHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::idle());

        let task = tokio::spawn(run_loop(self, cmd_rx, snapshot_tx));

        MonitorHandle {
            cmd_tx,
            snapshot_rx,
            task,
        }
    }
}

/// Handle to a running session.
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<MonitorSnapshot>,
    task: tokio::task::JoinHandle<()>,
}

impl MonitorHandle {
    /// Current observable state.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel for state changes.
    pub fn watch(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Transition Monitoring -> Idle: cancel both timers and wait for the
    /// loop task to finish. In-flight store writes are left to complete or
    /// fail on their own.
    pub async fn stop(self) {
        let _ = self.cmd_tx.send(Command::Stop).await;
        let _ = self.task.await;
    }
}

/// Mutable loop state, owned by the task.
struct LoopState {
    window: SignalWindow,
    ticks: u64,
    connection: ConnectionStatus,
    heart_rate: Option<f64>,
    last_assessment: Option<RiskAssessment>,
    alerts: Vec<String>,
}

impl LoopState {
    /// Add an alert unless an identical message is already present.
    fn push_alert(&mut self, message: &str, stats: &Option<SharedMonitorStats>) {
        if !self.alerts.iter().any(|a| a == message) {
            self.alerts.push(message.to_string());
            if let Some(stats) = stats {
                stats.record_alert();
            }
        }
    }

    fn publish(&self, tx: &watch::Sender<MonitorSnapshot>, state: MonitorState) {
        let _ = tx.send(MonitorSnapshot {
            state,
            connection: self.connection,
            window_len: self.window.len(),
            heart_rate: self.heart_rate,
            last_assessment: self.last_assessment.clone(),
            alerts: self.alerts.clone(),
            ticks: self.ticks,
        });
    }
}

async fn run_loop(
    mut session: MonitorSession,
    mut cmd_rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
) {
    let config = session.config.clone();
    let thresholds = config.profile.thresholds();
    let mut rng = SmallRng::from_entropy();

    let mut state = LoopState {
        window: SignalWindow::with_capacity(config.window_capacity),
        ticks: 0,
        connection: ConnectionStatus::Connecting,
        heart_rate: None,
        last_assessment: None,
        alerts: Vec::new(),
    };

    let started = Instant::now();
    let mut tick = interval_at(started + config.tick_interval, config.tick_interval);
    let mut autosave = interval_at(started + config.autosave_interval, config.autosave_interval);

    tracing::info!(owner = %session.owner_id, "monitoring started");
    state.publish(&snapshot_tx, MonitorState::Monitoring);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                on_tick(&mut session, &config, &thresholds, &mut state, &mut rng, started);
                state.publish(&snapshot_tx, MonitorState::Monitoring);
            }
            _ = autosave.tick() => {
                on_autosave(&session, &config, &state);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Stop) | None => break,
                }
            }
        }
    }

    // Monitoring -> Idle: timers die with the task, connectivity resets.
    state.connection = ConnectionStatus::Disconnected;
    state.publish(&snapshot_tx, MonitorState::Idle);
    tracing::info!(owner = %session.owner_id, "monitoring stopped");
}

fn on_tick(
    session: &mut MonitorSession,
    config: &MonitorConfig,
    thresholds: &AlertThresholds,
    state: &mut LoopState,
    rng: &mut SmallRng,
    started: Instant,
) {
    state.ticks += 1;

    if state.connection == ConnectionStatus::Connecting
        && started.elapsed() >= config.connect_delay
    {
        state.connection = ConnectionStatus::Connected;
        tracing::debug!("connection established");
    }

    if let Some(sample) = session.source.poll_sample() {
        state.window.push(sample);
        if let Some(ref stats) = session.stats {
            stats.record_sample_ingested();
        }

        // Fire-and-forget persistence: the next tick is never delayed by a
        // slow or failing store.
        let store = session.store.clone();
        let stats = session.stats.clone();
        let mut record =
            NewMetricSample::new(&session.owner_id, config.metric_type, sample.value)
                .with_device_id(session.source.device_id());
        record.recorded_at = sample.recorded_at;
        tokio::spawn(async move {
            match store.append(record).await {
                Ok(_) => {
                    if let Some(stats) = stats {
                        stats.record_store_write();
                    }
                }
                Err(e) => {
                    tracing::warn!("sample append failed: {e}");
                    if let Some(stats) = stats {
                        stats.record_store_failure();
                    }
                }
            }
        });
    }

    let jitter = rng.gen::<f64>() * 10.0;
    if let Some(rate) = state.window.rate_estimate(jitter) {
        state.heart_rate = Some(rate);

        if rate > thresholds.heart_rate.max {
            state.push_alert("High heart rate detected", &session.stats);
        } else if rate < thresholds.heart_rate.min {
            state.push_alert("Low heart rate detected", &session.stats);
        }

        if state.ticks % config.classify_every == 0 {
            let assessment = classify(&state.window.recent_values(RATE_WINDOW), rate);
            if let Some(ref stats) = session.stats {
                stats.record_classification();
            }
            if assessment.anomaly_detected {
                for recommendation in &assessment.recommendations {
                    state.push_alert(recommendation, &session.stats);
                }
            }
            tracing::debug!(
                risk = %assessment.risk_level,
                variance = assessment.ecg_variance,
                rate,
                "classification complete"
            );
            state.last_assessment = Some(assessment);
        }
    }
}

fn on_autosave(session: &MonitorSession, config: &MonitorConfig, state: &LoopState) {
    if !config.autosave_enabled || state.window.is_empty() {
        return;
    }
    let Some(ref snapshot_store) = session.snapshot_store else {
        return;
    };

    let snapshot = AutosaveSnapshot::new(
        &session.owner_id,
        session.source.device_id(),
        state.window.recent(RATE_WINDOW),
        state.heart_rate,
        state.last_assessment.clone(),
    );
    match snapshot_store.save(&snapshot) {
        Ok(path) => {
            tracing::debug!(?path, "autosave snapshot written");
            if let Some(ref stats) = session.stats {
                stats.record_snapshot_saved();
            }
        }
        Err(e) => {
            tracing::warn!("autosave failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{PushedSource, SignalSample, SimulatedSource};
    use crate::stats::create_shared_stats;
    use crate::store::MemoryStore;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_millis(10),
            autosave_interval: Duration::from_millis(200),
            connect_delay: Duration::from_millis(20),
            ..MonitorConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_stays_bounded_over_long_runs() {
        let store = MetricStore::memory();
        let source = Box::new(SimulatedSource::with_seed("sim", 1));
        let handle = MonitorSession::new(fast_config(), source, store, "patient-1").start();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = handle.snapshot();
        assert!(snapshot.window_len <= DEFAULT_CAPACITY);
        assert!(snapshot.ticks > 100);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_are_persisted() {
        let memory = MemoryStore::new();
        let store = MetricStore::Memory(memory.clone());
        let source = Box::new(SimulatedSource::with_seed("sim", 2));
        let stats = create_shared_stats();
        let handle = MonitorSession::new(fast_config(), source, store, "patient-1")
            .with_stats(stats.clone())
            .start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await;

        assert!(memory.sample_count().await > 0);
        let summary = stats.summary();
        assert!(summary.samples_ingested > 0);
        assert_eq!(summary.store_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_runs_on_cadence() {
        let store = MetricStore::memory();
        let source = Box::new(SimulatedSource::with_seed("sim", 3));
        let stats = create_shared_stats();
        let handle = MonitorSession::new(fast_config(), source, store, "patient-1")
            .with_stats(stats.clone())
            .start();

        // 50 ticks at 10ms: cadence 20 -> at least two classifications
        tokio::time::sleep(Duration::from_millis(520)).await;
        handle.stop().await;

        assert!(stats.summary().classifications >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_rate_alert_is_deduplicated() {
        let (source, push) = PushedSource::new("bedside-7");
        let store = MetricStore::memory();
        let handle =
            MonitorSession::new(fast_config(), Box::new(source), store, "patient-1").start();

        // Constant 2.5 mV drives the estimate to ~110-120 BPM, past the
        // standard 100 BPM ceiling on every tick.
        for _ in 0..60 {
            push.push(SignalSample::new(2.5));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let snapshot = handle.snapshot();
        let high_alerts = snapshot
            .alerts
            .iter()
            .filter(|a| *a == "High heart rate detected")
            .count();
        assert_eq!(high_alerts, 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_transitions_to_idle() {
        let store = MetricStore::memory();
        let source = Box::new(SimulatedSource::with_seed("sim", 4));
        let handle = MonitorSession::new(fast_config(), source, store, "patient-1").start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.snapshot().state, MonitorState::Monitoring);

        let watch = handle.watch();
        handle.stop().await;
        let final_snapshot = watch.borrow().clone();
        assert_eq!(final_snapshot.state, MonitorState::Idle);
        assert_eq!(final_snapshot.connection, ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_becomes_connected_after_delay() {
        let store = MetricStore::memory();
        let source = Box::new(SimulatedSource::with_seed("sim", 5));
        let handle = MonitorSession::new(fast_config(), source, store, "patient-1").start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.snapshot().connection, ConnectionStatus::Connected);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_writes_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_store = SnapshotStore::new(dir.path());
        let store = MetricStore::memory();
        let source = Box::new(SimulatedSource::with_seed("sim", 6));
        let handle = MonitorSession::new(fast_config(), source, store, "patient-1")
            .with_snapshot_store(snapshot_store.clone())
            .start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await;

        let saved = snapshot_store.load_all();
        assert!(!saved.is_empty());
        assert!(saved.iter().all(|s| s.owner_id == "patient-1"));
        assert!(saved.iter().all(|s| s.window.len() <= RATE_WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_store = SnapshotStore::new(dir.path());
        let config = MonitorConfig {
            autosave_enabled: false,
            ..fast_config()
        };
        let store = MetricStore::memory();
        let source = Box::new(SimulatedSource::with_seed("sim", 7));
        let handle = MonitorSession::new(config, source, store, "patient-1")
            .with_snapshot_store(snapshot_store.clone())
            .start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop().await;

        assert!(snapshot_store.load_all().is_empty());
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(
            "standard".parse::<MonitorProfile>().unwrap(),
            MonitorProfile::Standard
        );
        assert_eq!(
            "infant".parse::<MonitorProfile>().unwrap(),
            MonitorProfile::Infant
        );
        assert_eq!(
            "baby".parse::<MonitorProfile>().unwrap(),
            MonitorProfile::Infant
        );
        assert!("adult2".parse::<MonitorProfile>().is_err());
    }
}
