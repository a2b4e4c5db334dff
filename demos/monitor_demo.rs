//! Demonstration of a VitalPulse monitoring session.
//!
//! This example shows how to:
//! 1. Create a simulated signal source and an in-memory metric store
//! 2. Start a monitoring session
//! 3. Observe rate estimates, risk assessments, and alerts
//! 4. Stop the session and inspect what was persisted
//!
//! Run with: cargo run --example monitor_demo

use std::time::Duration;

use vitalpulse_monitor_agent::{
    monitor::{MonitorConfig, MonitorProfile, MonitorSession},
    source::SimulatedSource,
    stats::create_shared_stats,
    store::{MemoryStore, MetricStore},
};

#[tokio::main]
async fn main() {
    println!("VitalPulse Monitor Agent - Session Demo");
    println!("=======================================");
    println!();

    let memory = MemoryStore::new();
    let store = MetricStore::Memory(memory.clone());
    let source = Box::new(SimulatedSource::new("demo-device"));
    let stats = create_shared_stats();

    // A fast cadence so the demo produces output quickly
    let config = MonitorConfig {
        tick_interval: Duration::from_millis(100),
        classify_every: 20,
        profile: MonitorProfile::Standard,
        ..MonitorConfig::default()
    };

    println!("Monitoring a simulated subject for 10 seconds...");
    println!();

    let handle = MonitorSession::new(config, source, store, "demo-patient")
        .with_stats(stats.clone())
        .start();

    let mut watch = handle.watch();
    let mut seen_alerts = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            changed = watch.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = watch.borrow().clone();
                for alert in snap.alerts.iter().skip(seen_alerts) {
                    println!("ALERT: {alert}");
                }
                seen_alerts = snap.alerts.len();

                if snap.ticks % 20 == 0 {
                    if let (Some(rate), Some(assessment)) =
                        (snap.heart_rate, snap.last_assessment.as_ref())
                    {
                        println!(
                            "tick {:>3} | window {:>2} | {rate:.0} BPM | risk: {} ({:.0}%)",
                            snap.ticks,
                            snap.window_len,
                            assessment.risk_level,
                            assessment.confidence * 100.0,
                        );
                    }
                }
            }
        }
    }

    handle.stop().await;

    println!();
    println!("Persisted samples: {}", memory.sample_count().await);
    println!();
    println!("{}", stats.report());
}
