//! VitalPulse Monitor Agent CLI
//!
//! Streaming vital-sign monitoring with rule-based risk annotation.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vitalpulse_monitor_agent::{
    config::Config,
    credentials::{CredentialRegistry, DeviceCredential},
    monitor::{MonitorConfig, MonitorProfile, MonitorSession},
    snapshot::SnapshotStore,
    source::{PushedSource, SampleSource, SimulatedSource},
    stats::MonitorStats,
    store::MetricStore,
    VERSION,
};

#[cfg(feature = "server")]
use vitalpulse_monitor_agent::identity::SessionProvider;
#[cfg(feature = "store")]
use vitalpulse_monitor_agent::store::StoreConfig;

#[derive(Parser)]
#[command(name = "vitalpulse-monitor")]
#[command(author = "VitalPulse")]
#[command(version = VERSION)]
#[command(about = "Streaming vital-sign monitor with rule-based risk annotation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a monitoring session
    Start(StartArgs),

    /// Show configuration and cumulative session statistics
    Status,

    /// Manage device API keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Export autosave snapshots
    Export {
        /// Output directory for the export
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Show configuration
    Config,
}

#[derive(Args)]
struct StartArgs {
    /// Subject to monitor
    #[arg(long, default_value = "local-patient")]
    owner: String,

    /// Sample source (simulated or pushed)
    #[arg(long, default_value = "simulated")]
    source: String,

    /// Threshold profile (standard or infant)
    #[arg(long, default_value = "standard")]
    profile: MonitorProfile,

    /// Tick interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Disable autosave snapshots
    #[arg(long)]
    no_autosave: bool,

    /// Serve the HTTP surface alongside the session
    #[arg(long)]
    serve: bool,

    /// Port for the HTTP surface (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Remote record store base URL (overrides config)
    #[arg(long)]
    store_url: Option<String>,

    /// Remote record store token (overrides config)
    #[arg(long)]
    store_token: Option<String>,

    /// Register an extra session token for the owner (HTTP surface)
    #[arg(long)]
    session_token: Option<String>,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Issue a new device key
    Issue {
        /// Subject the device writes on behalf of
        #[arg(long)]
        owner: String,

        /// Human-readable label
        #[arg(long, default_value = "device")]
        label: String,

        /// Device family
        #[arg(long, default_value = "esp32")]
        device_type: String,
    },

    /// Revoke a device key
    Revoke {
        /// The key value to deactivate
        key: String,
    },

    /// List issued device keys
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => cmd_start(args).await,
        Commands::Status => cmd_status(),
        Commands::Keys { command } => cmd_keys(command),
        Commands::Export { output, format } => cmd_export(output, &format),
        Commands::Config => cmd_config(),
    }
}

async fn cmd_start(args: StartArgs) {
    println!("VitalPulse Monitor Agent v{VERSION}");
    println!();

    #[cfg(feature = "server")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    if let Some(ms) = args.interval_ms {
        config.tick_interval = Duration::from_millis(ms);
    }
    if args.no_autosave {
        config.autosave_enabled = false;
    }
    if let Some(url) = args.store_url {
        config.record_store = Some(vitalpulse_monitor_agent::config::RecordStoreConfig {
            base_url: url,
            token: args.store_token.clone().unwrap_or_default(),
        });
    }

    // Pick the store backend
    let store = match config.record_store {
        #[cfg(feature = "store")]
        Some(ref remote) => {
            match MetricStore::remote(StoreConfig::new(&remote.base_url, &remote.token)) {
                Ok(store) => {
                    println!("  Record store: {}", remote.base_url);
                    store
                }
                Err(e) => {
                    eprintln!("Warning: Remote store unavailable ({e}), using memory store");
                    MetricStore::memory()
                }
            }
        }
        #[cfg(not(feature = "store"))]
        Some(_) => {
            eprintln!("Warning: remote store ignored (store feature not enabled at compile time)");
            MetricStore::memory()
        }
        None => {
            println!("  Record store: in-memory");
            MetricStore::memory()
        }
    };

    // Pick the sample source
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let (source, push_handle): (Box<dyn SampleSource>, _) = match args.source.as_str() {
        "pushed" => {
            let (source, handle) = PushedSource::new(format!("push-{host}"));
            (Box::new(source), Some(handle))
        }
        "simulated" => (Box::new(SimulatedSource::new(format!("sim-{host}"))), None),
        other => {
            eprintln!("Error: unknown source '{other}' (expected simulated or pushed)");
            std::process::exit(1);
        }
    };

    println!("  Subject: {}", args.owner);
    println!("  Source: {} ({})", args.source, source.device_id());
    println!("  Profile: {:?}", args.profile);
    println!("  Tick interval: {}ms", config.tick_interval.as_millis());
    println!(
        "  Auto-save: {}",
        if config.autosave_enabled { "on" } else { "off" }
    );

    let stats = Arc::new(MonitorStats::with_persistence(config.stats_path()));
    let snapshot_store = SnapshotStore::new(config.snapshots_path());

    let monitor_config = MonitorConfig {
        tick_interval: config.tick_interval,
        window_capacity: config.window_capacity,
        classify_every: config.classify_every,
        autosave_interval: config.autosave_interval,
        autosave_enabled: config.autosave_enabled,
        profile: args.profile,
        ..MonitorConfig::default()
    };

    let handle = MonitorSession::new(monitor_config, source, store.clone(), &args.owner)
        .with_snapshot_store(snapshot_store)
        .with_stats(stats.clone())
        .start();

    // HTTP surface
    #[cfg(feature = "server")]
    let _shutdown_tx = if args.serve {
        use vitalpulse_monitor_agent::server::{run, ServerConfig, ServerState};

        let registry = CredentialRegistry::load(&config.device_keys_path()).unwrap_or_else(|e| {
            eprintln!("Warning: Could not load device keys: {e}");
            CredentialRegistry::new()
        });
        let mut sessions =
            SessionProvider::load(&config.session_tokens_path()).unwrap_or_default();
        if let Some(ref token) = args.session_token {
            sessions.insert(token.clone(), args.owner.clone());
        }

        let mut state = ServerState::new(store, registry, sessions)
            .with_registry_path(config.device_keys_path());
        if let Some(push) = push_handle {
            state = state.with_push_handle(push);
        }

        let port = args.port.unwrap_or(config.server_port);
        match run(ServerConfig::new(port), Arc::new(state)).await {
            Ok((addr, shutdown_tx)) => {
                println!("  HTTP surface: http://{addr}");
                Some(shutdown_tx)
            }
            Err(e) => {
                eprintln!("Warning: Could not start HTTP surface: {e}");
                None
            }
        }
    } else {
        let _ = push_handle;
        None
    };

    #[cfg(not(feature = "server"))]
    {
        if args.serve {
            eprintln!("Warning: --serve ignored (server feature not enabled at compile time)");
        }
        let _ = push_handle;
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    // Surface alerts and classifications as they happen
    let mut watch = handle.watch();
    let mut seen_alerts = 0usize;
    let mut last_classified_ticks = 0u64;

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            changed = watch.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = watch.borrow().clone();
                for alert in snap.alerts.iter().skip(seen_alerts) {
                    println!("[{}] ALERT: {alert}", Utc::now().format("%H:%M:%S"));
                }
                seen_alerts = snap.alerts.len();

                if let Some(ref assessment) = snap.last_assessment {
                    let classified_at = snap.ticks - snap.ticks % config.classify_every;
                    if classified_at > last_classified_ticks {
                        last_classified_ticks = classified_at;
                        println!(
                            "[{}] risk: {} | confidence: {:.0}% | variance: {:.4} | rate: {}",
                            Utc::now().format("%H:%M:%S"),
                            assessment.risk_level,
                            assessment.confidence * 100.0,
                            assessment.ecg_variance,
                            snap.heart_rate
                                .map(|r| format!("{r:.0} BPM"))
                                .unwrap_or_else(|| "--".to_string()),
                        );
                    }
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
    }

    println!();
    println!("Stopping monitoring...");
    handle.stop().await;

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save session stats: {e}");
    }

    println!();
    println!("{}", stats.report());
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("VitalPulse Monitor Agent Status");
    println!("===============================");
    println!();

    println!("Configuration:");
    println!("  Tick interval: {}ms", config.tick_interval.as_millis());
    println!(
        "  Autosave: every {}s ({})",
        config.autosave_interval.as_secs(),
        if config.autosave_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Profile: {:?}", config.profile);
    println!(
        "  Record store: {}",
        config
            .record_store
            .as_ref()
            .map(|s| s.base_url.clone())
            .unwrap_or_else(|| "in-memory".to_string())
    );
    println!();

    // Show cumulative stats if a previous session persisted them
    let stats_path = config.stats_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                if let Some(v) = stats.get("samples_ingested") {
                    println!("  Samples ingested: {v}");
                }
                if let Some(v) = stats.get("store_writes") {
                    println!("  Store writes: {v}");
                }
                if let Some(v) = stats.get("classifications") {
                    println!("  Classifications: {v}");
                }
                if let Some(v) = stats.get("alerts_raised") {
                    println!("  Alerts raised: {v}");
                }
                if let Some(v) = stats.get("snapshots_saved") {
                    println!("  Autosave snapshots: {v}");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_keys(command: KeyCommands) {
    let config = Config::load().unwrap_or_default();
    let keys_path = config.device_keys_path();
    let mut registry = match CredentialRegistry::load(&keys_path) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error loading device keys: {e}");
            std::process::exit(1);
        }
    };

    match command {
        KeyCommands::Issue {
            owner,
            label,
            device_type,
        } => {
            let credential = DeviceCredential::issue(owner, label, device_type);
            let key = credential.key_value.clone();
            registry.insert(credential);
            if let Err(e) = registry.save(&keys_path) {
                eprintln!("Error saving device keys: {e}");
                std::process::exit(1);
            }
            println!("Issued device key (store it now; it is not shown again):");
            println!("  {key}");
        }
        KeyCommands::Revoke { key } => {
            if registry.revoke(&key) {
                if let Err(e) = registry.save(&keys_path) {
                    eprintln!("Error saving device keys: {e}");
                    std::process::exit(1);
                }
                println!("Key revoked.");
            } else {
                eprintln!("No such key.");
                std::process::exit(1);
            }
        }
        KeyCommands::List => {
            if registry.is_empty() {
                println!("No device keys issued.");
                return;
            }
            println!("{} device key(s):", registry.len());
            for credential in registry.list() {
                println!(
                    "  {}  owner={}  label={}  active={}  last_used={}",
                    credential.masked_key(),
                    credential.owner_id,
                    credential.label,
                    credential.is_active,
                    credential
                        .last_used_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                );
            }
        }
    }
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = Config::load().unwrap_or_default();
    let snapshot_store = SnapshotStore::new(config.snapshots_path());

    let snapshots = snapshot_store.load_all();
    if snapshots.is_empty() {
        println!("No autosave snapshots found in {:?}", config.snapshots_path());
        println!("Run 'vitalpulse-monitor start' to begin a session.");
        return;
    }

    println!("Found {} snapshot(s)", snapshots.len());

    let export_dir = output.unwrap_or_else(|| config.export_path.clone());
    if let Err(e) = std::fs::create_dir_all(&export_dir) {
        eprintln!("Error creating export directory: {e}");
        return;
    }

    let output_path = export_dir.join(format!(
        "export_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "json" { "json" } else { "csv" }
    ));

    let result = if format == "json" {
        match serde_json::to_string_pretty(&snapshots) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    } else {
        // CSV rows: one line per window sample, annotated with the
        // snapshot's rate and risk at save time.
        let mut lines = vec!["recorded_at,value,heart_rate,risk_level".to_string()];
        for snapshot in &snapshots {
            let rate = snapshot
                .heart_rate
                .map(|r| format!("{r:.0}"))
                .unwrap_or_else(|| "--".to_string());
            let risk = snapshot
                .risk
                .as_ref()
                .map(|r| r.risk_level.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            for sample in &snapshot.window {
                lines.push(format!(
                    "{},{},{rate},{risk}",
                    sample.recorded_at.to_rfc3339(),
                    sample.value
                ));
            }
        }
        std::fs::write(&output_path, lines.join("\n"))
    };

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
