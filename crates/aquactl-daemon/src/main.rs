//! `aquactld` – supply-controller daemon.
//!
//! Assembles a rig, hands it to the [`SupplyController`] and drives the
//! supervisory poll loop until Ctrl-C.  The stock build runs against the
//! simulated rig; a hardware deployment swaps the rig assembly for real
//! line drivers and keeps everything above it unchanged.

mod config;
mod status;

use std::sync::Arc;

use aquactl_core::{SimRig, SupplyConfig, SupplyController};
use aquactl_hal::{Clock, SystemClock, Telemetry, ValueBus};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set AQUACTL_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("AQUACTL_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    info!("aquactld v{} starting", env!("CARGO_PKG_VERSION"));

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!("Config loaded from {}", config::config_path().display());
            cfg
        }
        Ok(None) => {
            info!("No config file; using defaults");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            error!("Config error: {e}; using defaults");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Rig assembly ──────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let bus = Arc::new(ValueBus::new());
    let telemetry: Arc<dyn Telemetry> = bus.clone();

    let (parts, _handles) = SimRig::new()
        .valve_timeout(cfg.valve_timeout())
        .with_valve_feedback(cfg.valve_feedback)
        .leak_sensors(cfg.leak_sensors)
        .build(clock.clone(), telemetry.clone());

    let supply_config = SupplyConfig {
        state_file: cfg.state_file_path(),
        recover_delay: cfg.recover_delay(),
        ..Default::default()
    };
    let supply = SupplyController::new(parts, supply_config, clock, telemetry);

    info!(
        state = %supply.state(),
        mode = %supply.mode(),
        "Supply controller ready"
    );

    // ── Supervisory loop ──────────────────────────────────────────────────
    let mut ticker = tokio::time::interval(cfg.poll_interval());
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                supply.poll();
                ticks += 1;
                if cfg.status_every_ticks != 0 && ticks % cfg.status_every_ticks == 0 {
                    debug!(status = %status::snapshot_json(&bus), "status snapshot");
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Ctrl-C handler failed: {e}");
                }
                break;
            }
        }
    }

    info!(
        state = %supply.state(),
        mode = %supply.mode(),
        "aquactld shutting down"
    );
}
