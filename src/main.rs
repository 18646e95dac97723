//! Window Control - Main entry point
//!
//! This binary runs the window tracker as a daemon and prints lifecycle
//! events as JSON lines.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use window_control::{Config, LoggingCaptureSink, WindowTracker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so it can drive the log filter
    let config = Config::load();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.general.log_level.clone()));
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting window control");
    info!("Configuration loaded from {:?}", Config::default_config_path());

    if !config.general.enabled {
        info!("Tracking is disabled in configuration, exiting");
        return Ok(());
    }

    let mut tracker = WindowTracker::new(config, Arc::new(LoggingCaptureSink));
    tracker.start()?;

    // Drain lifecycle events and pump uploads at a consumer cadence well
    // below the poll rate
    let mut tick_interval = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                for message in tracker.drain_events() {
                    match serde_json::to_string(&message) {
                        Ok(line) => println!("{line}"),
                        Err(e) => error!("Failed to serialize event: {}", e),
                    }
                }
                tracker.trigger_gpu_upload();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    tracker.stop();
    Ok(())
}
