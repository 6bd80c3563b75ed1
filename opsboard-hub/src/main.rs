//! opsboard hub: WebSocket notification router and scheduled jobs.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:7400
//! cargo run --bin opsboard-hub
//!
//! # Custom address and a faster sweep
//! cargo run --bin opsboard-hub -- --bind 127.0.0.1:8080 --sweep-interval-secs 600
//!
//! # Or via environment variable
//! OPSBOARD_ADDR=127.0.0.1:8080 cargo run --bin opsboard-hub
//! ```

use std::sync::Arc;

use clap::Parser;
use mockable::DefaultClock;
use opsboard::dispatch::Dispatcher;
use opsboard::lifecycle::MissionEngine;
use opsboard::mail::LogMailer;
use opsboard::memory::MemoryStore;
use opsboard_hub::config::{HubCliArgs, HubConfig};
use opsboard_hub::jobs;
use opsboard_hub::router::ConnectionManager;
use opsboard_hub::server::{self, HubState};

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting opsboard hub");

    let router = Arc::new(ConnectionManager::with_room_limit(
        config.max_rooms_per_connection,
    ));
    let clock = Arc::new(DefaultClock);
    let engine = MissionEngine::new(Arc::new(MemoryStore::new()), Arc::clone(&clock));
    let dispatcher = Dispatcher::new(Arc::clone(&router), Arc::new(LogMailer));

    let sweeps = tokio::spawn(jobs::run_deadline_sweeps(
        engine.clone(),
        dispatcher.clone(),
        config.sweep_interval,
        chrono::Duration::hours(config.deadline_window_hours),
    ));
    let resets = tokio::spawn(jobs::run_monthly_reset(engine, dispatcher, clock));

    let state = Arc::new(HubState::with_frame_limit(
        Arc::clone(&router),
        config.max_frame_size,
    ));
    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "hub listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "hub server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub");
            std::process::exit(1);
        }
    }

    router.close_all().await;
    sweeps.abort();
    resets.abort();
}
