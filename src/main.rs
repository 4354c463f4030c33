//! Mixer GW - Rust implementation
//!
//! Bridges a hardware digital mixer to any number of web UI clients, keeping
//! every connected client's view consistent with the mixer and each other.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixer_gw::api::{self, ApiState};
use mixer_gw::broadcast::ClientRegistry;
use mixer_gw::config::{Args, GatewayConfig};
use mixer_gw::layout::LayoutStore;
use mixer_gw::link::{self, TelemetryEvent};
use mixer_gw::state::MixerStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("Starting Mixer GW...");

    let config = GatewayConfig::from_args(&args)?;
    info!(
        "Mixer host: {} ({} channels, {} aux buses)",
        config.host,
        config.channel_ids.len(),
        config.aux_ids.len()
    );
    info!("Layout file: {}", config.layout_path.display());

    // Authoritative state, fixed universe
    let store = MixerStore::new(&config.host, &config.channel_ids, &config.aux_ids);

    // Persisted layout configuration, self-healing load
    let layout = LayoutStore::new(
        config.layout_path.clone(),
        config.layout_seed.clone(),
        &config.channel_ids,
        &config.aux_ids,
    );
    layout.load().await;

    let clients = ClientRegistry::new();

    // Telemetry pump: the hardware protocol client feeds this channel; each
    // event is applied to the store and broadcast in commit order. The sender
    // stays alive for the process lifetime as the link's attach point.
    let (telemetry_tx, telemetry_rx) = mpsc::channel::<TelemetryEvent>(1024);
    tokio::spawn(link::run_telemetry(telemetry_rx, store.clone(), clients.clone()));
    let _telemetry_tx = telemetry_tx;

    // No protocol client is bundled yet; when one is, it attaches here and
    // channel updates from the API are pushed down to the hardware.
    let api_state = Arc::new(ApiState { store, layout, clients, link: None });

    tokio::select! {
        result = api::start_server(api_state, config.port) => {
            result?;
        }
        _ = shutdown_signal() => {}
    }

    info!("Mixer GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
