//! kvgate - File Server and Key-Value Proxy
//!
//! This is the main entry point for the kvgate server.
//! It loads the configuration, sets up logging and the TCP listener,
//! and runs the accept loop until Ctrl+C.

use kvgate::backend::BackendClient;
use kvgate::config::Config;
use kvgate::connection::{accept_loop, ConnectionStats};
use kvgate::worker::{Dispatcher, FileServer};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Set up logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        version = kvgate::VERSION,
        address = %config.bind_address(),
        root = %config.root.display(),
        timeout = ?config.backend.timeout,
        "Starting kvgate"
    );

    if !config.root.is_dir() {
        warn!(root = %config.root.display(), "Document root is not a directory");
    }

    let backend = BackendClient::new(config.backend.clone());
    info!(backend = %backend.socket_path().display(), "Backend client ready");

    let dispatcher = Dispatcher::new(FileServer::new(&config.root), backend);
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, dispatcher, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        files_served = stats.files_served.load(Ordering::Relaxed),
        kv_exchanges = stats.kv_exchanges.load(Ordering::Relaxed),
        errors = stats.errors_reported.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
