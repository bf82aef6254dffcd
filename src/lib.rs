//! # e-CF Worker
//!
//! Numbering and certification engine for Dominican electronic invoices
//! (e-CF):
//!
//! - **Sequence ranges**: authorized number ranges per tax ID and document type,
//!   consumed atomically with low-stock alerts
//! - **Certification**: simplified invoices are transformed into the canonical
//!   payload and submitted to the certification service, with token caching,
//!   status normalization, annulment and document download
//! - **Verification links**: the URLs printed as QR codes on invoices
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           Worker Service                            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────────┐  │
//! │  │   API Layer │  │   Service   │  │   Storage   │  │  Domain    │  │
//! │  │  (Axum)     │→ │   Layer     │→ │   Layer     │  │  Models    │  │
//! │  └─────────────┘  └──────┬──────┘  └─────────────┘  └────────────┘  │
//! │                          ↓                                          │
//! │                   ┌─────────────┐                                   │
//! │                   │   Client    │ → certification service           │
//! │                   └─────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::create_router;
use crate::api::state::AppState;
use crate::client::HttpCertificationApi;
use crate::config::AppConfig;
use crate::service::SystemClock;
use crate::storage::create_storage;

/// Run the e-CF worker service.
///
/// This function:
/// 1. Loads configuration from files and environment
/// 2. Initializes the storage backend
/// 3. Creates all services
/// 4. Starts the HTTP server
/// 5. Handles graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded
/// - Storage backend fails to initialize
/// - The certification client cannot be built
/// - HTTP server fails to bind
pub async fn run() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting e-CF Worker"
    );

    let metrics = init_metrics(&config);

    // Initialize storage
    let storage = create_storage(&config.storage).await?;
    info!(backend = ?config.storage.backend, "Storage initialized");

    let api = Arc::new(HttpCertificationApi::new(config.certification.clone())?);
    info!(base_url = %config.certification.base_url, "Certification client ready");

    // Create application state
    let state = AppState::new(
        Arc::new(config.clone()),
        storage,
        api,
        Arc::new(SystemClock),
        metrics,
    );

    // Create router
    let app = create_router(state);

    // Bind to address
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging based on configuration.
fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.observability.log_format == "json" {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

/// Install the Prometheus recorder when metrics are enabled.
fn init_metrics(config: &AppConfig) -> Option<PrometheusHandle> {
    if !config.observability.metrics_enabled {
        return None;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!(error = %err, "Failed to install Prometheus recorder, metrics disabled");
            None
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
