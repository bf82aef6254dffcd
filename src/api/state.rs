//! Application state for Axum handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::client::CertificationApi;
use crate::config::AppConfig;
use crate::service::{AllocatorService, CertificationGateway, Clock, create_notifier};
use crate::storage::Storage;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Storage backend.
    pub storage: Arc<dyn Storage>,
    /// Number range allocation.
    pub allocator: Arc<AllocatorService>,
    /// Certification service gateway.
    pub gateway: Arc<CertificationGateway>,
    /// Prometheus renderer; `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: Arc<AppConfig>,
        storage: Arc<dyn Storage>,
        api: Arc<dyn CertificationApi>,
        clock: Arc<dyn Clock>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let allocator = Arc::new(AllocatorService::new(
            Arc::clone(&storage),
            Arc::clone(&clock),
            &config.sequence,
        ));

        let notifier = create_notifier(&config.notification);
        let gateway = Arc::new(CertificationGateway::new(
            api,
            clock,
            notifier,
            &config.certification,
        ));

        Self {
            config,
            storage,
            allocator,
            gateway,
            metrics,
        }
    }
}
