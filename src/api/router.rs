//! Router setup and configuration.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{certification, health, invoices, numbers, ranges};
use crate::api::middleware::auth::{require_admin, require_key};
use crate::api::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    // Health and metrics routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(&state.config.observability.metrics_path, get(health::metrics));

    // Range administration (admin auth required)
    let range_routes = Router::new()
        .route("/", post(ranges::create_range).get(ranges::list_ranges))
        .route("/stats", get(ranges::range_stats))
        .route(
            "/{id}",
            get(ranges::get_range)
                .patch(ranges::update_range)
                .delete(ranges::delete_range),
        )
        .route("/{id}/state", put(ranges::set_range_state))
        .route("/{id}/next", get(ranges::preview_next))
        .route("/{id}/consume", post(ranges::consume_number))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Number requests (key auth required)
    let number_routes = Router::new()
        .route("/request", post(numbers::request_number))
        .layer(middleware::from_fn_with_state(state.clone(), require_key));

    // Invoice operations (key auth required)
    let invoice_routes = Router::new()
        .route("/submit", post(invoices::submit_invoice))
        .route("/status", post(invoices::invoice_status))
        .route("/annul", post(invoices::annul_numbers))
        .route("/download", post(invoices::download_document))
        .route("/qr-link", post(invoices::qr_link))
        .layer(middleware::from_fn_with_state(state.clone(), require_key));

    // Certification session (admin auth required)
    let certification_routes = Router::new()
        .route("/token/reset", post(certification::reset_token))
        .route("/health", get(certification::upstream_health))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let body_limit = DefaultBodyLimit::max(state.config.server.body_limit);

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .nest("/v1/ranges", range_routes)
        .nest("/v1/numbers", number_routes)
        .nest("/v1/invoices", invoice_routes)
        .nest("/v1/certification", certification_routes)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
