//! HTTP routes for the referee lights service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::observability::health_router;
use crate::service::LightsService;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub service: Arc<LightsService>,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<LightsService>) -> Self {
        Self { service }
    }
}

/// Build the application routes.
///
/// - `/referee-updates` - WebSocket endpoint for referee and display pages
/// - `/admin/meets[...]` - meet inspection and reset
/// - `/health`, `/ready` - probes
/// - `/metrics` - Prometheus exposition, when a recorder handle is supplied
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let health = health_router(Arc::clone(state.service.health()));

    let mut app = Router::new()
        .route("/referee-updates", get(handlers::referee_updates))
        .route("/admin/meets", get(handlers::list_meets))
        .route("/admin/meets/:meet_name", get(handlers::get_meet))
        .route("/admin/meets/:meet_name/reset", post(handlers::reset_meet))
        .with_state(state)
        .merge(health);

    if let Some(handle) = metrics_handle {
        app = app.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    app.layer(TraceLayer::new_for_http())
}
