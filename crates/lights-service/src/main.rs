//! Referee Lights Service
//!
//! WebSocket server coordinating referee decisions, result displays and
//! countdown timers for powerlifting meets.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Build the service (registry, state store, broadcaster, timers)
//! 4. Bind the HTTP listener (WebSocket, admin, health, metrics)
//! 5. Mark ready and serve until a shutdown signal arrives

#![warn(clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use lights_service::config::Config;
use lights_service::observability::metrics::init_metrics_recorder;
use lights_service::routes::{build_routes, AppState};
use lights_service::service::LightsService;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to connections to flush `serverShutdown` before cancellation.
const SHUTDOWN_FLUSH_GRACE: Duration = Duration::from_millis(500);

/// Upper bound on waiting for the broadcast task to drain.
const BROADCAST_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lights=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Referee Lights Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        required_referees = config.required_referees,
        tick_interval_ms = u64::try_from(config.timers.tick_interval.as_millis()).unwrap_or(u64::MAX),
        platform_ready_seconds = config.timers.platform_ready.as_secs(),
        next_attempt_seconds = config.timers.next_attempt_seconds,
        results_display_seconds = config.timers.results_display.as_secs(),
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let shutdown_token = CancellationToken::new();
    let (service, broadcast_task) = LightsService::new(&config, shutdown_token.clone());

    let app = build_routes(
        Arc::new(AppState::new(Arc::clone(&service))),
        Some(prometheus_handle),
    );

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %config.bind_address, "Failed to bind listener");
            format!("Failed to bind {}: {e}", config.bind_address)
        })?;
    info!(addr = %config.bind_address, "Listener bound");

    let server_token = shutdown_token.clone();
    let server = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    service.health().set_ready();
    info!("Referee Lights Service running - press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop advertising readiness and tell every client before tearing down
    service.begin_shutdown("server shutting down");
    tokio::time::sleep(SHUTDOWN_FLUSH_GRACE).await;

    // Propagates to connections, timers and the broadcast task
    service.cancel();

    if tokio::time::timeout(BROADCAST_DRAIN_TIMEOUT, broadcast_task)
        .await
        .is_err()
    {
        warn!("Broadcast task did not drain before timeout");
    }
    if let Err(e) = server.await {
        warn!(error = %e, "HTTP server task failed");
    }

    info!("Referee Lights Service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
