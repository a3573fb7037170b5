pub mod response;

use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tracing::info;

use crate::config::Config;
use crate::features::{self, FeatureState};
use crate::import::Reconciler;
use crate::middleware;
use response::ErrorResponse;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Reconciler,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = FeatureState {
        reconciler: state.reconciler.clone(),
        uploaded_dir: config.queue.uploaded_dir(),
    };

    let api_v1 = features::router(feature_state).merge(
        Router::new()
            .route("/health", get(health_check))
            .with_state(state),
    );

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", api_v1)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "bizsync",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Response {
    match state.reconciler.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "store": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("STORE_ERROR", "The company store is unavailable")),
            )
                .into_response()
        },
    }
}

/// Serve until a shutdown signal arrives, then cancel `shutdown`
pub async fn serve(config: &Config, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = create_router(state, config);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = wait_for_signal(
        "SIGTERM",
        signal::unix::signal(signal::unix::SignalKind::terminate()).map(|mut signal| async move {
            signal.recv().await;
        }),
    );

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
        _ = shutdown.cancelled() => {
            info!("Shutdown requested");
        },
    }

    shutdown.cancel();
}

/// Resolve when an installed signal fires. A handler that failed to install
/// never resolves, so it cannot trigger a shutdown.
async fn wait_for_signal<F>(name: &str, installed: std::io::Result<F>)
where
    F: std::future::Future<Output = ()>,
{
    match installed {
        Ok(fired) => fired.await,
        Err(e) => {
            tracing::error!("Failed to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        },
    }
}

/// Wait for a background task, giving up after `timeout`
pub async fn join_with_timeout(handle: tokio::task::JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => tracing::error!(error = %e, "Background task failed"),
        Err(_) => tracing::warn!(timeout_secs = timeout.as_secs(), "Background task did not stop in time"),
    }
}
