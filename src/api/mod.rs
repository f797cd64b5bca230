pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::SmsPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SmsPipeline>,
}

pub fn router(pipeline: Arc<SmsPipeline>) -> Router {
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/sms", post(handlers::process_sms))
        .route("/api/v1/analytics", post(handlers::analytics))
        .route("/api/v1/ml/retrain", post(handlers::retrain))
        .route("/api/v1/ml/status", get(handlers::ml_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    pipeline: Arc<SmsPipeline>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(pipeline);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
