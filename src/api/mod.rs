// Ops HTTP routes: health, Prometheus metrics and raid cache status.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::metrics;
use crate::refresh::SnapshotRefresher;
use crate::store::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub refresher: Arc<SnapshotRefresher>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(store: Arc<SnapshotStore>, refresher: Arc<SnapshotRefresher>) -> Router {
    let state = AppState { store, refresher };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .route("/api/cache", get(cache_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the ops routes until the process exits.
pub async fn serve(port: u16, router: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Ops server listening on port {port}");
    axum::serve(listener, router).await
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "raiden-bot",
        "cache_ready": state.store.is_ready(),
    }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

async fn cache_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.status() {
        Some(status) => (
            StatusCode::OK,
            Json(json!({
                "last_update": status.last_update,
                "collections": status.collections,
                "previous_nations": status.previous_nations,
                "refreshing": state.refresher.is_running(),
            })),
        )
            .into_response(),
        None => json_error(StatusCode::SERVICE_UNAVAILABLE, "cache not ready").into_response(),
    }
}
