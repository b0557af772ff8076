//! API module for the escrow authority

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub storage: String,
    pub key_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u64>,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
///
/// Not ready while the credential store is unreachable.
pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let count = state.service.store().count().await;
    let storage = state.config.storage_kind().to_string();
    let key_policy = state.service.policy().to_string();

    match count {
        Ok(count) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                storage,
                key_policy,
                node_count: Some(count),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    storage,
                    key_policy,
                    node_count: None,
                }),
            )
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Escrow protocol
        .route("/register", post(handlers::register_node))
        .route("/init-luks", post(handlers::init_key))
        .route("/get-key", post(handlers::get_key))
        // Payload delivery
        .route("/run-secure-code", post(handlers::fetch_payload))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
