//! Node Escrow Handlers
//!
//! The three protocol operations: register, init-key, get-key. Only
//! registration is open; the other two authenticate the request body's
//! `(node_id, secret_token)` pair.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use escrow_core::{KeyResponse, NodeCredentials};
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::config::AuthorityConfig;
use crate::core::AuthorityService;

/// Application state shared across handlers
pub struct AppState {
    /// Escrow protocol service
    pub service: AuthorityService,
    /// Authority configuration
    pub config: AuthorityConfig,
}

/// Register a new node
///
/// POST /register
///
/// Returns the node's id and bearer secret. The secret is never sent again;
/// the node must persist it.
pub async fn register_node(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NodeCredentials>, ApiError> {
    let credentials = state.service.register().await?;

    info!(node_id = %credentials.node_id, "Issued node identity");

    Ok(Json(credentials))
}

/// Escrow a disk key for an authenticated node
///
/// POST /init-luks
pub async fn init_key(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NodeCredentials>, JsonRejection>,
) -> Result<Json<KeyResponse>, ApiError> {
    let Json(request) = payload?;
    let key = state
        .service
        .init_key(&request.node_id, &request.secret_token)
        .await?;

    Ok(Json(KeyResponse { luks_key: key }))
}

/// Release the escrowed disk key to an authenticated node
///
/// POST /get-key
pub async fn get_key(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NodeCredentials>, JsonRejection>,
) -> Result<Json<KeyResponse>, ApiError> {
    let Json(request) = payload?;
    let key = state
        .service
        .get_key(&request.node_id, &request.secret_token)
        .await?;

    Ok(Json(KeyResponse { luks_key: key }))
}
