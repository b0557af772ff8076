//! Payload Delivery Handler
//!
//! Serves a single operator-provisioned file to authenticated nodes, e.g. a
//! post-unlock setup script.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use escrow_core::{NodeCredentials, PayloadResponse};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::handlers::nodes::AppState;

/// POST /run-secure-code
pub async fn fetch_payload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NodeCredentials>, JsonRejection>,
) -> Result<Json<PayloadResponse>, ApiError> {
    let Json(request) = payload?;
    let file_content = state
        .service
        .fetch_payload(&request.node_id, &request.secret_token)
        .await?;

    Ok(Json(PayloadResponse { file_content }))
}
