//! API error types and responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use escrow_core::{error::codes, ErrorBody, EscrowError};
use thiserror::Error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Key not initialized")]
    KeyNotInitialized,

    #[error("Payload not found")]
    PayloadNotFound,

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, codes::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                "Unauthorized".to_string(),
            ),
            ApiError::KeyNotInitialized => (
                StatusCode::NOT_FOUND,
                codes::KEY_NOT_INITIALIZED,
                "LUKS key not found".to_string(),
            ),
            ApiError::PayloadNotFound => (
                StatusCode::NOT_FOUND,
                codes::PAYLOAD_NOT_FOUND,
                "File not found".to_string(),
            ),
            ApiError::DuplicateId(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::DUPLICATE_ID,
                msg.clone(),
            ),
            // Storage detail stays in the server log
            ApiError::ServiceUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                codes::SERVICE_UNAVAILABLE,
                "Credential store unavailable".to_string(),
            ),
        };

        let body = ErrorBody {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EscrowError> for ApiError {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::Unauthorized => ApiError::Unauthorized,
            EscrowError::KeyNotInitialized => ApiError::KeyNotInitialized,
            EscrowError::PayloadNotFound => ApiError::PayloadNotFound,
            EscrowError::DuplicateId(id) => {
                ApiError::DuplicateId(format!("Registration failed for generated id {}", id))
            }
            EscrowError::ServiceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EscrowError::Unauthorized, StatusCode::UNAUTHORIZED),
            (EscrowError::KeyNotInitialized, StatusCode::NOT_FOUND),
            (EscrowError::PayloadNotFound, StatusCode::NOT_FOUND),
            (EscrowError::DuplicateId("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                EscrowError::ServiceUnavailable("db".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[tokio::test]
    async fn test_duplicate_id_body() {
        let response = ApiError::from(EscrowError::DuplicateId("abc".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body(response).await;
        assert_eq!(body.code, codes::DUPLICATE_ID);
        assert!(body.error.contains("abc"));
    }

    #[tokio::test]
    async fn test_bad_request_body() {
        let response = ApiError::BadRequest("missing field `secret_token`".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body(response).await;
        assert_eq!(body.code, codes::BAD_REQUEST);
        assert!(body.error.contains("secret_token"));
    }
}
