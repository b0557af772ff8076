//! Attack Scenario Tests
//!
//! These tests verify that a disk key is released only to the node that
//! holds the exact `(id, secret)` pair issued at registration. Each test
//! represents a credential misuse that must be blocked.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use escrow_authority::{
    create_router, AppState, AuthorityConfig, AuthorityService, CredentialStore, MemoryStore,
    NodeRecord, StorageError,
};
use escrow_core::{DiskKey, ErrorBody, KeyResponse, NodeCredentials, NodeId};
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

fn app() -> Router {
    create_router(Arc::new(AppState {
        service: AuthorityService::new(Arc::new(MemoryStore::new())),
        config: AuthorityConfig::default(),
    }))
}

async fn post(app: &Router, path: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method("POST").uri(path);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn register(app: &Router) -> NodeCredentials {
    let (status, body) = post(app, "/register", None).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

/// Register a node and escrow its key
async fn provisioned(app: &Router) -> (NodeCredentials, KeyResponse) {
    let creds = register(app).await;
    let (status, body) = post(app, "/init-luks", Some(credentials(&creds))).await;
    assert_eq!(status, StatusCode::OK);
    (creds, serde_json::from_slice(&body).unwrap())
}

fn credentials(creds: &NodeCredentials) -> Value {
    body(creds.node_id.as_str(), creds.secret_token.expose())
}

fn body(node_id: &str, secret: &str) -> Value {
    json!({"node_id": node_id, "secret_token": secret})
}

/// Both key endpoints must reject the request with UNAUTHORIZED
async fn assert_rejected(app: &Router, request: Value) {
    for path in ["/get-key", "/init-luks"] {
        let (status, bytes) = post(app, path, Some(request.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} must reject", path);

        let error: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error.code, "UNAUTHORIZED");
        assert!(!String::from_utf8_lossy(&bytes).contains("luks_key"));
    }
}

// =============================================================================
// ATTACK: Credential Guessing
// =============================================================================

/// An attacker who knows a node id but not its secret gets nothing.
#[tokio::test]
async fn attack_wrong_secret_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;

    assert_rejected(&app, body(victim.node_id.as_str(), "guess")).await;
}

/// A secret that differs only in letter case is a different secret.
#[tokio::test]
async fn attack_case_altered_secret_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;

    let secret = victim.secret_token.expose();
    let flipped: String = secret
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect();
    assert_ne!(flipped, secret);

    assert_rejected(&app, body(victim.node_id.as_str(), &flipped)).await;
}

/// Truncated and extended secrets are rejected.
#[tokio::test]
async fn attack_prefix_and_suffix_secret_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;
    let secret = victim.secret_token.expose();

    assert_rejected(&app, body(victim.node_id.as_str(), &secret[..secret.len() - 1])).await;
    assert_rejected(&app, body(victim.node_id.as_str(), &format!("{}A", secret))).await;
}

/// An empty secret never matches.
#[tokio::test]
async fn attack_empty_secret_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;

    assert_rejected(&app, body(victim.node_id.as_str(), "")).await;
}

// =============================================================================
// ATTACK: Cross-Node Access
// =============================================================================

/// Node B's valid secret does not open node A's key.
#[tokio::test]
async fn attack_other_nodes_secret_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;
    let (attacker, _) = provisioned(&app).await;

    assert_rejected(
        &app,
        body(victim.node_id.as_str(), attacker.secret_token.expose()),
    )
    .await;
}

/// Swapping id and secret fields does not authenticate.
#[tokio::test]
async fn attack_swapped_fields_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;

    assert_rejected(
        &app,
        body(victim.secret_token.expose(), victim.node_id.as_str()),
    )
    .await;
}

/// An unknown id is indistinguishable from a wrong secret.
#[tokio::test]
async fn attack_unknown_id_looks_like_wrong_secret() {
    let app = app();
    let (victim, _) = provisioned(&app).await;

    let (_, unknown) = post(
        &app,
        "/get-key",
        Some(body(NodeId::generate().as_str(), victim.secret_token.expose())),
    )
    .await;
    let (_, wrong) = post(&app, "/get-key", Some(body(victim.node_id.as_str(), "guess"))).await;

    assert_eq!(unknown, wrong);
}

/// A rejected attempt does not disturb the victim's escrowed key.
#[tokio::test]
async fn attack_failed_init_does_not_replace_key() {
    let app = app();
    let (victim, original) = provisioned(&app).await;

    assert_rejected(&app, body(victim.node_id.as_str(), "guess")).await;

    let (status, bytes) = post(&app, "/get-key", Some(credentials(&victim))).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: KeyResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(fetched.luks_key, original.luks_key);
}

/// Re-running init with valid credentials cannot be used to rotate the key.
#[tokio::test]
async fn attack_replayed_init_keeps_key() {
    let app = app();
    let (victim, original) = provisioned(&app).await;

    let (status, bytes) = post(&app, "/init-luks", Some(credentials(&victim))).await;
    assert_eq!(status, StatusCode::OK);
    let replayed: KeyResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(replayed.luks_key, original.luks_key);
}

// =============================================================================
// ATTACK: Malformed Identifiers
// =============================================================================

/// Ids that no store could hold are rejected like any unknown id, even
/// when the store itself would fault on them.
#[tokio::test]
async fn attack_unstorable_id_rejected() {
    let app = app();
    let (victim, _) = provisioned(&app).await;
    let secret = victim.secret_token.expose();

    let with_nul = format!("{}\u{0}", victim.node_id);
    let too_long = "a".repeat(65);
    for id in ["a\u{0}b", with_nul.as_str(), too_long.as_str()] {
        assert_rejected(&app, body(id, secret)).await;
    }

    let offline = create_router(Arc::new(AppState {
        service: AuthorityService::new(Arc::new(OfflineStore)),
        config: AuthorityConfig::default(),
    }));
    assert_rejected(&offline, json!({"node_id": "a\u{0}b", "secret_token": "x"})).await;
}

// =============================================================================
// Outage Handling
// =============================================================================

#[derive(Debug)]
struct OfflineStore;

#[async_trait]
impl CredentialStore for OfflineStore {
    async fn create(&self, _record: NodeRecord) -> Result<(), StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }
    async fn find(&self, _id: &NodeId) -> Result<NodeRecord, StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }
    async fn set_key(&self, _id: &NodeId, _key: DiskKey) -> Result<(), StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }
    async fn set_key_if_absent(&self, _id: &NodeId, _key: DiskKey) -> Result<DiskKey, StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }
    async fn count(&self) -> Result<u64, StorageError> {
        Err(StorageError::Connection("connection refused".into()))
    }
}

/// A store outage must never read as a rejected credential, or a node
/// would treat a transient fault as permanent.
#[tokio::test]
async fn outage_is_not_unauthorized() {
    let app = create_router(Arc::new(AppState {
        service: AuthorityService::new(Arc::new(OfflineStore)),
        config: AuthorityConfig::default(),
    }));

    let request = body(NodeId::generate().as_str(), "whatever");
    for path in ["/get-key", "/init-luks"] {
        let (status, bytes) = post(&app, path, Some(request.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let error: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error.code, "SERVICE_UNAVAILABLE");
        assert!(!error.error.contains("connection refused"));
    }

    let (status, _) = post(&app, "/register", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
