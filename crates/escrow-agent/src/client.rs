//! Client for the escrow authority

use async_trait::async_trait;
use escrow_core::{DiskKey, ErrorBody, EscrowError, KeyResponse, NodeCredentials};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{AgentError, Result};

/// The authority operations a node performs
///
/// Implementations must report authority outcomes as `AgentError::Escrow`
/// and network faults as `AgentError::Transport`, so that a fault is never
/// read as a rejected credential.
#[async_trait]
pub trait AuthorityApi: Send + Sync {
    /// Obtain a fresh identity and bearer secret
    async fn register(&self) -> Result<NodeCredentials>;

    /// Have the authority escrow a disk key for this node
    async fn init_key(&self, credentials: &NodeCredentials) -> Result<DiskKey>;

    /// Retrieve the escrowed disk key
    async fn get_key(&self, credentials: &NodeCredentials) -> Result<DiskKey>;
}

/// HTTP/JSON client for the escrow authority
#[derive(Debug, Clone)]
pub struct HttpAuthorityClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpAuthorityClient {
    /// Create a client for the authority at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http_client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: Option<&NodeCredentials>) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling authority");

        let mut request = self.http_client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AgentError::Transport(format!("Invalid response from {}: {}", path, e)));
        }

        let text = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &text))
    }
}

/// Rebuild the authority's error from a failed response
///
/// The error code in the body decides. Without a recognizable code, 401
/// means unauthorized, 5xx an outage and any other 4xx a rejected request.
/// Remaining statuses are treated as transport faults.
pub fn error_from_response(status: StatusCode, body: &str) -> AgentError {
    if let Ok(error) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(escrow) = EscrowError::from_code(&error.code, &error.error) {
            return escrow.into();
        }
    }

    if status == StatusCode::UNAUTHORIZED {
        return EscrowError::Unauthorized.into();
    }
    if status.is_server_error() {
        return EscrowError::ServiceUnavailable(status.to_string()).into();
    }

    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            serde_json::from_str::<ErrorBody>(body)
                .ok()
                .map(|e| format!("{} ({})", e.error, e.code))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status.is_client_error() {
        return AgentError::Rejected(format!("{}: {}", status, detail));
    }
    AgentError::Transport(format!("Unexpected status {}: {}", status, detail))
}

#[async_trait]
impl AuthorityApi for HttpAuthorityClient {
    async fn register(&self) -> Result<NodeCredentials> {
        self.post("/register", None).await
    }

    async fn init_key(&self, credentials: &NodeCredentials) -> Result<DiskKey> {
        let response: KeyResponse = self.post("/init-luks", Some(credentials)).await?;
        Ok(response.luks_key)
    }

    async fn get_key(&self, credentials: &NodeCredentials) -> Result<DiskKey> {
        let response: KeyResponse = self.post("/get-key", Some(credentials)).await?;
        Ok(response.luks_key)
    }
}
