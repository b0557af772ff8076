//! Escrow protocol logic
//!
//! Registration, key initialization, and key retrieval. Every operation but
//! registration is gated by `authenticate`, and every storage fault surfaces
//! as `ServiceUnavailable` so that an outage is never mistaken for a
//! rejected credential.

use escrow_core::{DiskKey, EscrowError, KeyInitPolicy, NodeCredentials, NodeId, NodeSecret};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::storage::{is_storable_id, CredentialStore, NodeRecord, StorageError};

/// The escrow authority
///
/// Holds an explicit handle to the credential store; there is no other
/// state, so one instance serves all requests concurrently.
#[derive(Debug, Clone)]
pub struct AuthorityService {
    store: Arc<dyn CredentialStore>,
    policy: KeyInitPolicy,
    payload_path: Option<PathBuf>,
}

impl AuthorityService {
    /// Create a service over the given store with the default key policy
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            policy: KeyInitPolicy::default(),
            payload_path: None,
        }
    }

    /// Set what `init_key` does for a node that already has a key
    pub fn with_policy(mut self, policy: KeyInitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the file served to authenticated nodes by `fetch_payload`
    pub fn with_payload_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.payload_path = Some(path.into());
        self
    }

    pub fn policy(&self) -> KeyInitPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Register a new node
    ///
    /// Returns the only copy of the node's secret the authority will ever
    /// hand out.
    pub async fn register(&self) -> Result<NodeCredentials, EscrowError> {
        let id = NodeId::generate();
        let secret = NodeSecret::generate();

        self.store
            .create(NodeRecord::new(id.clone(), secret.clone()))
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists(id) => {
                    error!(node_id = %id, "Generated node id collided with an existing record");
                    EscrowError::DuplicateId(id)
                }
                other => unavailable(other),
            })?;

        info!(node_id = %id, "Registered node");
        Ok(NodeCredentials::new(id, secret))
    }

    /// Check a presented `(id, secret)` pair against the store
    pub async fn authenticate(
        &self,
        id: &NodeId,
        secret: &NodeSecret,
    ) -> Result<NodeRecord, EscrowError> {
        // Such an id was never issued, and some backends fail on it
        if !is_storable_id(id) {
            warn!(id_len = id.as_str().len(), "Authentication failed: malformed node id");
            return Err(EscrowError::Unauthorized);
        }

        let record = match self.store.find(id).await {
            Ok(record) => record,
            Err(StorageError::NotFound(_)) => {
                warn!(node_id = %id, "Authentication failed: unknown node");
                return Err(EscrowError::Unauthorized);
            }
            Err(other) => return Err(unavailable(other)),
        };

        if !record.secret.matches(secret) {
            warn!(node_id = %id, "Authentication failed: secret mismatch");
            return Err(EscrowError::Unauthorized);
        }

        Ok(record)
    }

    /// Escrow a disk key for an authenticated node
    pub async fn init_key(&self, id: &NodeId, secret: &NodeSecret) -> Result<DiskKey, EscrowError> {
        let record = self.authenticate(id, secret).await?;

        match self.policy {
            KeyInitPolicy::Idempotent => {
                let (key, escrowed) = self.escrow_if_absent(id).await?;
                if escrowed {
                    info!(node_id = %id, "Escrowed disk key");
                } else {
                    info!(node_id = %id, "Disk key already escrowed, returning existing key");
                }
                Ok(key)
            }
            KeyInitPolicy::Regenerate => {
                if record.has_key() {
                    warn!(node_id = %id, "Replacing escrowed disk key; volumes under the old key become unreadable");
                }

                let key = DiskKey::generate();
                self.store
                    .set_key(id, key.clone())
                    .await
                    .map_err(unavailable)?;

                info!(node_id = %id, "Escrowed disk key");
                Ok(key)
            }
        }
    }

    /// Store a fresh key unless one exists; the flag tells whether this call
    /// stored it
    async fn escrow_if_absent(&self, id: &NodeId) -> Result<(DiskKey, bool), EscrowError> {
        let generated = DiskKey::generate();
        let key = self
            .store
            .set_key_if_absent(id, generated.clone())
            .await
            .map_err(unavailable)?;

        let escrowed = key == generated;
        Ok((key, escrowed))
    }

    /// Release the escrowed key to an authenticated node
    pub async fn get_key(&self, id: &NodeId, secret: &NodeSecret) -> Result<DiskKey, EscrowError> {
        let record = self.authenticate(id, secret).await?;

        match record.encryption_key {
            Some(ref key) => {
                info!(node_id = %id, "Released disk key");
                Ok(key.clone())
            }
            None => {
                warn!(node_id = %id, "Key requested before initialization");
                Err(EscrowError::KeyNotInitialized)
            }
        }
    }

    /// Serve the operator-provisioned payload file to an authenticated node
    pub async fn fetch_payload(&self, id: &NodeId, secret: &NodeSecret) -> Result<String, EscrowError> {
        self.authenticate(id, secret).await?;

        let path = self.payload_path.as_ref().ok_or(EscrowError::PayloadNotFound)?;

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                info!(node_id = %id, path = %path.display(), "Served payload");
                Ok(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Payload file missing");
                Err(EscrowError::PayloadNotFound)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read payload");
                Err(EscrowError::ServiceUnavailable(format!("payload unreadable: {}", e)))
            }
        }
    }
}

fn unavailable(err: StorageError) -> EscrowError {
    error!(error = %err, "Credential store fault");
    EscrowError::ServiceUnavailable(err.to_string())
}
