//! Storage abstraction for the escrow authority
//!
//! This module provides a trait-based abstraction for the credential store,
//! with an in-memory backend (tests, development) and a persistent
//! PostgreSQL backend (production).
//!
//! Persistent storage is required in production so that:
//! - Node identities survive authority restarts
//! - Escrowed disk keys are never lost (a lost key means an unreadable volume)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use escrow_core::{DiskKey, NodeId, NodeSecret};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::warn;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Node already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Longest id the stores accept; matches the PostgreSQL `id` column
pub const MAX_ID_LEN: usize = 64;

/// Whether `id` could have been issued and stored
///
/// Ids with a NUL byte or longer than [`MAX_ID_LEN`] never match a record.
/// PostgreSQL rejects NUL in text parameters outright.
pub fn is_storable_id(id: &NodeId) -> bool {
    let id = id.as_str();
    id.len() <= MAX_ID_LEN && !id.contains('\0')
}

/// One registered node
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Identity issued at registration
    pub id: NodeId,
    /// Bearer secret issued at registration
    pub secret: NodeSecret,
    /// Escrowed disk key, absent until key initialization
    pub encryption_key: Option<DiskKey>,
    /// When the node registered
    pub registered_at: DateTime<Utc>,
    /// When the current key was stored
    pub key_initialized_at: Option<DateTime<Utc>>,
}

impl NodeRecord {
    /// A freshly registered node with no key
    pub fn new(id: NodeId, secret: NodeSecret) -> Self {
        Self {
            id,
            secret,
            encryption_key: None,
            registered_at: Utc::now(),
            key_initialized_at: None,
        }
    }

    pub fn has_key(&self) -> bool {
        self.encryption_key.is_some()
    }
}

/// Credential store backing the authority
///
/// Implementations must be thread-safe and make every operation atomic per
/// record. Records are never deleted and never listed.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Insert a new record; fails with `AlreadyExists` if the id is taken.
    ///
    /// Uniqueness must be enforced atomically, not checked then inserted.
    async fn create(&self, record: NodeRecord) -> Result<(), StorageError>;

    /// Exact lookup by id
    async fn find(&self, id: &NodeId) -> Result<NodeRecord, StorageError>;

    /// Set (or replace) the escrowed key of an existing record
    async fn set_key(&self, id: &NodeId, key: DiskKey) -> Result<(), StorageError>;

    /// Store `key` only if the record has none yet.
    ///
    /// Returns the key held by the record afterwards, which is the
    /// previously stored key when one existed.
    async fn set_key_if_absent(&self, id: &NodeId, key: DiskKey) -> Result<DiskKey, StorageError>;

    /// Number of registered nodes
    async fn count(&self) -> Result<u64, StorageError>;
}

/// Open the credential store selected by the configuration
///
/// A database URL selects PostgreSQL; without one the authority runs on
/// the in-memory store, which loses every escrowed key on restart.
pub async fn connect(database_url: Option<&str>) -> Result<Arc<dyn CredentialStore>, StorageError> {
    match database_url {
        #[cfg(feature = "postgres")]
        Some(url) => Ok(Arc::new(PostgresStore::new(url).await?)),
        #[cfg(not(feature = "postgres"))]
        Some(_) => Err(StorageError::Connection(
            "DATABASE_URL set but built without the 'postgres' feature".into(),
        )),
        None => {
            warn!("No DATABASE_URL configured; using in-memory store, escrowed keys will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storable_ids() {
        assert!(is_storable_id(&NodeId::generate()));
        assert!(is_storable_id(&NodeId::from("a".repeat(MAX_ID_LEN))));

        assert!(!is_storable_id(&NodeId::from("a".repeat(MAX_ID_LEN + 1))));
        assert!(!is_storable_id(&NodeId::from("a\0b")));
        assert!(!is_storable_id(&NodeId::from("\0")));
    }
}
