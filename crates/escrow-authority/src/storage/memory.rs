//! In-memory storage backend
//!
//! Suitable for development and tests. Data is lost on restart, which for
//! an escrow service means every node loses its key: never run it in
//! production.

use async_trait::async_trait;
use chrono::Utc;
use escrow_core::{DiskKey, NodeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use super::{CredentialStore, NodeRecord, StorageError};

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<NodeId, NodeRecord>>, StorageError> {
        self.nodes
            .read()
            .map_err(|_| StorageError::Database("node table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<NodeId, NodeRecord>>, StorageError> {
        self.nodes
            .write()
            .map_err(|_| StorageError::Database("node table lock poisoned".into()))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, record: NodeRecord) -> Result<(), StorageError> {
        let mut nodes = self.write()?;
        match nodes.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(record.id.to_string())),
            Entry::Vacant(slot) => {
                info!(node_id = %record.id, "Created node record");
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn find(&self, id: &NodeId) -> Result<NodeRecord, StorageError> {
        let nodes = self.read()?;
        nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn set_key(&self, id: &NodeId, key: DiskKey) -> Result<(), StorageError> {
        let mut nodes = self.write()?;
        let record = nodes
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        record.encryption_key = Some(key);
        record.key_initialized_at = Some(Utc::now());
        info!(node_id = %id, "Stored disk key");
        Ok(())
    }

    async fn set_key_if_absent(&self, id: &NodeId, key: DiskKey) -> Result<DiskKey, StorageError> {
        let mut nodes = self.write()?;
        let record = nodes
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if let Some(existing) = &record.encryption_key {
            return Ok(existing.clone());
        }

        record.encryption_key = Some(key.clone());
        record.key_initialized_at = Some(Utc::now());
        info!(node_id = %id, "Stored disk key");
        Ok(key)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.read()?.len() as u64)
    }
}
