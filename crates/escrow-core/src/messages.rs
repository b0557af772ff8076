//! Wire messages exchanged between nodes and the authority
//!
//! Field names follow the deployed wire format (`node_id`, `secret_token`,
//! `luks_key`). The shorter protocol names (`id`, `secret`, `key`) are
//! accepted on input.

use serde::{Deserialize, Serialize};

use crate::types::{DiskKey, NodeId, NodeSecret};

/// A node's identity and bearer secret
///
/// Returned once by `register`, sent as the body of every authenticated
/// request, and persisted as the node's local identity file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCredentials {
    /// Identity issued at registration
    #[serde(alias = "id")]
    pub node_id: NodeId,

    /// Bearer secret issued at registration
    #[serde(alias = "secret")]
    pub secret_token: NodeSecret,
}

impl NodeCredentials {
    pub fn new(node_id: NodeId, secret_token: NodeSecret) -> Self {
        Self {
            node_id,
            secret_token,
        }
    }
}

/// Response carrying an escrowed disk key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResponse {
    #[serde(alias = "key")]
    pub luks_key: DiskKey,
}

/// Response carrying the operator-provisioned payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadResponse {
    pub file_content: String,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}
