//! # Escrow Core
//!
//! Shared building blocks for the disk-key escrow protocol between edge nodes
//! and the central authority.
//!
//! ## Key Concepts
//!
//! - **Node identity**: an opaque id issued by the authority at registration
//! - **Bearer secret**: a high-entropy token whose possession authorizes a node
//! - **Disk key**: the escrowed key material used to unlock a node's encrypted volume
//!
//! ## Lifecycle
//!
//! 1. **register**: authority issues `(id, secret)`, returned exactly once
//! 2. **init-key**: authenticated node obtains a freshly escrowed disk key
//! 3. **get-key**: authenticated node retrieves the same key on every later boot

pub mod crypto;
pub mod error;
pub mod messages;
pub mod types;

pub use crypto::constant_time_eq;
pub use error::{EscrowError, Result};
pub use messages::{ErrorBody, KeyResponse, NodeCredentials, PayloadResponse};
pub use types::{DiskKey, KeyInitPolicy, NodeId, NodeSecret};
