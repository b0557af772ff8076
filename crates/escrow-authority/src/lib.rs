//! Escrow Authority Server
//!
//! The central authority for disk-encrypted edge nodes. It:
//! - Issues node identities and bearer secrets at registration
//! - Generates and escrows one disk-encryption key per node
//! - Releases that key only to a node presenting its exact `(id, secret)`
//!
//! ## Guarantees
//!
//! 1. **IDENTITY**: node ids are random 128-bit values, unique per store
//! 2. **SECRECY**: a secret is transmitted once, at registration, and never logged
//! 3. **STABILITY**: under the default policy a node's key is set once and never changes
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with store status
//! - `POST /register` - Issue a node identity and secret
//! - `POST /init-luks` - Escrow a disk key for an authenticated node
//! - `POST /get-key` - Release the escrowed key to an authenticated node
//! - `POST /run-secure-code` - Serve the operator payload to an authenticated node

pub mod api;
pub mod config;
pub mod core;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::AuthorityConfig;
pub use core::AuthorityService;
pub use storage::{CredentialStore, MemoryStore, NodeRecord, StorageError};
#[cfg(feature = "postgres")]
pub use storage::PostgresStore;
