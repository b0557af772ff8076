//! Error types for the escrow protocol

use thiserror::Error;

/// Result type alias using EscrowError
pub type Result<T> = std::result::Result<T, EscrowError>;

/// Wire codes carried in error bodies
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const KEY_NOT_INITIALIZED: &str = "KEY_NOT_INITIALIZED";
    pub const PAYLOAD_NOT_FOUND: &str = "PAYLOAD_NOT_FOUND";
    pub const DUPLICATE_ID: &str = "DUPLICATE_ID";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Errors that can occur in the escrow protocol
///
/// `Unauthorized` and `KeyNotInitialized` are the domain outcomes a node
/// must act on. `ServiceUnavailable` is a fault on the authority side and
/// must never be read as a rejected credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// Unknown node id or secret mismatch
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid credential, no key escrowed yet
    #[error("Key not initialized")]
    KeyNotInitialized,

    /// Authenticated, but no payload is provisioned on the authority
    #[error("Payload not found")]
    PayloadNotFound,

    /// Generated id collided with an existing record
    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    /// Storage or network fault
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl EscrowError {
    /// Wire code for this error
    pub fn code(&self) -> &'static str {
        match self {
            EscrowError::Unauthorized => codes::UNAUTHORIZED,
            EscrowError::KeyNotInitialized => codes::KEY_NOT_INITIALIZED,
            EscrowError::PayloadNotFound => codes::PAYLOAD_NOT_FOUND,
            EscrowError::DuplicateId(_) => codes::DUPLICATE_ID,
            EscrowError::ServiceUnavailable(_) => codes::SERVICE_UNAVAILABLE,
        }
    }

    /// Rebuild an error from a wire code, if the code is known
    pub fn from_code(code: &str, message: &str) -> Option<Self> {
        match code {
            codes::UNAUTHORIZED => Some(EscrowError::Unauthorized),
            codes::KEY_NOT_INITIALIZED => Some(EscrowError::KeyNotInitialized),
            codes::PAYLOAD_NOT_FOUND => Some(EscrowError::PayloadNotFound),
            codes::DUPLICATE_ID => Some(EscrowError::DuplicateId(message.to_string())),
            codes::SERVICE_UNAVAILABLE => Some(EscrowError::ServiceUnavailable(message.to_string())),
            _ => None,
        }
    }

    /// Whether a caller may reasonably retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, EscrowError::ServiceUnavailable(_))
    }
}
