//! Common types used across the escrow protocol

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{constant_time_eq, random_bytes, DISK_KEY_BYTES, SECRET_BYTES};

/// Unique node identifier issued by the authority at registration
///
/// Generated ids are random 128-bit UUIDv4 values. Ids received from the
/// network are kept verbatim; an id that was never issued simply fails
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generate a fresh random node id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer secret authorizing every operation on a node record
///
/// 256 bits of entropy, URL-safe base64 without padding. Equality is
/// constant-time and the value never appears in `Debug` output.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct NodeSecret(String);

impl NodeSecret {
    /// Generate a fresh bearer secret
    pub fn generate() -> Self {
        let mut bytes = random_bytes::<SECRET_BYTES>();
        let secret = Self(URL_SAFE_NO_PAD.encode(bytes));
        bytes.zeroize();
        secret
    }

    /// Check a presented secret against this one in constant time
    pub fn matches(&self, presented: &NodeSecret) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.0.as_bytes())
    }

    /// Expose the raw secret (for persistence and transport only)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeSecret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeSecret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq for NodeSecret {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for NodeSecret {}

impl std::fmt::Debug for NodeSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NodeSecret([redacted])")
    }
}

/// Escrowed disk-encryption key
///
/// 256 bits, lowercase hex encoded. This is the passphrase handed to the
/// disk-encryption subsystem.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct DiskKey(String);

impl DiskKey {
    /// Generate a fresh disk key
    pub fn generate() -> Self {
        let mut bytes = random_bytes::<DISK_KEY_BYTES>();
        let key = Self(hex::encode(bytes));
        bytes.zeroize();
        key
    }

    /// Expose the encoded key (for persistence and transport only)
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Key material as fed to the disk-encryption subsystem
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for DiskKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for DiskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DiskKey([redacted])")
    }
}

/// What `init-key` does when a node already has an escrowed key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyInitPolicy {
    /// Return the existing key unchanged; the key is set exactly once
    #[default]
    Idempotent,
    /// Generate a new key on every call, discarding the previous one.
    ///
    /// A volume formatted with the previous key becomes unreadable.
    Regenerate,
}

impl std::fmt::Display for KeyInitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyInitPolicy::Idempotent => write!(f, "idempotent"),
            KeyInitPolicy::Regenerate => write!(f, "regenerate"),
        }
    }
}

impl std::str::FromStr for KeyInitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idempotent" | "once" => Ok(KeyInitPolicy::Idempotent),
            "regenerate" | "rotate" => Ok(KeyInitPolicy::Regenerate),
            _ => Err(format!("Unknown key init policy: {}", s)),
        }
    }
}
