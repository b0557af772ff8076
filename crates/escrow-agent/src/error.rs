//! Error types for the node agent

use escrow_core::EscrowError;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for node agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that halt the node agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// Outcome reported by the authority
    #[error("Authority refused the request: {0}")]
    Escrow(#[from] EscrowError),

    /// Network fault or unreadable response; the authority may never have
    /// seen the request
    #[error("Transport error: {0}")]
    Transport(String),

    /// The authority refused the request itself without naming an outcome
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Local identity file could not be read or written
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A disk, image, boot or mount step failed
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Invalid agent configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AgentError {
    /// Whether the failed call may succeed if repeated
    ///
    /// Only transport faults and authority-side outages qualify. A rejected
    /// credential or a missing key will not change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Transport(_) => true,
            AgentError::Escrow(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Transport(err.to_string())
    }
}

/// Errors reading or writing the local identity file
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Failed to read identity file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write identity file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed identity file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the command-backed collaborators
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// The program could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and reported failure
    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// A file the collaborator manages could not be written
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
