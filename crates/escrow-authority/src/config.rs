//! Authority configuration
//!
//! Read from the environment at startup:
//!
//! | Variable | Default |
//! |---|---|
//! | `ESCROW_BIND` | `0.0.0.0` |
//! | `ESCROW_PORT` | `8000` |
//! | `DATABASE_URL` | unset (in-memory store) |
//! | `ESCROW_KEY_POLICY` | `idempotent` |
//! | `ESCROW_PAYLOAD_PATH` | unset |
//! | `ESCROW_LOG_LEVEL` | `info` |

use escrow_core::KeyInitPolicy;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ESCROW_PORT must be a valid port number, got '{0}'")]
    InvalidPort(String),

    #[error("ESCROW_BIND must be an IP address, got '{0}'")]
    InvalidBind(String),

    #[error("ESCROW_KEY_POLICY: {0}")]
    InvalidPolicy(String),
}

/// Escrow authority configuration
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Listen address
    pub bind: IpAddr,
    /// Listen port
    pub port: u16,
    /// PostgreSQL connection string; `None` selects the in-memory store
    pub database_url: Option<String>,
    /// Behavior of init-key for nodes that already hold a key
    pub key_policy: KeyInitPolicy,
    /// File served by the payload endpoint
    pub payload_path: Option<PathBuf>,
    /// Log level name
    pub log_level: String,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            database_url: None,
            key_policy: KeyInitPolicy::default(),
            payload_path: None,
            log_level: "info".into(),
        }
    }
}

impl AuthorityConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("ESCROW_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let bind = match non_empty("ESCROW_BIND") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidBind(raw))?,
            None => defaults.bind,
        };

        let key_policy = match non_empty("ESCROW_KEY_POLICY") {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidPolicy)?,
            None => defaults.key_policy,
        };

        Ok(Self {
            bind,
            port,
            database_url: non_empty("DATABASE_URL"),
            key_policy,
            payload_path: non_empty("ESCROW_PAYLOAD_PATH").map(PathBuf::from),
            log_level: non_empty("ESCROW_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Socket address to listen on
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Which credential store backend this configuration selects
    pub fn storage_kind(&self) -> &'static str {
        if self.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}
