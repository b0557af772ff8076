//! Agent configuration
//!
//! Read from the environment at startup:
//!
//! | Variable | Default |
//! |---|---|
//! | `AGENT_SERVER_URL` | required |
//! | `AGENT_IDENTITY_PATH` | `/etc/node_info.json` |
//! | `AGENT_LUKS_PARTITION` | `/dev/mmcblk0p3` |
//! | `AGENT_MAPPER_NAME` | `encrypted_root` |
//! | `AGENT_IMAGE_PATH` | unset (no image written) |
//! | `AGENT_CMDLINE_PATH` | unset (boot configuration untouched) |
//! | `AGENT_MOUNT_POINT` | unset (volume left unmounted) |
//! | `AGENT_REQUEST_TIMEOUT_SECS` | `30` |
//! | `AGENT_RETRY_ATTEMPTS` | `5` |
//! | `AGENT_LOG_LEVEL` | `info` |

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::agent::RetryPolicy;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Node agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the escrow authority
    pub server_url: String,
    /// Where the committed `(id, secret)` pair lives
    pub identity_path: PathBuf,
    /// Partition holding the encrypted volume
    pub luks_partition: PathBuf,
    /// Device-mapper name of the opened volume
    pub mapper_name: String,
    /// OS image written onto the opened volume at provisioning
    pub image_path: Option<PathBuf>,
    /// Kernel command line file pointed at the encrypted root
    pub cmdline_path: Option<PathBuf>,
    /// Where the opened volume is mounted on later boots
    pub mount_point: Option<PathBuf>,
    /// Per-request timeout for calls to the authority
    pub request_timeout: Duration,
    /// Retry policy for calls to the authority
    pub retry: RetryPolicy,
    /// Log level name
    pub log_level: String,
}

impl AgentConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server_url = non_empty("AGENT_SERVER_URL").ok_or(ConfigError::Missing("AGENT_SERVER_URL"))?;
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "AGENT_SERVER_URL",
                value: server_url,
            });
        }

        let timeout_secs: u64 = parse_or("AGENT_REQUEST_TIMEOUT_SECS", non_empty("AGENT_REQUEST_TIMEOUT_SECS"), 30)?;
        let attempts: u32 = parse_or("AGENT_RETRY_ATTEMPTS", non_empty("AGENT_RETRY_ATTEMPTS"), 5)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "AGENT_REQUEST_TIMEOUT_SECS",
                value: "0".into(),
            });
        }
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "AGENT_RETRY_ATTEMPTS",
                value: "0".into(),
            });
        }

        Ok(Self {
            server_url,
            identity_path: non_empty("AGENT_IDENTITY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/etc/node_info.json")),
            luks_partition: non_empty("AGENT_LUKS_PARTITION")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/dev/mmcblk0p3")),
            mapper_name: non_empty("AGENT_MAPPER_NAME").unwrap_or_else(|| "encrypted_root".into()),
            image_path: non_empty("AGENT_IMAGE_PATH").map(PathBuf::from),
            cmdline_path: non_empty("AGENT_CMDLINE_PATH").map(PathBuf::from),
            mount_point: non_empty("AGENT_MOUNT_POINT").map(PathBuf::from),
            request_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                attempts,
                ..RetryPolicy::default()
            },
            log_level: non_empty("AGENT_LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
