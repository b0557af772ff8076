//! Local node identity file
//!
//! The `(node_id, secret_token)` pair is first written to a staged file
//! next to the identity path and only renamed into place once provisioning
//! has fully succeeded. The identity file therefore exists if and only if
//! the node was completely provisioned, and its existence is what selects
//! the later-boot path.

use escrow_core::NodeCredentials;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::IdentityError;

/// Suffix appended to the identity path for the staged copy
pub const STAGED_SUFFIX: &str = ".staged";

/// Two-phase store for the node's identity file
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
    staged: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut staged = OsString::from(path.as_os_str());
        staged.push(STAGED_SUFFIX);
        Self {
            path,
            staged: PathBuf::from(staged),
        }
    }

    /// Committed identity path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Staged identity path
    pub fn staged_path(&self) -> &Path {
        &self.staged
    }

    /// Whether a committed identity exists
    pub async fn is_provisioned(&self) -> Result<bool, IdentityError> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| IdentityError::Read {
                path: self.path.clone(),
                source,
            })
    }

    /// Read the committed identity
    pub async fn load(&self) -> Result<NodeCredentials, IdentityError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| IdentityError::Read {
                path: self.path.clone(),
                source,
            })?;

        serde_json::from_slice(&bytes).map_err(|source| IdentityError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Write `credentials` to the staged file, readable by the owner only
    pub async fn stage(&self, credentials: &NodeCredentials) -> Result<(), IdentityError> {
        let write_err = |source| IdentityError::Write {
            path: self.staged.clone(),
            source,
        };

        let contents = serde_json::to_vec(credentials).map_err(|source| IdentityError::Malformed {
            path: self.staged.clone(),
            source,
        })?;

        self.discard_staged().await?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.staged).await.map_err(write_err)?;
        file.write_all(&contents).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;

        debug!(path = %self.staged.display(), "Staged node identity");
        Ok(())
    }

    /// Atomically move the staged file into place
    ///
    /// The containing directory is synced after the rename so the new
    /// entry survives a power cut.
    pub async fn commit(&self) -> Result<(), IdentityError> {
        let write_err = |source| IdentityError::Write {
            path: self.path.clone(),
            source,
        };

        tokio::fs::rename(&self.staged, &self.path).await.map_err(write_err)?;
        sync_dir(self.parent_dir()).await.map_err(write_err)?;

        info!(path = %self.path.display(), "Committed node identity");
        Ok(())
    }

    /// Directory holding the identity file
    pub fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Remove the staged file; returns whether one existed
    pub async fn discard_staged(&self) -> Result<bool, IdentityError> {
        match tokio::fs::remove_file(&self.staged).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(IdentityError::Write {
                path: self.staged.clone(),
                source,
            }),
        }
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

// Directories cannot be opened as files here
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
