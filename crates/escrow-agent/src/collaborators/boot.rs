//! Kernel command line configuration

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{BootConfigurator, RootDevice};
use crate::error::CollaboratorError;

/// Writes the root device into a `cmdline.txt` style file
#[derive(Debug, Clone)]
pub struct CmdlineBootConfig {
    path: PathBuf,
}

impl CmdlineBootConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BootConfigurator for CmdlineBootConfig {
    async fn set_root_device(&self, root: &RootDevice) -> Result<(), CollaboratorError> {
        let cmdline = format!("{}\n", root.kernel_cmdline());
        tokio::fs::write(&self.path, cmdline)
            .await
            .map_err(|source| CollaboratorError::Io {
                path: self.path.clone(),
                source,
            })?;

        info!(path = %self.path.display(), device = %root.device.display(), "Pointed boot at encrypted root");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_cmdline() {
        let dir = tempfile::tempdir().unwrap();
        let config = CmdlineBootConfig::new(dir.path().join("cmdline.txt"));
        let root = RootDevice {
            device: PathBuf::from("/dev/mapper/encrypted_root"),
            partition: PathBuf::from("/dev/mmcblk0p3"),
            mapper_name: "encrypted_root".into(),
        };

        config.set_root_device(&root).await.unwrap();

        let written = std::fs::read_to_string(config.path()).unwrap();
        assert_eq!(written, format!("{}\n", root.kernel_cmdline()));
    }

    #[tokio::test]
    async fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = CmdlineBootConfig::new(dir.path().join("missing").join("cmdline.txt"));
        let root = RootDevice {
            device: PathBuf::from("/dev/mapper/r"),
            partition: PathBuf::from("/dev/sda3"),
            mapper_name: "r".into(),
        };

        assert!(matches!(
            config.set_root_device(&root).await,
            Err(CollaboratorError::Io { .. })
        ));
    }
}
