//! LUKS volumes via `cryptsetup`

use async_trait::async_trait;
use escrow_core::DiskKey;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{command, EncryptedVolume};
use crate::error::CollaboratorError;

/// `cryptsetup`-backed encrypted volume
///
/// The key is read by cryptsetup from stdin (`--key-file=-`) so it never
/// appears in the process table.
#[derive(Debug, Clone)]
pub struct Cryptsetup {
    program: String,
    mapper_name: String,
}

impl Cryptsetup {
    pub fn new(mapper_name: impl Into<String>) -> Self {
        Self {
            program: "cryptsetup".into(),
            mapper_name: mapper_name.into(),
        }
    }

    /// Use a different cryptsetup binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn mapper_name(&self) -> &str {
        &self.mapper_name
    }

    /// Path of the opened volume
    pub fn device_path(&self) -> PathBuf {
        Path::new("/dev/mapper").join(&self.mapper_name)
    }

    fn format_args(&self, partition: &Path) -> Vec<OsString> {
        vec![
            "luksFormat".into(),
            "--batch-mode".into(),
            "--key-file=-".into(),
            partition.into(),
        ]
    }

    fn open_args(&self, partition: &Path) -> Vec<OsString> {
        vec![
            "luksOpen".into(),
            "--key-file=-".into(),
            partition.into(),
            self.mapper_name.clone().into(),
        ]
    }
}

#[async_trait]
impl EncryptedVolume for Cryptsetup {
    async fn format(&self, partition: &Path, key: &DiskKey) -> Result<(), CollaboratorError> {
        info!(partition = %partition.display(), "Formatting encrypted volume");
        command::run(&self.program, self.format_args(partition), Some(key.as_bytes())).await
    }

    async fn open(&self, partition: &Path, key: &DiskKey) -> Result<PathBuf, CollaboratorError> {
        command::run(&self.program, self.open_args(partition), Some(key.as_bytes())).await?;
        let device = self.device_path();
        info!(partition = %partition.display(), device = %device.display(), "Opened encrypted volume");
        Ok(device)
    }
}
