//! Mounting via `mount`

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{command, Mounter};
use crate::error::CollaboratorError;

#[derive(Debug, Clone)]
pub struct SystemMounter {
    program: String,
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self {
            program: "mount".into(),
        }
    }
}

impl SystemMounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Mounter for SystemMounter {
    async fn mount(&self, device: &Path, target: &Path) -> Result<(), CollaboratorError> {
        command::run(&self.program, [device.as_os_str(), target.as_os_str()], None).await?;
        info!(device = %device.display(), target = %target.display(), "Mounted volume");
        Ok(())
    }
}
