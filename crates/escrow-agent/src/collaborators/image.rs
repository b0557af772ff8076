//! OS image writing via `dd`

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tracing::info;

use super::{command, ImageProvisioner};
use crate::error::CollaboratorError;

/// Copies an image onto a device with `dd`, syncing before it returns
#[derive(Debug, Clone)]
pub struct DdImageWriter {
    program: String,
}

impl Default for DdImageWriter {
    fn default() -> Self {
        Self { program: "dd".into() }
    }
}

impl DdImageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different dd binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(image: &Path, target: &Path) -> Vec<OsString> {
        let mut input = OsString::from("if=");
        input.push(image);
        let mut output = OsString::from("of=");
        output.push(target);
        vec![
            input,
            output,
            "bs=4M".into(),
            "conv=fsync".into(),
            "status=none".into(),
        ]
    }
}

#[async_trait]
impl ImageProvisioner for DdImageWriter {
    async fn write_image(&self, image: &Path, target: &Path) -> Result<(), CollaboratorError> {
        info!(image = %image.display(), target = %target.display(), "Writing OS image");
        command::run(&self.program, Self::args(image, target), None).await
    }
}
