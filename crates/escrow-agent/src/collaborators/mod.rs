//! External effects of the boot flow
//!
//! The agent never touches disks, images, boot files or mounts directly.
//! Each effect sits behind a trait so the boot flow can run against fakes,
//! and each production implementation shells out to the standard tool.

pub mod boot;
pub mod command;
pub mod cryptsetup;
pub mod image;
pub mod mount;

pub use boot::CmdlineBootConfig;
pub use cryptsetup::Cryptsetup;
pub use image::DdImageWriter;
pub use mount::SystemMounter;

use async_trait::async_trait;
use escrow_core::DiskKey;
use std::path::{Path, PathBuf};

use crate::error::CollaboratorError;

/// Disk-encryption subsystem
#[async_trait]
pub trait EncryptedVolume: Send + Sync {
    /// Initialize `partition` as an encrypted volume keyed by `key`.
    ///
    /// Destroys any data on the partition.
    async fn format(&self, partition: &Path, key: &DiskKey) -> Result<(), CollaboratorError>;

    /// Unlock `partition` with `key`, returning the decrypted device path
    async fn open(&self, partition: &Path, key: &DiskKey) -> Result<PathBuf, CollaboratorError>;
}

/// Writes an OS image onto a device
#[async_trait]
pub trait ImageProvisioner: Send + Sync {
    async fn write_image(&self, image: &Path, target: &Path) -> Result<(), CollaboratorError>;
}

/// Points the bootloader at the encrypted root
#[async_trait]
pub trait BootConfigurator: Send + Sync {
    async fn set_root_device(&self, root: &RootDevice) -> Result<(), CollaboratorError>;
}

/// Mounts a device
#[async_trait]
pub trait Mounter: Send + Sync {
    async fn mount(&self, device: &Path, target: &Path) -> Result<(), CollaboratorError>;
}

/// Where the root filesystem lives once unlocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDevice {
    /// Decrypted device, e.g. `/dev/mapper/encrypted_root`
    pub device: PathBuf,
    /// Encrypted partition backing it
    pub partition: PathBuf,
    /// Device-mapper name
    pub mapper_name: String,
}

impl RootDevice {
    /// Kernel command line booting from this device
    pub fn kernel_cmdline(&self) -> String {
        format!(
            "root={} rootfstype=ext4 rootwait cryptdevice={}:{}",
            self.device.display(),
            self.partition.display(),
            self.mapper_name
        )
    }
}
