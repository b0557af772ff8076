//! Node boot flow
//!
//! The existence of the committed identity file selects the path:
//!
//! - **First boot**: register, stage the identity, obtain an escrowed key,
//!   format and open the volume, optionally write the OS image and point
//!   the bootloader at it, then commit the identity.
//! - **Later boot**: load the identity, retrieve the key, open the volume,
//!   optionally mount it.
//!
//! Any failure before commit discards the staged identity, so a node that
//! did not finish provisioning starts over on the next run. A failure to
//! obtain the key halts the boot: the volume is never used unencrypted.

use escrow_core::{DiskKey, NodeCredentials, NodeId};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::{AuthorityApi, HttpAuthorityClient};
use crate::collaborators::{
    BootConfigurator, CmdlineBootConfig, Cryptsetup, DdImageWriter, EncryptedVolume, ImageProvisioner, Mounter,
    RootDevice, SystemMounter,
};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::identity::IdentityStore;

/// Bounded exponential backoff for calls to the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// The encrypted partition and the name it is opened under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    pub partition: PathBuf,
    pub mapper_name: String,
}

/// How a boot ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// First boot completed and the identity was committed
    Provisioned { node_id: NodeId, device: PathBuf },
    /// Later boot opened the volume with the escrowed key
    Unlocked {
        node_id: NodeId,
        device: PathBuf,
        mounted_at: Option<PathBuf>,
    },
}

/// The node agent
pub struct NodeAgent {
    authority: Arc<dyn AuthorityApi>,
    identity: IdentityStore,
    volume: Arc<dyn EncryptedVolume>,
    layout: VolumeLayout,
    image: Option<(Arc<dyn ImageProvisioner>, PathBuf)>,
    boot: Option<Arc<dyn BootConfigurator>>,
    mount: Option<(Arc<dyn Mounter>, PathBuf)>,
    retry: RetryPolicy,
}

impl NodeAgent {
    pub fn new(
        authority: Arc<dyn AuthorityApi>,
        identity: IdentityStore,
        volume: Arc<dyn EncryptedVolume>,
        layout: VolumeLayout,
    ) -> Self {
        Self {
            authority,
            identity,
            volume,
            layout,
            image: None,
            boot: None,
            mount: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Build an agent wired to the real authority and system tools
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let authority = HttpAuthorityClient::new(&config.server_url, config.request_timeout)?;
        let layout = VolumeLayout {
            partition: config.luks_partition.clone(),
            mapper_name: config.mapper_name.clone(),
        };

        let mut agent = Self::new(
            Arc::new(authority),
            IdentityStore::new(&config.identity_path),
            Arc::new(Cryptsetup::new(&config.mapper_name)),
            layout,
        )
        .with_retry(config.retry);

        if let Some(image) = &config.image_path {
            agent = agent.with_image(Arc::new(DdImageWriter::new()), image);
        }
        if let Some(cmdline) = &config.cmdline_path {
            agent = agent.with_boot_configurator(Arc::new(CmdlineBootConfig::new(cmdline)));
        }
        if let Some(mount_point) = &config.mount_point {
            agent = agent.with_mount(Arc::new(SystemMounter::new()), mount_point);
        }

        Ok(agent)
    }

    /// Write `image` onto the opened volume during provisioning
    pub fn with_image(mut self, writer: Arc<dyn ImageProvisioner>, image: impl Into<PathBuf>) -> Self {
        self.image = Some((writer, image.into()));
        self
    }

    /// Point the bootloader at the encrypted root during provisioning
    pub fn with_boot_configurator(mut self, boot: Arc<dyn BootConfigurator>) -> Self {
        self.boot = Some(boot);
        self
    }

    /// Mount the opened volume at `target` on later boots
    pub fn with_mount(mut self, mounter: Arc<dyn Mounter>, target: impl Into<PathBuf>) -> Self {
        self.mount = Some((mounter, target.into()));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the boot flow selected by the identity file
    pub async fn run(&self) -> Result<BootOutcome> {
        // Disk state after an interrupted provisioning run is unknown
        if self.identity.discard_staged().await? {
            warn!(
                path = %self.identity.staged_path().display(),
                "Discarded identity from an interrupted provisioning run"
            );
        }

        if self.identity.is_provisioned().await? {
            self.unlock().await
        } else {
            self.provision().await
        }
    }

    /// First boot
    pub async fn provision(&self) -> Result<BootOutcome> {
        info!(partition = %self.layout.partition.display(), "No node identity found; provisioning");

        let credentials = self.call_with_retry("register", || self.authority.register()).await?;
        info!(node_id = %credentials.node_id, "Registered with authority");

        self.identity.stage(&credentials).await?;

        match self.provision_volume(&credentials).await {
            Ok(device) => {
                self.identity.commit().await?;
                info!(node_id = %credentials.node_id, device = %device.display(), "Provisioning complete");
                Ok(BootOutcome::Provisioned {
                    node_id: credentials.node_id,
                    device,
                })
            }
            Err(e) => {
                if let Err(cleanup) = self.identity.discard_staged().await {
                    warn!(error = %cleanup, "Failed to discard staged identity");
                }
                error!(node_id = %credentials.node_id, error = %e, "Provisioning failed");
                Err(e)
            }
        }
    }

    async fn provision_volume(&self, credentials: &NodeCredentials) -> Result<PathBuf> {
        let key = self
            .call_with_retry("init_key", || self.authority.init_key(credentials))
            .await?;

        self.volume.format(&self.layout.partition, &key).await?;
        let device = self.volume.open(&self.layout.partition, &key).await?;

        if let Some((writer, image)) = &self.image {
            writer.write_image(image, &device).await?;
        }

        if let Some(boot) = &self.boot {
            let root = RootDevice {
                device: device.clone(),
                partition: self.layout.partition.clone(),
                mapper_name: self.layout.mapper_name.clone(),
            };
            boot.set_root_device(&root).await?;
        }

        Ok(device)
    }

    /// Later boot
    pub async fn unlock(&self) -> Result<BootOutcome> {
        let credentials = self.identity.load().await?;
        info!(node_id = %credentials.node_id, "Unlocking encrypted volume");

        let key: DiskKey = self
            .call_with_retry("get_key", || self.authority.get_key(&credentials))
            .await?;
        let device = self.volume.open(&self.layout.partition, &key).await?;

        let mounted_at = match &self.mount {
            Some((mounter, target)) => {
                mounter.mount(&device, target).await?;
                Some(target.clone())
            }
            None => None,
        };

        Ok(BootOutcome::Unlocked {
            node_id: credentials.node_id,
            device,
            mounted_at,
        })
    }

    async fn call_with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Authority call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(operation, attempt, error = %e, "Authority call failed");
                    return Err(e);
                }
            }
        }
    }
}
