//! Fakes shared by the agent integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use escrow_agent::{
    AgentError, AuthorityApi, BootConfigurator, CollaboratorError, EncryptedVolume, ImageProvisioner, Mounter,
    Result, RetryPolicy, RootDevice,
};
use escrow_authority::{AuthorityService, MemoryStore};
use escrow_core::{DiskKey, NodeCredentials};

/// Retries without waiting
pub fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

/// Ordered record of the effects the fakes performed
#[derive(Debug, Default, Clone)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == event)
    }
}

// =============================================================================
// Authority
// =============================================================================

/// In-process authority with injectable failures
pub struct FakeAuthority {
    pub service: AuthorityService,
    failures: Mutex<HashMap<&'static str, VecDeque<AgentError>>>,
    calls: Mutex<HashMap<&'static str, u32>>,
}

impl FakeAuthority {
    pub fn new() -> Self {
        Self {
            service: AuthorityService::new(Arc::new(MemoryStore::new())),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next call to `operation` with `error`
    pub fn fail_next(&self, operation: &'static str, error: AgentError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self, operation: &'static str) -> u32 {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        match self
            .failures
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthorityApi for FakeAuthority {
    async fn register(&self) -> Result<NodeCredentials> {
        self.enter("register")?;
        Ok(self.service.register().await?)
    }

    async fn init_key(&self, credentials: &NodeCredentials) -> Result<DiskKey> {
        self.enter("init_key")?;
        Ok(self
            .service
            .init_key(&credentials.node_id, &credentials.secret_token)
            .await?)
    }

    async fn get_key(&self, credentials: &NodeCredentials) -> Result<DiskKey> {
        self.enter("get_key")?;
        Ok(self
            .service
            .get_key(&credentials.node_id, &credentials.secret_token)
            .await?)
    }
}

// =============================================================================
// Collaborators
// =============================================================================

fn failed(program: &str, stderr: &str) -> CollaboratorError {
    CollaboratorError::Failed {
        program: program.into(),
        status: "exit status: 1".into(),
        stderr: stderr.into(),
    }
}

/// Encrypted volume that only opens with the key it was formatted with
pub struct FakeVolume {
    events: Events,
    mapper: PathBuf,
    key: Mutex<Option<DiskKey>>,
    pub fail_format: AtomicBool,
}

impl FakeVolume {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            mapper: PathBuf::from("/dev/mapper/encrypted_root"),
            key: Mutex::new(None),
            fail_format: AtomicBool::new(false),
        }
    }

    pub fn device(&self) -> &Path {
        &self.mapper
    }

    pub fn formatted_key(&self) -> Option<DiskKey> {
        self.key.lock().unwrap().clone()
    }
}

#[async_trait]
impl EncryptedVolume for FakeVolume {
    async fn format(&self, partition: &Path, key: &DiskKey) -> std::result::Result<(), CollaboratorError> {
        if self.fail_format.load(Ordering::SeqCst) {
            return Err(failed("cryptsetup", "Device or resource busy"));
        }
        *self.key.lock().unwrap() = Some(key.clone());
        self.events.push(format!("format {}", partition.display()));
        Ok(())
    }

    async fn open(&self, partition: &Path, key: &DiskKey) -> std::result::Result<PathBuf, CollaboratorError> {
        match self.key.lock().unwrap().as_ref() {
            Some(formatted) if formatted == key => {}
            _ => return Err(failed("cryptsetup", "No key available with this passphrase.")),
        }
        self.events.push(format!("open {}", partition.display()));
        Ok(self.mapper.clone())
    }
}

pub struct FakeImageWriter {
    events: Events,
    pub fail: AtomicBool,
}

impl FakeImageWriter {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ImageProvisioner for FakeImageWriter {
    async fn write_image(&self, image: &Path, target: &Path) -> std::result::Result<(), CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(failed("dd", "No space left on device"));
        }
        self.events
            .push(format!("image {} -> {}", image.display(), target.display()));
        Ok(())
    }
}

/// Records the root device and whether the identity was already committed
pub struct FakeBootConfig {
    events: Events,
    identity_path: PathBuf,
    pub root: Mutex<Option<RootDevice>>,
}

impl FakeBootConfig {
    pub fn new(events: Events, identity_path: impl Into<PathBuf>) -> Self {
        Self {
            events,
            identity_path: identity_path.into(),
            root: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BootConfigurator for FakeBootConfig {
    async fn set_root_device(&self, root: &RootDevice) -> std::result::Result<(), CollaboratorError> {
        assert!(
            !self.identity_path.exists(),
            "identity must not be committed before provisioning finishes"
        );
        *self.root.lock().unwrap() = Some(root.clone());
        self.events.push(format!("boot {}", root.device.display()));
        Ok(())
    }
}

pub struct FakeMounter {
    events: Events,
}

impl FakeMounter {
    pub fn new(events: Events) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn mount(&self, device: &Path, target: &Path) -> std::result::Result<(), CollaboratorError> {
        self.events
            .push(format!("mount {} {}", device.display(), target.display()));
        Ok(())
    }
}
