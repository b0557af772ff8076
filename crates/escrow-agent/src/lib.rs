//! Escrow Node Agent
//!
//! Runs at boot on an edge node whose root volume is encrypted with a key
//! held by the escrow authority. The node itself stores only its
//! `(id, secret)` pair, never the disk key.
//!
//! ## Boot Paths
//!
//! 1. **First boot** (no identity file): register, escrow a key, format and
//!    open the volume, optionally write the OS image and boot configuration,
//!    then commit the identity file
//! 2. **Later boot**: load the identity, retrieve the key, open and mount
//!    the volume
//!
//! External tools (`cryptsetup`, `dd`, `mount`) and the authority itself
//! sit behind traits so the flow can run against fakes.

pub mod agent;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod identity;

pub use agent::{BootOutcome, NodeAgent, RetryPolicy, VolumeLayout};
pub use client::{AuthorityApi, HttpAuthorityClient};
pub use collaborators::{BootConfigurator, EncryptedVolume, ImageProvisioner, Mounter, RootDevice};
pub use config::{AgentConfig, ConfigError};
pub use error::{AgentError, CollaboratorError, IdentityError, Result};
pub use identity::IdentityStore;
