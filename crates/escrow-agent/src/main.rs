//! Escrow Node Agent Binary
//!
//! Provisions or unlocks the node's encrypted volume, then exits. A
//! non-zero exit status means the volume was not made available.

use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use escrow_agent::{AgentConfig, BootOutcome, NodeAgent};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("escrow-agent: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("escrow-agent: failed to install logger: {}", e);
    }

    info!(
        server = %config.server_url,
        identity = %config.identity_path.display(),
        partition = %config.luks_partition.display(),
        "Starting escrow agent"
    );

    let result = match NodeAgent::from_config(&config) {
        Ok(agent) => agent.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(BootOutcome::Provisioned { node_id, device }) => {
            info!(node_id = %node_id, device = %device.display(), "Node provisioned; reboot to boot from the encrypted root");
            ExitCode::SUCCESS
        }
        Ok(BootOutcome::Unlocked { node_id, device, mounted_at }) => {
            info!(
                node_id = %node_id,
                device = %device.display(),
                mounted_at = ?mounted_at,
                "Encrypted volume unlocked"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Boot halted");
            ExitCode::FAILURE
        }
    }
}
