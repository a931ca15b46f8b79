//! # Modular-Chain Devnet Node
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `MC_*` environment variables
//! 2. Install the tracing subscriber
//! 3. Build the module registry and import genesis
//! 4. Produce blocks until Ctrl+C or `MC_MAX_BLOCKS`
//! 5. Export final state to `MC_EXPORT_PATH`

use anyhow::{Context, Result};
use node_runtime::{init_logging, NodeConfig, NodeRuntime};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("loading configuration")?;
    config.validate().context("invalid configuration")?;
    init_logging(&config.logging)?;

    let mut runtime = NodeRuntime::new(config)?;
    runtime.app().registry().print_status();

    let shutdown = runtime.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Initiating graceful shutdown...");
                shutdown.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let produced = runtime.run().await?;
    runtime.finish()?;
    info!(
        "Shutdown complete after {} blocks, app_hash={}",
        produced,
        runtime.app().app_hash()
    );
    Ok(())
}
