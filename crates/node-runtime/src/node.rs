//! # Devnet Node
//!
//! Produces empty blocks on a fixed interval until shutdown or
//! `max_blocks`, then optionally exports the final state as genesis.
//!
//! ## Startup Sequence
//!
//! 1. Build the default module registry
//! 2. Load genesis: file, then randomized seed, then module defaults
//! 3. Fill missing modules with defaults and import via `init_chain`
//! 4. Tick `begin_block → end_block → commit`

use crate::app::{App, CommitInfo};
use crate::config::NodeConfig;
use anyhow::{Context, Result};
use module_manager::{GenesisState, ModuleRegistry, ValidateMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Block time of the genesis block, in seconds.
pub const GENESIS_TIME: u64 = 1_700_000_000;

/// Resolve the genesis document for `config`.
pub fn load_genesis(config: &NodeConfig, registry: &ModuleRegistry) -> Result<GenesisState> {
    let genesis = if let Some(path) = &config.chain.genesis_path {
        info!("[Genesis] Loading {}", path.display());
        GenesisState::load(path)?
    } else if let Some(seed) = config.simulation.seed {
        info!("[Genesis] Randomized genesis from seed {}", seed);
        registry.simulation()?.randomized_genesis(seed)?
    } else {
        info!("[Genesis] Using module defaults");
        registry.genesis()?.default_genesis()?
    };

    let genesis = registry
        .genesis()?
        .validate_genesis(&genesis, ValidateMode::FillDefaults)
        .context("genesis failed validation")?;
    Ok(genesis)
}

/// Signals a running node to stop after the current block.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        if let Err(e) = self.0.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }
}

/// The devnet node.
pub struct NodeRuntime {
    app: App,
    config: NodeConfig,
    proposer: String,
    last_commit: Option<CommitInfo>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Build the registry and import genesis.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let registry = app_modules::default_registry().context("building module registry")?;
        Self::with_registry(config, registry)
    }

    /// Like [`NodeRuntime::new`] with a caller-supplied registry.
    pub fn with_registry(config: NodeConfig, registry: ModuleRegistry) -> Result<Self> {
        config.validate()?;
        let genesis = load_genesis(&config, &registry)?;

        let mut app = App::new(registry, config.chain.chain_id.clone())?
            .with_invariant_checks(config.block.check_invariants);
        let validators = app
            .init_chain(&genesis, GENESIS_TIME)
            .context("init_chain failed")?;
        let proposer = validators
            .first()
            .map(|v| v.pub_key.clone())
            .unwrap_or_default();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            app,
            config,
            proposer,
            last_commit: None,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn last_commit(&self) -> Option<&CommitInfo> {
        self.last_commit.as_ref()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    fn block_time(&self, height: u64) -> u64 {
        let interval_secs = (self.config.block.interval_ms / 1000).max(1);
        GENESIS_TIME + height * interval_secs
    }

    /// Run one full block.
    pub fn produce_block(&mut self) -> Result<CommitInfo> {
        let height = self.app.height() + 1;
        let time = self.block_time(height);

        self.app.begin_block(time, &self.proposer)?;
        let outcome = self.app.end_block()?;
        let commit = self.app.commit()?;

        if let Some(update) = outcome.validator_updates.first() {
            if self.proposer.is_empty() && update.power > 0 {
                self.proposer = update.pub_key.clone();
            }
        }
        debug!(
            height = commit.height,
            updates = outcome.validator_updates.len(),
            events = outcome.events.len(),
            "Block committed"
        );
        self.last_commit = Some(commit.clone());
        Ok(commit)
    }

    /// Produce blocks until shutdown or `max_blocks`. Returns the number
    /// of blocks produced.
    pub async fn run(&mut self) -> Result<u64> {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.block.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown_rx.clone();
        let mut produced = 0u64;

        info!(
            "Node {} running at {}ms per block",
            self.app.chain_id(),
            self.config.block.interval_ms
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            if self.config.block.max_blocks.is_some_and(|max| produced >= max) {
                info!("Reached max_blocks={}", produced);
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let commit = self.produce_block()?;
                    produced += 1;
                    info!("Block {} app_hash={}", commit.height, commit.app_hash);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok(produced)
    }

    /// Export state to `export_path` if configured.
    pub fn finish(&self) -> Result<Option<GenesisState>> {
        let Some(path) = &self.config.chain.export_path else {
            return Ok(None);
        };
        let exported = self.app.export_genesis()?;
        exported
            .save(path)
            .with_context(|| format!("exporting genesis to {}", path.display()))?;
        info!(
            "Exported genesis at height {} to {}",
            self.app.height(),
            path.display()
        );
        Ok(Some(exported))
    }
}
