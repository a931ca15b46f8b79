//! # Application Facade
//!
//! Drives a finalized [`ModuleRegistry`] through the chain lifecycle:
//!
//! ```text
//! init_chain ──→ begin_block ──→ deliver_tx* ──→ end_block ──→ commit ─┐
//!                     ↑                                                │
//!                     └────────────────────────────────────────────────┘
//! ```
//!
//! Each call is synchronous and runs to completion. A failed begin or end
//! hook halts the app: every later block call returns [`AppError::Halted`].

use module_manager::{
    BlockOutcome, BrokenInvariant, GenesisError, GenesisState, HookError, HookPhase,
    ModuleRegistry, RegistryError, RequestError, ValidateMode,
};
use serde_json::Value;
use shared_types::{BlockContext, Event, MultiStore, Query, Request, Response, ValidatorUpdate};
use thiserror::Error;
use tracing::{debug, error, info};

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("chain is already initialized at height {height}")]
    AlreadyInitialized { height: u64 },

    #[error("chain is not initialized")]
    NotInitialized,

    #[error("block {height} is still open")]
    BlockInProgress { height: u64 },

    #[error("no block is open")]
    NoBlockInProgress,

    #[error("block {height} must end before commit")]
    BlockNotEnded { height: u64 },

    #[error("halted: {module} {phase} hook failed at height {height}")]
    Halted {
        module: String,
        phase: HookPhase,
        height: u64,
    },

    #[error("{} invariant(s) broken at height {height}: {first}", .broken.len())]
    InvariantBroken {
        height: u64,
        first: BrokenInvariant,
        broken: Vec<BrokenInvariant>,
    },
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub height: u64,
    /// Hex SHA-256 over the whole store.
    pub app_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Fresh,
    Idle,
    Delivering,
    Ended,
    /// A hook failed; the store may be partially written.
    Halted {
        module: String,
        phase: HookPhase,
        height: u64,
    },
}

/// A running application.
pub struct App {
    registry: ModuleRegistry,
    store: MultiStore,
    chain_id: String,
    height: u64,
    phase: Phase,
    block: Option<BlockContext>,
    check_invariants: bool,
}

impl App {
    /// Wrap a finalized registry.
    pub fn new(registry: ModuleRegistry, chain_id: impl Into<String>) -> Result<Self, AppError> {
        registry.route_table()?;
        let store = registry.new_store();
        Ok(Self {
            registry,
            store,
            chain_id: chain_id.into(),
            height: 0,
            phase: Phase::Fresh,
            block: None,
            check_invariants: true,
        })
    }

    /// Enable or disable invariant assertion at commit.
    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn store(&self) -> &MultiStore {
        &self.store
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Height of the last committed block (0 after genesis).
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Hex hash of the current store.
    pub fn app_hash(&self) -> String {
        self.store.root_hash_hex()
    }

    /// Validate and import genesis.
    ///
    /// Returns the initial validator set, in registry order.
    pub fn init_chain(
        &mut self,
        genesis: &GenesisState,
        time: u64,
    ) -> Result<Vec<ValidatorUpdate>, AppError> {
        if self.phase != Phase::Fresh {
            return Err(AppError::AlreadyInitialized {
                height: self.height,
            });
        }
        let coordinator = self.registry.genesis()?;
        let genesis = coordinator.validate_genesis(genesis, ValidateMode::Strict)?;
        let block = BlockContext::genesis(&self.chain_id, time);
        let updates = coordinator.init_genesis(&mut self.store, &genesis, &block)?;
        self.assert_invariants(0)?;

        self.phase = Phase::Idle;
        info!(
            "[App] Chain {} initialized: {} validators, app_hash={}",
            self.chain_id,
            updates.len(),
            self.app_hash()
        );
        Ok(updates)
    }

    /// The hook failure that halted the app, if any.
    pub fn halted(&self) -> Option<(&str, HookPhase, u64)> {
        match &self.phase {
            Phase::Halted {
                module,
                phase,
                height,
            } => Some((module.as_str(), *phase, *height)),
            _ => None,
        }
    }

    fn ensure_running(&self) -> Result<(), AppError> {
        match &self.phase {
            Phase::Halted {
                module,
                phase,
                height,
            } => Err(AppError::Halted {
                module: module.clone(),
                phase: *phase,
                height: *height,
            }),
            _ => Ok(()),
        }
    }

    fn halt(&mut self, err: HookError) -> AppError {
        error!(
            "[App] ✗ Halting: {} {} failed at height {}",
            err.module, err.phase, err.height
        );
        self.phase = Phase::Halted {
            module: err.module.clone(),
            phase: err.phase,
            height: err.height,
        };
        AppError::Hook(err)
    }

    /// Open the next block.
    pub fn begin_block(&mut self, time: u64, proposer: &str) -> Result<Vec<Event>, AppError> {
        self.ensure_running()?;
        match self.phase {
            Phase::Fresh => return Err(AppError::NotInitialized),
            Phase::Idle => {}
            _ => {
                return Err(AppError::BlockInProgress {
                    height: self.height + 1,
                })
            }
        }
        let block = BlockContext::new(&self.chain_id, self.height + 1, time).with_proposer(proposer);
        let result = self.registry.sequencer()?.begin_block(&mut self.store, &block);
        let events = result.map_err(|e| self.halt(e))?;
        debug!("[App] Began block {}", block.height);
        self.block = Some(block);
        self.phase = Phase::Delivering;
        Ok(events)
    }

    /// Execute one request in the open block.
    ///
    /// A failing request leaves the block open and the store untouched by
    /// that request's failed checks.
    pub fn deliver_tx(&mut self, request: &Request) -> Result<Response, AppError> {
        self.ensure_running()?;
        let block = match (&self.phase, &self.block) {
            (Phase::Delivering, Some(block)) => block,
            _ => return Err(AppError::NoBlockInProgress),
        };
        let response = self
            .registry
            .sequencer()?
            .deliver(&mut self.store, block, request)?;
        Ok(response)
    }

    /// Read-only query against the current state.
    pub fn query(&self, query: &Query) -> Result<Value, AppError> {
        Ok(self.registry.sequencer()?.query(&self.store, query)?)
    }

    /// Close the open block and collect validator updates.
    pub fn end_block(&mut self) -> Result<BlockOutcome, AppError> {
        self.ensure_running()?;
        let block = match (&self.phase, &self.block) {
            (Phase::Delivering, Some(block)) => block.clone(),
            _ => return Err(AppError::NoBlockInProgress),
        };
        let result = self.registry.sequencer()?.end_block(&mut self.store, &block);
        let outcome = result.map_err(|e| self.halt(e))?;
        self.phase = Phase::Ended;
        Ok(outcome)
    }

    /// Seal the ended block and return the app hash.
    pub fn commit(&mut self) -> Result<CommitInfo, AppError> {
        self.ensure_running()?;
        let height = match (&self.phase, &self.block) {
            (Phase::Ended, Some(block)) => block.height,
            (Phase::Delivering, Some(block)) => {
                return Err(AppError::BlockNotEnded {
                    height: block.height,
                })
            }
            _ => return Err(AppError::NoBlockInProgress),
        };
        self.assert_invariants(height)?;

        self.height = height;
        self.block = None;
        self.phase = Phase::Idle;
        let info = CommitInfo {
            height,
            app_hash: self.app_hash(),
        };
        debug!("[App] Committed block {} app_hash={}", height, info.app_hash);
        Ok(info)
    }

    /// Export the current state as a genesis document.
    pub fn export_genesis(&self) -> Result<GenesisState, AppError> {
        if self.phase == Phase::Fresh {
            return Err(AppError::NotInitialized);
        }
        Ok(self.registry.genesis()?.export_genesis(&self.store)?)
    }

    fn assert_invariants(&self, height: u64) -> Result<(), AppError> {
        if !self.check_invariants {
            return Ok(());
        }
        let broken = self.registry.invariants().assert_all(&self.store.view());
        match broken.first() {
            None => Ok(()),
            Some(first) => {
                error!("[App] ✗ Invariants broken at height {}", height);
                Err(AppError::InvariantBroken {
                    height,
                    first: first.clone(),
                    broken,
                })
            }
        }
    }
}
