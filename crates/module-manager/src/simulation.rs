//! # Simulation Harness
//!
//! Seeded generation of genesis states and parameter changes, store entry
//! decoding, and a small fuzz driver that runs blocks over random genesis
//! while asserting invariants.
//!
//! ## Determinism
//!
//! Each module draws from its own `ChaCha20Rng`, seeded with
//! `SHA-256(seed || domain || 0x00 || module name)`. A module's output
//! therefore depends only on the seed and its own name, never on how many
//! values other modules consumed or on their registration order.

use crate::context::with_module_context;
use crate::descriptor::Capability;
use crate::errors::{GenesisError, HookError, ModuleError, RegistryError};
use crate::genesis::{GenesisState, ValidateMode};
use crate::invariants::BrokenInvariant;
use crate::module::{HasSimulation, SimRng};
use crate::registry::{ModuleRegistry, RegisteredModule};
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use shared_types::{BlockContext, MultiStore, ParamChange, ValidatorUpdate};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

const GENESIS_DOMAIN: &str = "genesis";
const PARAMS_DOMAIN: &str = "params";

/// Derive the RNG of `module` for `domain` from a simulation seed.
pub fn module_rng(seed: u64, module: &str, domain: &str) -> SimRng {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(domain.as_bytes());
    hasher.update([0u8]);
    hasher.update(module.as_bytes());
    SimRng::from_seed(hasher.finalize().into())
}

/// Renders one raw entry of a partition.
pub type StoreDecoder = Arc<dyn Fn(&[u8], &[u8]) -> String + Send + Sync>;

/// Partition name -> entry decoder.
#[derive(Default, Clone)]
pub struct StoreDecoderRegistry {
    decoders: BTreeMap<String, StoreDecoder>,
}

impl StoreDecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        partition: impl Into<String>,
        decoder: impl Fn(&[u8], &[u8]) -> String + Send + Sync + 'static,
    ) {
        self.decoders.insert(partition.into(), Arc::new(decoder));
    }

    pub fn contains(&self, partition: &str) -> bool {
        self.decoders.contains_key(partition)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    /// Decode an entry, falling back to hex for partitions without a decoder.
    pub fn decode(&self, partition: &str, key: &[u8], value: &[u8]) -> String {
        match self.decoders.get(partition) {
            Some(decoder) => decoder(key, value),
            None => format!("{}={}", hex::encode(key), hex::encode(value)),
        }
    }
}

/// Parameters of a [`SimulationHarness::simulate`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub chain_id: String,
    pub num_blocks: u64,
    pub block_time_secs: u64,
    pub start_time: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            chain_id: "sim-chain".to_string(),
            num_blocks: 50,
            block_time_secs: 5,
            start_time: 1_700_000_000,
        }
    }
}

/// Summary of a completed simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub seed: u64,
    pub blocks: u64,
    /// Validator updates from genesis and every end block, in order.
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Parameter changes applied during the first block.
    pub param_changes: usize,
    /// Hex SHA-256 of the final store.
    pub app_hash: String,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("{} invariant(s) broken at height {height}: {}", .broken.len(), join_broken(.broken))]
    InvariantBroken {
        height: u64,
        broken: Vec<BrokenInvariant>,
    },

    #[error("param change {key} rejected by {module}: {cause}")]
    ParamChange {
        module: String,
        key: String,
        #[source]
        cause: ModuleError,
    },

    #[error("exported state does not re-import identically ({} differing entries)", .diffs.len())]
    ExportMismatch { diffs: Vec<String> },
}

fn join_broken(broken: &[BrokenInvariant]) -> String {
    broken
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Simulation entry points over a frozen registry.
pub struct SimulationHarness<'r> {
    registry: &'r ModuleRegistry,
}

impl<'r> SimulationHarness<'r> {
    pub(crate) fn new(registry: &'r ModuleRegistry) -> Self {
        Self { registry }
    }

    fn simulation_modules(
        &self,
    ) -> impl Iterator<Item = (&'r RegisteredModule, &'r dyn HasSimulation)> {
        self.registry.modules().iter().filter_map(|m| {
            if !m.has(Capability::HasSimulation) {
                return None;
            }
            m.module().simulation().map(|s| (m, s))
        })
    }

    /// Random genesis for the whole application.
    ///
    /// Modules with genesis but without simulation contribute their default
    /// blob, so the result always covers every `HasGenesis` module.
    pub fn randomized_genesis(&self, seed: u64) -> Result<GenesisState, GenesisError> {
        let defaults = self.registry.genesis()?.default_genesis()?;
        let mut state = GenesisState::new();

        for (name, default) in defaults.iter() {
            let simulated = self
                .simulation_modules()
                .find(|(module, _)| module.name() == name);
            let blob = match simulated {
                Some((module, sim)) => {
                    let mut rng = module_rng(seed, module.name(), GENESIS_DOMAIN);
                    sim.randomized_genesis(&mut rng)
                        .map_err(|cause| GenesisError::Default {
                            module: module.name().to_string(),
                            reason: format!("randomized genesis failed: {cause}"),
                        })?
                }
                None => default.clone(),
            };
            state.insert(name, blob);
        }

        debug!("[Simulation] Randomized genesis for seed {}", seed);
        Ok(state)
    }

    /// Random parameter changes as `(module, change)`, in registry order.
    pub fn randomized_param_changes(&self, seed: u64) -> Vec<(String, ParamChange)> {
        let mut changes = Vec::new();
        for (module, sim) in self.simulation_modules() {
            let mut rng = module_rng(seed, module.name(), PARAMS_DOMAIN);
            for change in sim.randomized_param_changes(&mut rng) {
                changes.push((module.name().to_string(), change));
            }
        }
        changes
    }

    /// Apply `changes` to their owning modules' partitions, in order.
    /// Returns how many were applied. The first rejected change aborts the
    /// batch; changes already applied stay in the store.
    pub fn apply_param_changes(
        &self,
        store: &mut MultiStore,
        block: &BlockContext,
        changes: &[(String, ParamChange)],
    ) -> Result<usize, SimulationError> {
        for (module, change) in changes {
            let rejected = |cause: ModuleError| SimulationError::ParamChange {
                module: module.clone(),
                key: change.compose_key(),
                cause,
            };
            let (_, sim) = self
                .simulation_modules()
                .find(|(m, _)| m.name() == module)
                .ok_or_else(|| {
                    rejected(ModuleError::Internal(format!(
                        "module {module} has no simulation"
                    )))
                })?;
            with_module_context(store, module, block, |ctx| {
                sim.apply_param_change(ctx, change)
            })
            .map_err(rejected)?;
            debug!(
                "[Simulation] Applied {}={} at height {}",
                change.compose_key(),
                change.value,
                block.height
            );
        }
        Ok(changes.len())
    }

    /// Decoders of every `HasSimulation` module, keyed by partition.
    pub fn store_decoders(&self) -> StoreDecoderRegistry {
        let mut decoders = StoreDecoderRegistry::new();
        for (module, _) in self.simulation_modules() {
            let owner = Arc::clone(module.module());
            decoders.register(module.name(), move |key: &[u8], value: &[u8]| {
                match owner.simulation() {
                    Some(sim) => sim.decode_store_entry(key, value),
                    None => format!("{}={}", hex::encode(key), hex::encode(value)),
                }
            });
        }
        decoders
    }

    /// Decode one entry of `partition`.
    pub fn decode_entry(&self, partition: &str, key: &[u8], value: &[u8]) -> String {
        match self
            .simulation_modules()
            .find(|(module, _)| module.name() == partition)
        {
            Some((_, sim)) => sim.decode_store_entry(key, value),
            None => format!("{}={}", hex::encode(key), hex::encode(value)),
        }
    }

    /// Entries that differ between two stores, decoded for humans.
    ///
    /// Each line is `partition: <entry in a> != <entry in b>`, with
    /// `<absent>` for a missing side. Partitions and keys are visited in
    /// order, so the output is stable.
    pub fn diff_stores(&self, a: &MultiStore, b: &MultiStore) -> Vec<String> {
        let decoders = self.store_decoders();
        let view_a = a.view();
        let view_b = b.view();
        let partitions: BTreeSet<&str> = view_a
            .partition_names()
            .chain(view_b.partition_names())
            .collect();

        let mut diffs = Vec::new();
        for partition in partitions {
            let pa = view_a.partition(partition);
            let pb = view_b.partition(partition);
            let keys: BTreeSet<&[u8]> = pa
                .into_iter()
                .flat_map(|p| p.iter().map(|(k, _)| k))
                .chain(pb.into_iter().flat_map(|p| p.iter().map(|(k, _)| k)))
                .collect();

            for key in keys {
                let va = pa.and_then(|p| p.get(key));
                let vb = pb.and_then(|p| p.get(key));
                if va == vb {
                    continue;
                }
                let render = |value: Option<&[u8]>| match value {
                    Some(v) => decoders.decode(partition, key, v),
                    None => "<absent>".to_string(),
                };
                diffs.push(format!("{}: {} != {}", partition, render(va), render(vb)));
            }
        }
        diffs
    }

    /// Run a seeded simulation.
    ///
    /// Random genesis is validated and imported, then `num_blocks` blocks
    /// of begin/end hooks run with every invariant asserted after each
    /// block. The seed's parameter changes are applied in the first block,
    /// between its begin and end hooks. Finally the state is exported, re-imported into a fresh
    /// store and compared with the live one.
    pub fn simulate(
        &self,
        seed: u64,
        config: &SimulationConfig,
    ) -> Result<SimulationReport, SimulationError> {
        info!(
            "[Simulation] Starting seed={} blocks={} chain={}",
            seed, config.num_blocks, config.chain_id
        );
        let coordinator = self.registry.genesis()?;
        let sequencer = self.registry.sequencer()?;
        let invariants = self.registry.invariants();

        let genesis = self.randomized_genesis(seed)?;
        let genesis = coordinator.validate_genesis(&genesis, ValidateMode::Strict)?;

        let mut store = self.registry.new_store();
        let mut block = BlockContext::genesis(&config.chain_id, config.start_time);
        let mut validator_updates = coordinator.init_genesis(&mut store, &genesis, &block)?;
        self.check_invariants(&invariants, &store, block.height)?;

        let changes = self.randomized_param_changes(seed);
        let mut param_changes = 0;
        for _ in 0..config.num_blocks {
            block = block.next(block.time + config.block_time_secs);
            sequencer.begin_block(&mut store, &block)?;
            if block.height == 1 {
                param_changes = self.apply_param_changes(&mut store, &block, &changes)?;
            }
            let outcome = sequencer.end_block(&mut store, &block)?;
            validator_updates.extend(outcome.validator_updates);
            self.check_invariants(&invariants, &store, block.height)?;
        }

        let exported = coordinator.export_genesis(&store)?;
        let mut reimported = self.registry.new_store();
        coordinator.init_genesis(&mut reimported, &exported, &block)?;
        let diffs = self.diff_stores(&store, &reimported);
        if !diffs.is_empty() {
            for diff in &diffs {
                error!("[Simulation] ✗ {}", diff);
            }
            return Err(SimulationError::ExportMismatch { diffs });
        }

        let report = SimulationReport {
            seed,
            blocks: config.num_blocks,
            validator_updates,
            param_changes,
            app_hash: store.root_hash_hex(),
        };
        info!(
            "[Simulation] ✓ seed={} finished {} blocks, app_hash={}",
            seed, report.blocks, report.app_hash
        );
        Ok(report)
    }

    fn check_invariants(
        &self,
        invariants: &crate::invariants::InvariantRegistry,
        store: &MultiStore,
        height: u64,
    ) -> Result<(), SimulationError> {
        let broken = invariants.assert_all(&store.view());
        if broken.is_empty() {
            Ok(())
        } else {
            Err(SimulationError::InvariantBroken { height, broken })
        }
    }
}
