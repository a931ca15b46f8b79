//! # Module Manager
//!
//! Composes independently authored modules into one deterministic state
//! transition function.
//!
//! ## Architecture
//!
//! ```text
//! ModuleRegistry (ordered, frozen by finalize)
//!   ├── RouteTable          route_key -> handler, querier_route -> querier
//!   ├── GenesisCoordinator  default / validate / init / export
//!   ├── BlockSequencer      begin_block, deliver, query, end_block
//!   ├── InvariantRegistry   module/route -> check
//!   └── SimulationHarness   seeded genesis, param changes, store decoding
//! ```
//!
//! Every module owns exactly one partition of the [`MultiStore`], named
//! after the module. Hooks receive a [`ModuleContext`] that can write that
//! partition only.
//!
//! ## Determinism
//!
//! Registration order is authoritative. Hooks, genesis import and
//! validator-update concatenation follow it, and no component sorts.
//!
//! [`MultiStore`]: shared_types::MultiStore

pub mod context;
pub mod descriptor;
pub mod errors;
pub mod genesis;
pub mod invariants;
pub mod module;
pub mod registry;
pub mod router;
pub mod sequencer;
pub mod simulation;

pub use context::{ModuleContext, QueryContext};
pub use descriptor::{Capability, KeySpace, ModuleDescriptor};
pub use errors::{
    GenesisError, HookError, HookPhase, ModuleError, RegistryError, RequestError, RouteError,
};
pub use genesis::{GenesisCoordinator, GenesisState, ValidateMode};
pub use invariants::{BrokenInvariant, InvariantFn, InvariantRegistry, InvariantResult};
pub use module::{
    decode_blob, encode_blob, AppModule, DynModule, Handler, HasGenesis, HasInvariants,
    HasSimulation, Querier, SimRng,
};
pub use registry::{ModuleRegistry, RegisteredModule};
pub use router::{RouteTable, RoutedHandler, RoutedQuerier};
pub use sequencer::{BlockOutcome, BlockSequencer};
pub use simulation::{
    module_rng, SimulationConfig, SimulationError, SimulationHarness, SimulationReport,
    StoreDecoder, StoreDecoderRegistry,
};
