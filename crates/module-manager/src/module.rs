//! # Module Trait - Capability-Tagged Module Contract
//!
//! Defines the contract that every module implements to take part in the
//! state machine. The framework depends only on these traits, never on
//! concrete module types.
//!
//! ## Capabilities
//!
//! Optional behaviour is exposed through accessor methods returning
//! `Option<&dyn ...>`. The registry checks at registration time that the
//! accessors agree with the descriptor's capability flags, so the framework
//! never calls into a capability that is absent.
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use module_manager::{AppModule, ModuleDescriptor};
//!
//! pub struct GovModule;
//!
//! impl AppModule for GovModule {
//!     fn descriptor(&self) -> ModuleDescriptor {
//!         ModuleDescriptor::new("gov")
//!     }
//!     fn new_handler(&self) -> Option<Handler> { Some(Arc::new(handle_gov)) }
//!     fn new_querier(&self) -> Option<Querier> { Some(Arc::new(query_gov)) }
//! }
//! ```

use crate::context::{ModuleContext, QueryContext};
use crate::descriptor::ModuleDescriptor;
use crate::errors::ModuleError;
use crate::invariants::InvariantRegistry;
use rand_chacha::ChaCha20Rng;
use serde_json::Value;
use shared_types::{ParamChange, Query, Request, Response, ValidatorUpdate};
use std::sync::Arc;

/// Request handler returned by a module, invoked through the route table.
pub type Handler =
    Arc<dyn Fn(&mut ModuleContext<'_>, &Request) -> Result<Response, ModuleError> + Send + Sync>;

/// Query handler returned by a module, invoked through the route table.
pub type Querier =
    Arc<dyn Fn(&QueryContext<'_>, &Query) -> Result<Value, ModuleError> + Send + Sync>;

/// Deterministic RNG handed to simulation hooks.
pub type SimRng = ChaCha20Rng;

/// The core trait that every module implements.
pub trait AppModule: Send + Sync {
    /// Static identity of this module.
    fn descriptor(&self) -> ModuleDescriptor;

    /// Handler for requests routed by the descriptor's `route_key`.
    fn new_handler(&self) -> Option<Handler> {
        None
    }

    /// Querier for queries routed by the descriptor's `querier_route`.
    fn new_querier(&self) -> Option<Querier> {
        None
    }

    /// Begin-of-block hook.
    fn begin_block(&self, _ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
        Ok(())
    }

    /// End-of-block hook. May return validator-set updates.
    fn end_block(&self, _ctx: &mut ModuleContext<'_>) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        Ok(Vec::new())
    }

    /// Genesis capability, if declared.
    fn genesis(&self) -> Option<&dyn HasGenesis> {
        None
    }

    /// Invariant capability, if declared.
    fn invariants(&self) -> Option<&dyn HasInvariants> {
        None
    }

    /// Simulation capability, if declared.
    fn simulation(&self) -> Option<&dyn HasSimulation> {
        None
    }
}

/// A type-erased module handle for the registry.
pub type DynModule = Arc<dyn AppModule>;

/// Genesis round-trip for one module.
pub trait HasGenesis: Send + Sync {
    /// Default blob. Must be non-null and pass `validate_genesis`.
    fn default_genesis(&self) -> Result<Value, ModuleError>;

    /// Decode and validate a blob without touching state.
    fn validate_genesis(&self, blob: &Value) -> Result<(), ModuleError>;

    /// Import a blob into the module's partition.
    fn init_genesis(
        &self,
        ctx: &mut ModuleContext<'_>,
        blob: &Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError>;

    /// Export the module's partition as a blob.
    fn export_genesis(&self, ctx: &QueryContext<'_>) -> Result<Value, ModuleError>;
}

/// Invariant registration.
pub trait HasInvariants: Send + Sync {
    fn register_invariants(&self, registry: &mut InvariantRegistry);
}

/// Fuzz-testing hooks. Generators must be pure functions of the RNG.
pub trait HasSimulation: Send + Sync {
    /// Randomized genesis blob.
    fn randomized_genesis(&self, rng: &mut SimRng) -> Result<Value, ModuleError>;

    /// Randomized parameter changes.
    fn randomized_param_changes(&self, rng: &mut SimRng) -> Vec<ParamChange>;

    /// Apply one change produced by `randomized_param_changes` to the
    /// module's own partition.
    fn apply_param_change(
        &self,
        _ctx: &mut ModuleContext<'_>,
        change: &ParamChange,
    ) -> Result<(), ModuleError> {
        Err(ModuleError::InvalidRequest(format!(
            "unsupported param change {}",
            change.compose_key()
        )))
    }

    /// Render one raw entry of the module's partition for diffing.
    fn decode_store_entry(&self, key: &[u8], value: &[u8]) -> String;
}

/// Decode a genesis blob into a typed state.
pub fn decode_blob<T: serde::de::DeserializeOwned>(blob: &Value) -> Result<T, ModuleError> {
    T::deserialize(blob).map_err(ModuleError::from)
}

/// Encode a typed state as a genesis blob.
pub fn encode_blob<T: serde::Serialize>(state: &T) -> Result<Value, ModuleError> {
    serde_json::to_value(state).map_err(ModuleError::from)
}
