//! # Error Types
//!
//! One error enum per concern of the module manager:
//!
//! - [`ModuleError`]: returned by module code (handlers, hooks, genesis).
//! - [`RegistryError`]: construction-time, fatal to application bootstrap.
//! - [`GenesisError`]: recoverable, the caller may fix the genesis file.
//! - [`RouteError`] / [`RequestError`]: scoped to a single request.
//! - [`HookError`]: fatal to the block, and therefore to the process.

use crate::descriptor::{Capability, KeySpace};
use shared_types::StoreError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by module implementations.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module's genesis blob violates one of its rules.
    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    /// The request payload is malformed or violates a module rule.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The module does not handle this message type.
    #[error("Unknown message type: {0}")]
    UnknownMessage(String),

    /// The module's querier does not serve this path.
    #[error("Unknown query path: {0}")]
    UnknownQuery(String),

    /// A blob or stored value could not be (de)serialized.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Partition access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other failure inside the module.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Errors raised while building the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two modules claim the same name, route key or querier route.
    #[error("Duplicate module: {space} {value:?} of {module} is already registered by {existing}")]
    DuplicateModule {
        space: KeySpace,
        value: String,
        module: String,
        existing: String,
    },

    /// `register` was called after `finalize`.
    #[error("Registry is frozen: cannot register {module} after finalize")]
    RegistryFrozen { module: String },

    /// Descriptor capability flags disagree with what the module provides.
    #[error("Capability mismatch for {module}: {capability} declared={declared}, provided={provided}")]
    CapabilityMismatch {
        module: String,
        capability: Capability,
        declared: bool,
        provided: bool,
    },

    /// A module declares a route key but returns no handler (or querier).
    #[error("Module {module} declares route {route:?} but provides no {kind}")]
    MissingHandler {
        module: String,
        route: String,
        kind: &'static str,
    },

    /// The descriptor itself is malformed.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The operation needs a finalized registry.
    #[error("Registry is not finalized")]
    NotFinalized,
}

/// Errors raised by the genesis coordinator.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// A module rejected its genesis blob.
    #[error("Genesis validation failed for {module}: {cause}")]
    Validation {
        module: String,
        #[source]
        cause: ModuleError,
    },

    /// A module with genesis has no blob and defaults were not requested.
    #[error("Genesis state has no entry for required module {module}")]
    MissingModule { module: String },

    /// The genesis mapping names a module that takes no genesis.
    #[error("Genesis state names unknown module {module}")]
    UnknownModule { module: String },

    /// A module could not produce its default blob, or produced null.
    #[error("Module {module} produced no default genesis: {reason}")]
    Default { module: String, reason: String },

    /// A module failed while importing its blob.
    #[error("Genesis init failed for {module}: {cause}")]
    Init {
        module: String,
        #[source]
        cause: ModuleError,
    },

    /// A module failed while exporting its state.
    #[error("Genesis export failed for {module}: {cause}")]
    Export {
        module: String,
        #[source]
        cause: ModuleError,
    },

    /// The genesis document is not a JSON object keyed by module name.
    #[error("Genesis decode error: {0}")]
    Decode(String),

    /// Reading or writing the genesis file failed.
    #[error("Genesis file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Per-request routing errors. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("No handler registered for route {key:?}")]
    UnroutableRequest { key: String },

    #[error("No querier registered for route {key:?}")]
    UnroutableQuery { key: String },
}

/// Failure of a single routed request or query.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Route(#[from] RouteError),

    /// The owning module's handler rejected the request.
    #[error("[{module}] {msg_type} failed: {cause}")]
    Handler {
        module: String,
        msg_type: String,
        #[source]
        cause: ModuleError,
    },

    /// The owning module's querier rejected the query.
    #[error("[{module}] query {path} failed: {cause}")]
    Querier {
        module: String,
        path: String,
        #[source]
        cause: ModuleError,
    },
}

/// Block lifecycle phase in which a hook ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeginBlock,
    EndBlock,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginBlock => write!(f, "BeginBlock"),
            Self::EndBlock => write!(f, "EndBlock"),
        }
    }
}

/// A begin/end-block hook failed. Block processing must halt.
#[derive(Debug, Error)]
#[error("[{module}] {phase} hook failed at height {height}: {cause}")]
pub struct HookError {
    pub module: String,
    pub phase: HookPhase,
    pub height: u64,
    #[source]
    pub cause: ModuleError,
}
