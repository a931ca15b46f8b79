//! # Core Domain Entities
//!
//! Defines the values that cross the boundary between the runtime, the
//! module manager and individual modules.
//!
//! ## Clusters
//!
//! - **Block**: `BlockContext`, `ValidatorUpdate`
//! - **Routing**: `Request`, `Query`, `Response`, `Event`
//! - **Simulation**: `ParamChange`

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// CLUSTER A: THE BLOCK
// =============================================================================

/// Shared, read-only context handed to every hook of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockContext {
    /// Chain identifier (e.g. "modular-devnet").
    pub chain_id: String,
    /// Block height in the chain. Genesis runs at height 0.
    pub height: u64,
    /// Block time in Unix seconds, as decided by consensus.
    pub time: u64,
    /// Hex-encoded public key of the proposer.
    pub proposer: String,
}

impl BlockContext {
    /// Create the context for a block at `height`.
    pub fn new(chain_id: impl Into<String>, height: u64, time: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
            proposer: String::new(),
        }
    }

    /// Context used while importing genesis.
    pub fn genesis(chain_id: impl Into<String>, time: u64) -> Self {
        Self::new(chain_id, 0, time)
    }

    /// Set the proposer.
    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = proposer.into();
        self
    }

    /// Context for the block following this one.
    pub fn next(&self, time: u64) -> Self {
        Self {
            chain_id: self.chain_id.clone(),
            height: self.height + 1,
            time,
            proposer: self.proposer.clone(),
        }
    }
}

/// A change to the set of participants authorized to produce blocks.
///
/// A power of zero removes the validator from the set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// Hex-encoded consensus public key.
    pub pub_key: String,
    /// Voting power.
    pub power: i64,
}

impl ValidatorUpdate {
    pub fn new(pub_key: impl Into<String>, power: i64) -> Self {
        Self {
            pub_key: pub_key.into(),
            power,
        }
    }

    /// Whether this update removes the validator.
    pub fn is_removal(&self) -> bool {
        self.power == 0
    }
}

// =============================================================================
// CLUSTER B: ROUTING
// =============================================================================

/// A transaction-shaped request. `route` selects the owning module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Route key of the module that handles this request.
    pub route: String,
    /// Message type inside the module (e.g. "send").
    pub msg_type: String,
    /// Message body, decoded by the owning module.
    pub payload: Value,
}

impl Request {
    pub fn new(route: impl Into<String>, msg_type: impl Into<String>, payload: Value) -> Self {
        Self {
            route: route.into(),
            msg_type: msg_type.into(),
            payload,
        }
    }
}

/// A query-shaped request. `route` selects the owning module's querier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Querier route of the owning module.
    pub route: String,
    /// Path inside the module (e.g. "balance").
    pub path: String,
    /// Query arguments.
    pub data: Value,
}

impl Query {
    pub fn new(route: impl Into<String>, path: impl Into<String>, data: Value) -> Self {
        Self {
            route: route.into(),
            path: path.into(),
            data,
        }
    }
}

/// A typed event emitted by a handler or hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind (e.g. "transfer").
    pub kind: String,
    /// Ordered key/value attributes.
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    /// Append an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }
}

/// Result of a successfully handled request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Response {
    /// Handler-specific result data.
    pub data: Value,
    /// Events emitted while handling the request.
    pub events: Vec<Event>,
    /// Free-form log line.
    pub log: String,
}

impl Response {
    pub fn with_data(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }
}

// =============================================================================
// CLUSTER C: SIMULATION
// =============================================================================

/// A randomized parameter change proposed by a module for fuzz runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamChange {
    /// Parameter subspace, normally the module name.
    pub subspace: String,
    /// Parameter key inside the subspace.
    pub key: String,
    /// JSON-encoded new value.
    pub value: String,
}

impl ParamChange {
    pub fn new(subspace: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            subspace: subspace.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Path used when logging the change, e.g. `service/MaxRequestTimeout`.
    pub fn compose_key(&self) -> String {
        format!("{}/{}", self.subspace, self.key)
    }
}
