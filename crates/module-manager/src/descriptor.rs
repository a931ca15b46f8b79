//! # Module Descriptor
//!
//! Static identity and capability declaration of one module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Optional capabilities a module may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Takes part in genesis default/validate/init/export.
    HasGenesis,
    /// Registers state invariants.
    HasInvariants,
    /// Provides randomized genesis, param changes and a store decoder.
    HasSimulation,
}

impl Capability {
    pub fn all() -> [Capability; 3] {
        [Self::HasGenesis, Self::HasInvariants, Self::HasSimulation]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasGenesis => write!(f, "HasGenesis"),
            Self::HasInvariants => write!(f, "HasInvariants"),
            Self::HasSimulation => write!(f, "HasSimulation"),
        }
    }
}

/// The three key spaces that must be unique across a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    Name,
    RouteKey,
    QuerierRoute,
}

impl fmt::Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::RouteKey => write!(f, "route key"),
            Self::QuerierRoute => write!(f, "querier route"),
        }
    }
}

/// Identity of a module as seen by the registry.
///
/// An empty `route_key` or `querier_route` means the module exposes no
/// handler or querier; empty keys never collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Globally unique module name. Also names the module's state partition.
    pub name: String,
    /// Route key for transaction-shaped requests.
    pub route_key: String,
    /// Route for query-shaped requests.
    pub querier_route: String,
    /// Declared optional capabilities.
    pub capabilities: BTreeSet<Capability>,
}

impl ModuleDescriptor {
    /// Descriptor with both routes equal to the module name and no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            route_key: name.clone(),
            querier_route: name.clone(),
            name,
            capabilities: BTreeSet::new(),
        }
    }

    /// Set the request route key.
    pub fn route(mut self, route_key: impl Into<String>) -> Self {
        self.route_key = route_key.into();
        self
    }

    /// Set the querier route.
    pub fn querier(mut self, querier_route: impl Into<String>) -> Self {
        self.querier_route = querier_route.into();
        self
    }

    /// Module handles no requests.
    pub fn without_route(self) -> Self {
        self.route("")
    }

    /// Module serves no queries.
    pub fn without_querier(self) -> Self {
        self.querier("")
    }

    /// Declare a capability.
    pub fn with(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Key of this descriptor in one key space, or `None` if it is empty.
    pub fn key(&self, space: KeySpace) -> Option<&str> {
        let key = match space {
            KeySpace::Name => self.name.as_str(),
            KeySpace::RouteKey => self.route_key.as_str(),
            KeySpace::QuerierRoute => self.querier_route.as_str(),
        };
        (!key.is_empty()).then_some(key)
    }
}
