//! # Invariant Registry
//!
//! Named state invariants contributed by modules with `HasInvariants`.
//! Invariants run in registration order (which follows registry order) and
//! see the whole store read-only.

use shared_types::StoreView;
use std::fmt;
use tracing::{debug, warn};

/// Outcome of one invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantResult {
    pub broken: bool,
    pub message: String,
}

impl InvariantResult {
    pub fn holds(message: impl Into<String>) -> Self {
        Self {
            broken: false,
            message: message.into(),
        }
    }

    pub fn broken(message: impl Into<String>) -> Self {
        Self {
            broken: true,
            message: message.into(),
        }
    }
}

/// Signature of an invariant check.
pub type InvariantFn = Box<dyn Fn(&StoreView<'_>) -> InvariantResult + Send + Sync>;

struct Invariant {
    module: String,
    route: String,
    check: InvariantFn,
}

/// A broken invariant, as reported by [`InvariantRegistry::assert_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenInvariant {
    /// `module/route`.
    pub name: String,
    pub message: String,
}

impl fmt::Display for BrokenInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Ordered collection of invariants.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Invariant>,
}

impl InvariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invariant under `module/route`.
    pub fn register(
        &mut self,
        module: impl Into<String>,
        route: impl Into<String>,
        check: impl Fn(&StoreView<'_>) -> InvariantResult + Send + Sync + 'static,
    ) {
        self.invariants.push(Invariant {
            module: module.into(),
            route: route.into(),
            check: Box::new(check),
        });
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    /// Registered names, in order.
    pub fn names(&self) -> Vec<String> {
        self.invariants
            .iter()
            .map(|i| format!("{}/{}", i.module, i.route))
            .collect()
    }

    /// Run every invariant and collect the broken ones.
    pub fn assert_all(&self, view: &StoreView<'_>) -> Vec<BrokenInvariant> {
        let mut broken = Vec::new();
        for invariant in &self.invariants {
            let name = format!("{}/{}", invariant.module, invariant.route);
            let result = (invariant.check)(view);
            if result.broken {
                warn!("[Invariants] ✗ {} broken: {}", name, result.message);
                broken.push(BrokenInvariant {
                    name,
                    message: result.message,
                });
            } else {
                debug!("[Invariants] ✓ {}", name);
            }
        }
        broken
    }
}
