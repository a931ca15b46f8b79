//! # Module Registry - Ordered Module Composition
//!
//! Holds the ordered list of modules that make up the application and
//! drives the route table, genesis coordinator, block sequencer and
//! simulation harness.
//!
//! ## Ordering
//!
//! Registration order is caller-supplied and authoritative. The registry
//! never sorts or reorders modules: begin/end-block hooks, genesis import
//! and the concatenation of validator updates all follow it, and two
//! replicas with different orders would diverge.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = ModuleRegistry::new();
//! registry.register(Arc::new(BankModule::new()))?;
//! registry.register(Arc::new(StakingModule::new()))?;
//! registry.finalize()?;
//!
//! let mut store = registry.new_store();
//! registry.genesis()?.init_genesis(&mut store, &genesis, &ctx)?;
//! ```

use crate::descriptor::{Capability, KeySpace, ModuleDescriptor};
use crate::errors::RegistryError;
use crate::genesis::GenesisCoordinator;
use crate::invariants::InvariantRegistry;
use crate::module::DynModule;
use crate::router::RouteTable;
use crate::sequencer::BlockSequencer;
use crate::simulation::SimulationHarness;
use shared_types::MultiStore;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// A module together with the descriptor captured at registration.
#[derive(Clone)]
pub struct RegisteredModule {
    index: usize,
    descriptor: ModuleDescriptor,
    module: DynModule,
}

impl RegisteredModule {
    pub(crate) fn new(index: usize, module: DynModule) -> Self {
        Self {
            index,
            descriptor: module.descriptor(),
            module,
        }
    }

    /// Position in the registry.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn module(&self) -> &DynModule {
        &self.module
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.descriptor.has(capability)
    }
}

impl fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("index", &self.index)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Central, ordered registry of modules.
#[derive(Default)]
pub struct ModuleRegistry {
    /// Modules in registration order.
    modules: Vec<RegisteredModule>,
    /// Claimed keys per key space, mapped to the owning module.
    claimed: HashMap<(KeySpace, String), String>,
    /// Built by `finalize`; `Some` means frozen.
    route_table: Option<RouteTable>,
}

impl ModuleRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every module in iteration order, then finalize.
    pub fn from_modules(modules: impl IntoIterator<Item = DynModule>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for module in modules {
            registry.register(module)?;
        }
        registry.finalize()?;
        Ok(registry)
    }

    /// Register a module at the end of the order.
    ///
    /// Fails if the registry is frozen, if any of the module's name, route
    /// key or querier route is already claimed, or if its capability flags
    /// disagree with the capabilities it actually provides.
    pub fn register(&mut self, module: DynModule) -> Result<(), RegistryError> {
        let registered = RegisteredModule::new(self.modules.len(), module);
        let desc = registered.descriptor().clone();

        if self.route_table.is_some() {
            return Err(RegistryError::RegistryFrozen { module: desc.name });
        }

        if desc.name.is_empty() {
            return Err(RegistryError::InvalidDescriptor(
                "module name must not be empty".to_string(),
            ));
        }

        Self::check_capabilities(&registered)?;

        let spaces = [KeySpace::Name, KeySpace::RouteKey, KeySpace::QuerierRoute];
        for space in spaces {
            let Some(key) = desc.key(space) else {
                continue;
            };
            if let Some(existing) = self.claimed.get(&(space, key.to_string())) {
                return Err(RegistryError::DuplicateModule {
                    space,
                    value: key.to_string(),
                    module: desc.name.clone(),
                    existing: existing.clone(),
                });
            }
        }
        for space in spaces {
            if let Some(key) = desc.key(space) {
                self.claimed
                    .insert((space, key.to_string()), desc.name.clone());
            }
        }

        info!(
            "[Registry] Registering module #{} {} (route={:?}, querier={:?}, capabilities={:?})",
            registered.index(),
            desc.name,
            desc.route_key,
            desc.querier_route,
            desc.capabilities
        );
        self.modules.push(registered);
        Ok(())
    }

    /// Freeze the registry and build the route table.
    ///
    /// Calling `finalize` again returns the existing table.
    pub fn finalize(&mut self) -> Result<&RouteTable, RegistryError> {
        if self.route_table.is_none() {
            let table = RouteTable::build(&self.modules)?;
            info!(
                "[Registry] Finalized {} modules ({} routes, {} querier routes)",
                self.modules.len(),
                table.routes().len(),
                table.querier_routes().len()
            );
            self.route_table = Some(table);
        }
        self.route_table.as_ref().ok_or(RegistryError::NotFinalized)
    }

    pub fn is_finalized(&self) -> bool {
        self.route_table.is_some()
    }

    /// The route table. Only available after `finalize`.
    pub fn route_table(&self) -> Result<&RouteTable, RegistryError> {
        self.route_table.as_ref().ok_or(RegistryError::NotFinalized)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in registry order.
    pub fn modules(&self) -> &[RegisteredModule] {
        &self.modules
    }

    /// Module names in registry order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(RegisteredModule::name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredModule> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.get(name).map(RegisteredModule::descriptor)
    }

    /// Mount one partition per module.
    pub fn mount_stores(&self, store: &mut MultiStore) {
        for module in &self.modules {
            store.mount(module.name());
        }
    }

    /// A fresh store with every module's partition mounted.
    pub fn new_store(&self) -> MultiStore {
        let mut store = MultiStore::new();
        self.mount_stores(&mut store);
        store
    }

    /// Genesis coordinator over the frozen module list.
    pub fn genesis(&self) -> Result<GenesisCoordinator<'_>, RegistryError> {
        self.route_table()?;
        Ok(GenesisCoordinator::new(&self.modules))
    }

    /// Block sequencer over the frozen module list.
    pub fn sequencer(&self) -> Result<BlockSequencer<'_>, RegistryError> {
        let routes = self.route_table()?;
        Ok(BlockSequencer::new(&self.modules, routes))
    }

    /// Simulation harness over the frozen module list.
    pub fn simulation(&self) -> Result<SimulationHarness<'_>, RegistryError> {
        self.route_table()?;
        Ok(SimulationHarness::new(self))
    }

    /// Collect the invariants of every `HasInvariants` module, in order.
    pub fn invariants(&self) -> InvariantRegistry {
        let mut registry = InvariantRegistry::new();
        for module in &self.modules {
            if let Some(invariants) = module.module().invariants() {
                invariants.register_invariants(&mut registry);
                debug!("[Registry] Registered invariants of {}", module.name());
            }
        }
        registry
    }

    /// Log the registry layout.
    pub fn print_status(&self) {
        info!("===========================================");
        info!("  MODULE REGISTRY ({} modules)", self.modules.len());
        info!("===========================================");
        for module in &self.modules {
            let desc = module.descriptor();
            let flags: Vec<String> = desc.capabilities.iter().map(ToString::to_string).collect();
            info!(
                "  #{:<2} {:12} route={:10} querier={:10} [{}]",
                module.index(),
                desc.name,
                desc.route_key,
                desc.querier_route,
                flags.join(", ")
            );
        }
        let state = if self.is_finalized() { "FROZEN" } else { "OPEN" };
        info!("  state: {}", state);
        info!("===========================================");
    }

    fn check_capabilities(registered: &RegisteredModule) -> Result<(), RegistryError> {
        let module = registered.module();
        for capability in Capability::all() {
            let declared = registered.has(capability);
            let provided = match capability {
                Capability::HasGenesis => module.genesis().is_some(),
                Capability::HasInvariants => module.invariants().is_some(),
                Capability::HasSimulation => module.simulation().is_some(),
            };
            if declared != provided {
                return Err(RegistryError::CapabilityMismatch {
                    module: registered.name().to_string(),
                    capability,
                    declared,
                    provided,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_names())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ModuleContext, QueryContext};
    use crate::errors::ModuleError;
    use crate::module::{AppModule, Handler, HasGenesis, Querier};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use shared_types::{Query, Request, Response, ValidatorUpdate};
    use std::sync::Arc;

    struct MockModule {
        desc: ModuleDescriptor,
    }

    impl MockModule {
        fn new(name: &str, route: &str, querier: &str) -> Arc<Self> {
            Arc::new(Self {
                desc: ModuleDescriptor::new(name).route(route).querier(querier),
            })
        }
    }

    impl AppModule for MockModule {
        fn descriptor(&self) -> ModuleDescriptor {
            self.desc.clone()
        }

        fn new_handler(&self) -> Option<Handler> {
            Some(Arc::new(
                |_ctx: &mut ModuleContext<'_>, _req: &Request| -> Result<Response, ModuleError> {
                    Ok(Response::default())
                },
            ))
        }

        fn new_querier(&self) -> Option<Querier> {
            Some(Arc::new(
                |_ctx: &QueryContext<'_>, _q: &Query| -> Result<Value, ModuleError> {
                    Ok(Value::Null)
                },
            ))
        }
    }

    /// Declares `HasGenesis` without providing it.
    struct LyingModule;

    impl AppModule for LyingModule {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("liar")
                .without_route()
                .without_querier()
                .with(Capability::HasGenesis)
        }
    }

    /// Declares one capability and provides nothing.
    struct Claims(Capability);

    impl AppModule for Claims {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("claims")
                .without_route()
                .without_querier()
                .with(self.0)
        }
    }

    /// Provides genesis without declaring it.
    struct ShyModule;

    impl HasGenesis for ShyModule {
        fn default_genesis(&self) -> Result<Value, ModuleError> {
            Ok(json!({}))
        }
        fn validate_genesis(&self, _blob: &Value) -> Result<(), ModuleError> {
            Ok(())
        }
        fn init_genesis(
            &self,
            _ctx: &mut ModuleContext<'_>,
            _blob: &Value,
        ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
            Ok(Vec::new())
        }
        fn export_genesis(&self, _ctx: &QueryContext<'_>) -> Result<Value, ModuleError> {
            Ok(json!({}))
        }
    }

    impl AppModule for ShyModule {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("shy").without_route().without_querier()
        }
        fn genesis(&self) -> Option<&dyn HasGenesis> {
            Some(self)
        }
    }

    #[test]
    fn test_registry_register_and_finalize() {
        let mut registry = ModuleRegistry::new();
        registry.register(MockModule::new("bank", "bank", "bank")).unwrap();
        registry.register(MockModule::new("gov", "gov", "gov")).unwrap();

        assert!(!registry.is_finalized());
        assert_eq!(registry.route_table().unwrap_err(), RegistryError::NotFinalized);

        registry.finalize().unwrap();
        assert!(registry.is_finalized());
        assert_eq!(registry.module_names(), vec!["bank", "gov"]);
        assert_eq!(registry.route_table().unwrap().routes().len(), 2);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut registry = ModuleRegistry::new();
        registry.register(MockModule::new("bank", "bank", "bank")).unwrap();
        let first = registry.finalize().unwrap().routes().to_vec();
        let second = registry.finalize().unwrap().routes().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_register_after_finalize_is_frozen() {
        let mut registry = ModuleRegistry::new();
        registry.register(MockModule::new("bank", "bank", "bank")).unwrap();
        registry.finalize().unwrap();

        let err = registry
            .register(MockModule::new("gov", "gov", "gov"))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::RegistryFrozen {
                module: "gov".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_querier_route() {
        let mut registry = ModuleRegistry::new();
        registry.register(MockModule::new("a", "ra", "q")).unwrap();
        let err = registry.register(MockModule::new("b", "rb", "q")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateModule {
                space: KeySpace::QuerierRoute,
                value: "q".to_string(),
                module: "b".to_string(),
                existing: "a".to_string(),
            }
        );
        // A rejected module claims nothing.
        registry.register(MockModule::new("c", "rb", "qc")).unwrap();
    }

    #[test]
    fn test_empty_routes_never_collide() {
        let mut registry = ModuleRegistry::new();
        registry
            .register(MockModule::new("a", "", ""))
            .expect("empty routes are allowed");
        registry.register(MockModule::new("b", "", "")).unwrap();
    }

    #[test]
    fn test_capability_mismatch() {
        let mut registry = ModuleRegistry::new();
        let err = registry.register(Arc::new(LyingModule)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::CapabilityMismatch {
                module: "liar".to_string(),
                capability: Capability::HasGenesis,
                declared: true,
                provided: false,
            }
        );

        let err = registry.register(Arc::new(ShyModule)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::CapabilityMismatch {
                declared: false,
                provided: true,
                ..
            }
        ));
    }

    #[test]
    fn test_every_capability_is_checked() {
        for capability in Capability::all() {
            let mut registry = ModuleRegistry::new();
            let err = registry.register(Arc::new(Claims(capability))).unwrap_err();
            assert_eq!(
                err,
                RegistryError::CapabilityMismatch {
                    module: "claims".to_string(),
                    capability,
                    declared: true,
                    provided: false,
                }
            );
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = ModuleRegistry::new();
        let err = registry.register(MockModule::new("", "r", "q")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_new_store_mounts_every_module() {
        let registry = ModuleRegistry::from_modules(vec![
            MockModule::new("bank", "bank", "bank") as DynModule,
            MockModule::new("gov", "gov", "gov") as DynModule,
        ])
        .unwrap();
        let store = registry.new_store();
        assert!(store.is_mounted("bank"));
        assert!(store.is_mounted("gov"));
    }

    #[test]
    fn test_components_require_finalize() {
        let mut registry = ModuleRegistry::new();
        registry.register(MockModule::new("bank", "bank", "bank")).unwrap();
        assert!(registry.genesis().is_err());
        assert!(registry.sequencer().is_err());
        assert!(registry.simulation().is_err());
    }

    fn space_strategy() -> impl Strategy<Value = usize> {
        0usize..3
    }

    proptest! {
        /// Any N modules with pairwise-distinct keys finalize.
        #[test]
        fn prop_distinct_keys_finalize(n in 1usize..12) {
            let mut registry = ModuleRegistry::new();
            for i in 0..n {
                registry
                    .register(MockModule::new(&format!("m{i}"), &format!("r{i}"), &format!("q{i}")))
                    .unwrap();
            }
            prop_assert!(registry.finalize().is_ok());
            prop_assert_eq!(registry.len(), n);
        }

        /// A collision in any key space between any two modules is rejected,
        /// in whichever order the two are registered.
        #[test]
        fn prop_any_collision_rejected(
            n in 2usize..10,
            first in 0usize..10,
            second in 0usize..10,
            space in space_strategy(),
        ) {
            let first = first % n;
            let second = second % n;
            prop_assume!(first != second);

            let keys: Vec<(String, String, String)> = (0..n)
                .map(|i| {
                    let mut key = (format!("m{i}"), format!("r{i}"), format!("q{i}"));
                    if i == second {
                        match space {
                            0 => key.0 = format!("m{first}"),
                            1 => key.1 = format!("r{first}"),
                            _ => key.2 = format!("q{first}"),
                        }
                    }
                    key
                })
                .collect();

            let mut registry = ModuleRegistry::new();
            let mut failures = Vec::new();
            for (name, route, querier) in &keys {
                if let Err(err) = registry.register(MockModule::new(name, route, querier)) {
                    failures.push(err);
                }
            }

            prop_assert_eq!(failures.len(), 1);
            let expected_space = match space {
                0 => KeySpace::Name,
                1 => KeySpace::RouteKey,
                _ => KeySpace::QuerierRoute,
            };
            let is_duplicate_in_space = matches!(
                &failures[0],
                RegistryError::DuplicateModule { space, .. } if *space == expected_space
            );
            prop_assert!(is_duplicate_in_space);
        }
    }
}
