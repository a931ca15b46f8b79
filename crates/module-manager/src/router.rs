//! # Route Table
//!
//! Read-only index from route keys to the owning module's handler and
//! querier. Built once by [`ModuleRegistry::finalize`](crate::ModuleRegistry::finalize);
//! immutable afterwards, so lookups need no locking.

use crate::descriptor::KeySpace;
use crate::errors::{RegistryError, RouteError};
use crate::module::{Handler, Querier};
use crate::registry::RegisteredModule;
use std::collections::HashMap;
use tracing::debug;

/// A routed handler and the module that owns it.
#[derive(Clone)]
pub struct RoutedHandler {
    pub module: String,
    pub handler: Handler,
}

/// A routed querier and the module that owns it.
#[derive(Clone)]
pub struct RoutedQuerier {
    pub module: String,
    pub querier: Querier,
}

/// `route_key -> handler`, `querier_route -> querier`.
#[derive(Clone, Default)]
pub struct RouteTable {
    handlers: HashMap<String, RoutedHandler>,
    queriers: HashMap<String, RoutedQuerier>,
    /// Route keys in registry order, for listing.
    route_order: Vec<(String, String)>,
    querier_order: Vec<(String, String)>,
}

impl RouteTable {
    /// Build the table from modules in registry order.
    ///
    /// Duplicate keys are reported here as well as at registration, so a
    /// table can never be built with an ambiguous route.
    pub(crate) fn build(modules: &[RegisteredModule]) -> Result<Self, RegistryError> {
        let mut table = Self::default();

        for registered in modules {
            let desc = registered.descriptor();
            let module = registered.module();

            if !desc.route_key.is_empty() {
                let handler = module.new_handler().ok_or_else(|| RegistryError::MissingHandler {
                    module: desc.name.clone(),
                    route: desc.route_key.clone(),
                    kind: "handler",
                })?;
                if let Some(existing) = table.handlers.get(&desc.route_key) {
                    return Err(RegistryError::DuplicateModule {
                        space: KeySpace::RouteKey,
                        value: desc.route_key.clone(),
                        module: desc.name.clone(),
                        existing: existing.module.clone(),
                    });
                }
                debug!("[Router] route {:?} -> {}", desc.route_key, desc.name);
                table
                    .route_order
                    .push((desc.route_key.clone(), desc.name.clone()));
                table.handlers.insert(
                    desc.route_key.clone(),
                    RoutedHandler {
                        module: desc.name.clone(),
                        handler,
                    },
                );
            }

            if !desc.querier_route.is_empty() {
                let querier = module.new_querier().ok_or_else(|| RegistryError::MissingHandler {
                    module: desc.name.clone(),
                    route: desc.querier_route.clone(),
                    kind: "querier",
                })?;
                if let Some(existing) = table.queriers.get(&desc.querier_route) {
                    return Err(RegistryError::DuplicateModule {
                        space: KeySpace::QuerierRoute,
                        value: desc.querier_route.clone(),
                        module: desc.name.clone(),
                        existing: existing.module.clone(),
                    });
                }
                debug!("[Router] querier {:?} -> {}", desc.querier_route, desc.name);
                table
                    .querier_order
                    .push((desc.querier_route.clone(), desc.name.clone()));
                table.queriers.insert(
                    desc.querier_route.clone(),
                    RoutedQuerier {
                        module: desc.name.clone(),
                        querier,
                    },
                );
            }
        }

        Ok(table)
    }

    /// Look up the handler for a request route key.
    pub fn route_handler(&self, key: &str) -> Result<&RoutedHandler, RouteError> {
        self.handlers
            .get(key)
            .ok_or_else(|| RouteError::UnroutableRequest {
                key: key.to_string(),
            })
    }

    /// Look up the querier for a querier route.
    pub fn route_querier(&self, key: &str) -> Result<&RoutedQuerier, RouteError> {
        self.queriers
            .get(key)
            .ok_or_else(|| RouteError::UnroutableQuery {
                key: key.to_string(),
            })
    }

    /// `(route_key, module)` pairs in registry order.
    pub fn routes(&self) -> &[(String, String)] {
        &self.route_order
    }

    /// `(querier_route, module)` pairs in registry order.
    pub fn querier_routes(&self) -> &[(String, String)] {
        &self.querier_order
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.route_order)
            .field("querier_routes", &self.querier_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModuleContext;
    use crate::descriptor::ModuleDescriptor;
    use crate::errors::ModuleError;
    use crate::module::{AppModule, DynModule};
    use shared_types::{Request, Response};
    use std::sync::Arc;

    struct Echo {
        name: &'static str,
        route: &'static str,
    }

    impl AppModule for Echo {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new(self.name)
                .route(self.route)
                .without_querier()
        }

        fn new_handler(&self) -> Option<Handler> {
            Some(Arc::new(
                |_ctx: &mut ModuleContext<'_>, req: &Request| -> Result<Response, ModuleError> {
                    Ok(Response::with_data(req.payload.clone()))
                },
            ))
        }
    }

    struct Silent;

    impl AppModule for Silent {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("silent").without_querier()
        }
    }

    fn registered(modules: Vec<DynModule>) -> Vec<RegisteredModule> {
        modules
            .into_iter()
            .enumerate()
            .map(|(index, module)| RegisteredModule::new(index, module))
            .collect()
    }

    #[test]
    fn test_build_and_route() {
        let modules: Vec<DynModule> = vec![
            Arc::new(Echo { name: "a", route: "ra" }),
            Arc::new(Echo { name: "b", route: "rb" }),
        ];
        let table = RouteTable::build(&registered(modules)).unwrap();

        assert_eq!(table.route_handler("rb").unwrap().module, "b");
        assert_eq!(
            table.route_handler("rc").err(),
            Some(RouteError::UnroutableRequest {
                key: "rc".to_string()
            })
        );
        assert!(matches!(
            table.route_querier("ra"),
            Err(RouteError::UnroutableQuery { .. })
        ));
        assert_eq!(
            table.routes(),
            &[
                ("ra".to_string(), "a".to_string()),
                ("rb".to_string(), "b".to_string())
            ]
        );
    }

    #[test]
    fn test_build_rejects_duplicate_route() {
        let modules: Vec<DynModule> = vec![
            Arc::new(Echo { name: "a", route: "r" }),
            Arc::new(Echo { name: "b", route: "r" }),
        ];
        let err = RouteTable::build(&registered(modules)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateModule { .. }));
    }

    #[test]
    fn test_build_rejects_route_without_handler() {
        let modules: Vec<DynModule> = vec![Arc::new(Silent)];
        let err = RouteTable::build(&registered(modules)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::MissingHandler {
                module: "silent".to_string(),
                route: "silent".to_string(),
                kind: "handler",
            }
        );
    }
}
