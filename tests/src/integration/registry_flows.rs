//! # Registry and Routing Flows
//!
//! Key-space uniqueness, freezing, and route resolution before and after a
//! module claims a route key.

#[cfg(test)]
mod tests {
    use crate::fixtures::{gov, ledger, registry, Emitter};
    use module_manager::{
        DynModule, KeySpace, ModuleRegistry, RegistryError, RequestError, RouteError,
    };
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use shared_types::{BlockContext, Query, Request};
    use std::sync::Arc;

    fn block() -> BlockContext {
        BlockContext::new("registry-test", 1, 0)
    }

    fn emitters(names: &[String]) -> Vec<DynModule> {
        names
            .iter()
            .map(|name| Arc::new(Emitter::new(name, &[])) as DynModule)
            .collect()
    }

    #[test]
    fn test_request_unroutable_until_route_registered() {
        let request = Request::new("gov", "submit", Value::Null);

        let without_gov = registry(vec![ledger()]).unwrap();
        let mut store = without_gov.new_store();
        let err = without_gov
            .sequencer()
            .unwrap()
            .deliver(&mut store, &block(), &request)
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Route(RouteError::UnroutableRequest { ref key }) if key == "gov"
        ));

        let with_gov = registry(vec![ledger(), gov()]).unwrap();
        let mut store = with_gov.new_store();
        let response = with_gov
            .sequencer()
            .unwrap()
            .deliver(&mut store, &block(), &request)
            .unwrap();
        assert_eq!(response.data, json!({"proposal_id": 1}));
    }

    #[test]
    fn test_query_unroutable_until_route_registered() {
        let query = Query::new("gov", "proposals", Value::Null);

        let without_gov = registry(vec![ledger()]).unwrap();
        let err = without_gov
            .sequencer()
            .unwrap()
            .query(&without_gov.new_store(), &query)
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Route(RouteError::UnroutableQuery { .. })
        ));

        let with_gov = registry(vec![gov()]).unwrap();
        let value = with_gov
            .sequencer()
            .unwrap()
            .query(&with_gov.new_store(), &query)
            .unwrap();
        assert_eq!(value, json!(0));
    }

    #[test]
    fn test_register_after_finalize_is_frozen() {
        let mut registry = registry(vec![ledger()]).unwrap();
        let err = registry.register(gov()).unwrap_err();
        assert_eq!(
            err,
            RegistryError::RegistryFrozen {
                module: "gov".to_string()
            }
        );
        assert_eq!(registry.module_names(), vec!["bank"]);
    }

    #[test]
    fn test_unfinalized_registry_has_no_components() {
        let mut registry = ModuleRegistry::new();
        registry.register(ledger()).unwrap();
        assert!(matches!(registry.sequencer(), Err(RegistryError::NotFinalized)));
        assert!(matches!(registry.genesis(), Err(RegistryError::NotFinalized)));
    }

    #[test]
    fn test_default_modules_cannot_be_registered_twice() {
        let mut modules = app_modules::default_modules();
        modules.extend(app_modules::default_modules());
        let err = ModuleRegistry::from_modules(modules).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateModule { space: KeySpace::Name, ref value, .. } if value == "bank"
        ));
    }

    proptest! {
        #[test]
        fn prop_distinct_names_finalize(n in 1usize..10) {
            let names: Vec<String> = (0..n).map(|i| format!("m{i}")).collect();
            let registry = registry(emitters(&names)).unwrap();
            prop_assert_eq!(registry.len(), n);
        }

        #[test]
        fn prop_any_duplicate_is_rejected(n in 2usize..10, a in 0usize..10, b in 0usize..10) {
            let (a, b) = (a % n, b % n);
            prop_assume!(a != b);
            let mut names: Vec<String> = (0..n).map(|i| format!("m{i}")).collect();
            names[b] = names[a].clone();

            let err = registry(emitters(&names)).unwrap_err();
            let is_duplicate = matches!(
                err,
                RegistryError::DuplicateModule { space: KeySpace::Name, .. }
            );
            prop_assert!(is_duplicate);
        }
    }
}
