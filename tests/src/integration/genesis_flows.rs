//! # Genesis Flows
//!
//! Default, validate, import and export across whole registries.

#[cfg(test)]
mod tests {
    use crate::fixtures::{gov, ledger, registry};
    use module_manager::{GenesisError, GenesisState, ModuleRegistry, ValidateMode};
    use serde_json::json;
    use shared_types::{BlockContext, MultiStore, Request};

    fn init(registry: &ModuleRegistry, genesis: &GenesisState) -> MultiStore {
        let mut store = registry.new_store();
        registry
            .genesis()
            .unwrap()
            .init_genesis(&mut store, genesis, &BlockContext::genesis("genesis-test", 0))
            .unwrap();
        store
    }

    #[test]
    fn test_module_without_genesis_contributes_nothing() {
        let registry = registry(vec![ledger(), gov()]).unwrap();
        let genesis = registry.genesis().unwrap().default_genesis().unwrap();

        assert_eq!(genesis.module_names(), vec!["bank"]);
        assert_eq!(
            serde_json::to_value(&genesis).unwrap(),
            json!({"bank": {"balance": 0}})
        );
    }

    #[test]
    fn test_negative_balance_names_the_module() {
        let registry = registry(vec![ledger(), gov()]).unwrap();
        let mut genesis = GenesisState::new();
        genesis.insert("bank", json!({"balance": -1}));

        let err = registry
            .genesis()
            .unwrap()
            .validate_genesis(&genesis, ValidateMode::Strict)
            .unwrap_err();
        assert!(matches!(err, GenesisError::Validation { ref module, .. } if module == "bank"));
    }

    #[test]
    fn test_genesis_entry_for_module_without_genesis_is_rejected() {
        let registry = registry(vec![ledger(), gov()]).unwrap();
        let mut genesis = registry.genesis().unwrap().default_genesis().unwrap();
        genesis.insert("gov", json!({}));

        let err = registry
            .genesis()
            .unwrap()
            .validate_genesis(&genesis, ValidateMode::Strict)
            .unwrap_err();
        assert!(matches!(err, GenesisError::UnknownModule { ref module } if module == "gov"));
    }

    #[test]
    fn test_default_genesis_validates() {
        let registry = app_modules::default_registry().unwrap();
        let coordinator = registry.genesis().unwrap();
        let genesis = coordinator.default_genesis().unwrap();
        coordinator
            .validate_genesis(&genesis, ValidateMode::Strict)
            .unwrap();
    }

    #[test]
    fn test_export_is_idempotent() {
        let registry = app_modules::default_registry().unwrap();
        let genesis = registry.simulation().unwrap().randomized_genesis(3).unwrap();
        let store = init(&registry, &genesis);

        let coordinator = registry.genesis().unwrap();
        let first = coordinator.export_genesis(&store).unwrap();
        let second = coordinator.export_genesis(&store).unwrap();
        assert_eq!(first.to_json_vec().unwrap(), second.to_json_vec().unwrap());
    }

    #[test]
    fn test_independent_modules_reorder_to_same_state() {
        let forward = registry(vec![ledger(), gov()]).unwrap();
        let reverse = registry(vec![gov(), ledger()]).unwrap();
        let block = BlockContext::new("genesis-test", 1, 5);
        let credit = Request::new("bank", "credit", json!({"amount": 7}));
        let submit = Request::new("gov", "submit", json!(null));

        let mut results = Vec::new();
        for registry in [&forward, &reverse] {
            let genesis = registry.genesis().unwrap().default_genesis().unwrap();
            let mut store = init(registry, &genesis);
            let sequencer = registry.sequencer().unwrap();
            sequencer.begin_block(&mut store, &block).unwrap();
            sequencer.deliver(&mut store, &block, &credit).unwrap();
            sequencer.deliver(&mut store, &block, &submit).unwrap();
            sequencer.end_block(&mut store, &block).unwrap();

            let exported = registry.genesis().unwrap().export_genesis(&store).unwrap();
            results.push((exported.get("bank").cloned(), store.root_hash_hex()));
        }

        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].0, Some(json!({"balance": 7})));
    }

    #[test]
    fn test_exported_file_reimports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        let registry = app_modules::default_registry().unwrap();
        let genesis = registry.simulation().unwrap().randomized_genesis(11).unwrap();
        let store = init(&registry, &genesis);

        registry
            .genesis()
            .unwrap()
            .export_genesis(&store)
            .unwrap()
            .save(&path)
            .unwrap();
        let loaded = GenesisState::load(&path).unwrap();
        let reimported = init(&registry, &loaded);
        assert_eq!(reimported.root_hash(), store.root_hash());
    }
}
