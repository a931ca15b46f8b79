//! # Block Flows
//!
//! Hook ordering, halting on hook failure, and the full application
//! lifecycle over the default modules.

#[cfg(test)]
mod tests {
    use crate::fixtures::{ledger, registry, Emitter};
    use module_manager::{
        AppModule, DynModule, HookPhase, ModuleContext, ModuleDescriptor, ModuleError,
    };
    use node_runtime::{App, AppError, NodeConfig, NodeRuntime};
    use serde_json::json;
    use shared_types::{BlockContext, Query, Request, ValidatorUpdate};
    use std::sync::Arc;

    struct FailingBeginBlock;

    impl AppModule for FailingBeginBlock {
        fn descriptor(&self) -> ModuleDescriptor {
            ModuleDescriptor::new("broken").without_route().without_querier()
        }

        fn begin_block(&self, ctx: &mut ModuleContext<'_>) -> Result<(), ModuleError> {
            Err(ModuleError::Internal(format!(
                "cannot begin height {}",
                ctx.block().height
            )))
        }
    }

    fn emitter(name: &str, keys: &[&str]) -> DynModule {
        Arc::new(Emitter::new(name, keys))
    }

    fn end_block_updates(modules: Vec<DynModule>) -> Vec<ValidatorUpdate> {
        let registry = registry(modules).unwrap();
        let mut store = registry.new_store();
        let block = BlockContext::new("block-test", 1, 0);
        registry
            .sequencer()
            .unwrap()
            .end_block(&mut store, &block)
            .unwrap()
            .validator_updates
    }

    #[test]
    fn test_update_order_follows_registration() {
        let a_then_b = end_block_updates(vec![
            emitter("a", &["a1", "a2"]),
            emitter("b", &["b1"]),
        ]);
        assert_eq!(
            a_then_b,
            vec![
                ValidatorUpdate::new("a1", 1),
                ValidatorUpdate::new("a2", 1),
                ValidatorUpdate::new("b1", 1),
            ]
        );

        let b_then_a = end_block_updates(vec![
            emitter("b", &["b1"]),
            emitter("a", &["a1", "a2"]),
        ]);
        assert_eq!(
            b_then_a,
            vec![
                ValidatorUpdate::new("b1", 1),
                ValidatorUpdate::new("a1", 1),
                ValidatorUpdate::new("a2", 1),
            ]
        );
    }

    #[test]
    fn test_begin_block_failure_halts_with_context() {
        let registry = registry(vec![ledger(), Arc::new(FailingBeginBlock) as DynModule]).unwrap();
        let mut app = App::new(registry, "block-test").unwrap();
        let genesis = app.registry().genesis().unwrap().default_genesis().unwrap();
        app.init_chain(&genesis, 0).unwrap();

        let err = app.begin_block(5, "").unwrap_err();
        match err {
            AppError::Hook(hook) => {
                assert_eq!(hook.module, "broken");
                assert_eq!(hook.phase, HookPhase::BeginBlock);
                assert_eq!(hook.height, 1);
            }
            other => panic!("expected hook failure, got {other}"),
        }

        assert_eq!(app.halted(), Some(("broken", HookPhase::BeginBlock, 1)));
        assert!(matches!(
            app.begin_block(10, ""),
            Err(AppError::Halted { ref module, phase: HookPhase::BeginBlock, height: 1 }) if module == "broken"
        ));
        assert!(matches!(app.end_block(), Err(AppError::Halted { .. })));
        assert!(matches!(app.commit(), Err(AppError::Halted { .. })));
        assert_eq!(app.height(), 0);
    }

    fn funded_genesis(app: &App) -> module_manager::GenesisState {
        let mut genesis = app.registry().genesis().unwrap().default_genesis().unwrap();
        genesis.insert(
            "bank",
            json!({"params": {"send_enabled": true}, "balances": [
                {"address": "alice", "amount": 1000},
                {"address": "bob", "amount": 10}
            ]}),
        );
        genesis.insert(
            "staking",
            json!({"params": {"max_validators": 10, "power_reduction": 10}, "validators": [
                {"pub_key": "aa", "operator": "alice"},
                {"pub_key": "bb", "operator": "bob"}
            ]}),
        );
        genesis
    }

    fn run_blocks(app: &mut App) -> Vec<String> {
        let mut hashes = Vec::new();
        for height in 1..=3u64 {
            app.begin_block(height * 5, "aa").unwrap();
            app.deliver_tx(&Request::new(
                "bank",
                "send",
                json!({"from": "alice", "to": "bob", "amount": 100}),
            ))
            .unwrap();
            app.deliver_tx(&Request::new(
                "service",
                "define_service",
                json!({"name": format!("svc{height}"), "author": "alice", "description": "echo"}),
            ))
            .unwrap();
            app.end_block().unwrap();
            hashes.push(app.commit().unwrap().app_hash);
        }
        hashes
    }

    fn default_app() -> App {
        App::new(app_modules::default_registry().unwrap(), "block-test").unwrap()
    }

    #[test]
    fn test_app_hash_is_deterministic() {
        let mut first = default_app();
        let mut second = default_app();
        first.init_chain(&funded_genesis(&first), 0).unwrap();
        second.init_chain(&funded_genesis(&second), 0).unwrap();

        assert_eq!(run_blocks(&mut first), run_blocks(&mut second));
    }

    #[test]
    fn test_exported_state_restarts_chain() {
        let mut app = default_app();
        let validators = app.init_chain(&funded_genesis(&app), 0).unwrap();
        assert_eq!(
            validators,
            vec![ValidatorUpdate::new("aa", 100), ValidatorUpdate::new("bb", 1)]
        );
        run_blocks(&mut app);

        let exported = app.export_genesis().unwrap();
        let mut restarted = default_app();
        restarted.init_chain(&exported, 0).unwrap();
        assert_eq!(restarted.app_hash(), app.app_hash());

        let bob = restarted
            .query(&Query::new("bank", "balance", json!({"address": "bob"})))
            .unwrap();
        assert_eq!(bob["amount"], json!(310));
    }

    #[tokio::test]
    async fn test_node_runtime_produces_blocks() {
        let mut config = NodeConfig::default();
        config.block.interval_ms = 5;
        config.block.max_blocks = Some(2);
        config.simulation.seed = Some(42);

        let mut node = NodeRuntime::new(config).unwrap();
        assert_eq!(node.run().await.unwrap(), 2);
        assert_eq!(node.app().height(), 2);
    }
}
