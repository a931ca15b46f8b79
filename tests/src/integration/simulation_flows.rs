//! # Simulation Flows
//!
//! Seeded genesis and full simulations over the default modules.

#[cfg(test)]
mod tests {
    use crate::fixtures::{gov, ledger, registry};
    use module_manager::SimulationConfig;

    #[test]
    fn test_randomized_genesis_is_byte_identical() {
        let registry = app_modules::default_registry().unwrap();
        let harness = registry.simulation().unwrap();
        let first = harness.randomized_genesis(42).unwrap().to_json_vec().unwrap();
        let second = harness.randomized_genesis(42).unwrap().to_json_vec().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_randomized_genesis_falls_back_to_defaults() {
        let registry = registry(vec![ledger(), gov()]).unwrap();
        let genesis = registry.simulation().unwrap().randomized_genesis(42).unwrap();
        assert_eq!(
            genesis,
            registry.genesis().unwrap().default_genesis().unwrap()
        );
    }

    #[test]
    fn test_simulation_is_reproducible() {
        let config = SimulationConfig {
            num_blocks: 20,
            ..SimulationConfig::default()
        };
        let first = app_modules::default_registry().unwrap();
        let second = app_modules::default_registry().unwrap();

        let a = first.simulation().unwrap().simulate(42, &config).unwrap();
        let b = second.simulation().unwrap().simulate(42, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.blocks, 20);
    }

    #[test]
    fn test_seeds_diverge() {
        let registry = app_modules::default_registry().unwrap();
        let harness = registry.simulation().unwrap();
        let config = SimulationConfig {
            num_blocks: 5,
            ..SimulationConfig::default()
        };
        let a = harness.simulate(1, &config).unwrap();
        let b = harness.simulate(2, &config).unwrap();
        assert_ne!(a.app_hash, b.app_hash);
    }
}
