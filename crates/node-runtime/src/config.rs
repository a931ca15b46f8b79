//! # Node Configuration
//!
//! Runtime parameters of the devnet node, with environment overrides.
//!
//! ## Environment Variables
//!
//! | Variable                | Field                        | Default        |
//! |-------------------------|------------------------------|----------------|
//! | `MC_CHAIN_ID`           | `chain.chain_id`             | `modular-devnet` |
//! | `MC_GENESIS_PATH`       | `chain.genesis_path`         | unset          |
//! | `MC_EXPORT_PATH`        | `chain.export_path`          | unset          |
//! | `MC_BLOCK_INTERVAL_MS`  | `block.interval_ms`          | `1000`         |
//! | `MC_MAX_BLOCKS`         | `block.max_blocks`           | unset          |
//! | `MC_CHECK_INVARIANTS`   | `block.check_invariants`     | `true`         |
//! | `MC_SIM_SEED`           | `simulation.seed`            | unset          |
//! | `MC_LOG_LEVEL`/`RUST_LOG` | `logging.log_level`        | `info`         |
//! | `MC_JSON_LOGS`          | `logging.json_logs`          | `false`        |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub chain: ChainConfig,
    pub block: BlockConfig,
    pub simulation: SimulationSettings,
    pub logging: LogConfig,
}

/// Chain identity and genesis files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: String,
    /// Genesis file to import. Without one, a default or randomized
    /// genesis is generated.
    pub genesis_path: Option<PathBuf>,
    /// Where the final state is exported on shutdown.
    pub export_path: Option<PathBuf>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: "modular-devnet".to_string(),
            genesis_path: None,
            export_path: None,
        }
    }
}

/// Block production pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockConfig {
    pub interval_ms: u64,
    /// Stop after this many blocks. Runs until interrupted when unset.
    pub max_blocks: Option<u64>,
    /// Assert every registered invariant at commit.
    pub check_invariants: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_blocks: None,
            check_invariants: true,
        }
    }
}

/// Randomized genesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSettings {
    /// Generate genesis from this seed when no genesis file is given.
    pub seed: Option<u64>,
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `module_manager=debug`.
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("chain id must not be empty")]
    EmptyChainId,

    #[error("block interval must be positive")]
    ZeroBlockInterval,

    #[error("max_blocks must be positive when set")]
    ZeroMaxBlocks,
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        reason: e.to_string(),
        value,
    })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}

impl NodeConfig {
    /// Defaults overridden by `MC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(chain_id) = lookup("MC_CHAIN_ID") {
            config.chain.chain_id = chain_id;
        }
        if let Some(path) = lookup("MC_GENESIS_PATH") {
            config.chain.genesis_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("MC_EXPORT_PATH") {
            config.chain.export_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("MC_BLOCK_INTERVAL_MS") {
            config.block.interval_ms = parse("MC_BLOCK_INTERVAL_MS", value)?;
        }
        if let Some(value) = lookup("MC_MAX_BLOCKS") {
            config.block.max_blocks = Some(parse("MC_MAX_BLOCKS", value)?);
        }
        if let Some(value) = lookup("MC_CHECK_INVARIANTS") {
            config.block.check_invariants = parse_bool("MC_CHECK_INVARIANTS", value)?;
        }
        if let Some(value) = lookup("MC_SIM_SEED") {
            config.simulation.seed = Some(parse("MC_SIM_SEED", value)?);
        }
        if let Some(level) = lookup("MC_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            config.logging.log_level = level;
        }
        if let Some(value) = lookup("MC_JSON_LOGS") {
            config.logging.json_logs = parse_bool("MC_JSON_LOGS", value)?;
        }

        Ok(config)
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.chain_id.trim().is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        if self.block.interval_ms == 0 {
            return Err(ConfigError::ZeroBlockInterval);
        }
        if self.block.max_blocks == Some(0) {
            return Err(ConfigError::ZeroMaxBlocks);
        }
        Ok(())
    }
}
