//! # Node Runtime Library
//!
//! Hosts a module registry as a running chain. The binary in `main.rs`
//! wires configuration and logging around [`NodeRuntime`].
//!
//! - [`app`]: the `init_chain → begin_block → deliver_tx → end_block → commit` facade
//! - [`node`]: timed block production and genesis export
//! - [`config`]: `MC_*` environment configuration
//! - [`telemetry`]: tracing subscriber setup

#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod node;
pub mod telemetry;

pub use app::{App, AppError, CommitInfo};
pub use config::{BlockConfig, ChainConfig, ConfigError, LogConfig, NodeConfig, SimulationSettings};
pub use node::{load_genesis, NodeRuntime, ShutdownHandle, GENESIS_TIME};
pub use telemetry::{init_logging, TelemetryError};
