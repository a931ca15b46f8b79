//! # Application Modules
//!
//! Reference modules for the module manager.
//!
//! | Module    | Route / querier | Genesis | Invariants | Simulation | Hooks          |
//! |-----------|-----------------|---------|------------|------------|----------------|
//! | `bank`    | `bank`          | yes     | yes        | yes        | -              |
//! | `staking` | `staking`       | yes     | yes        | yes        | end block      |
//! | `service` | `service`       | yes     | yes        | yes        | end block      |
//!
//! `staking` reads bank balances, so `bank` must be registered first.
//! [`default_modules`] returns the modules in a valid order.

pub mod bank;
pub mod codec;
pub mod service;
pub mod staking;

pub use bank::BankModule;
pub use service::ServiceModule;
pub use staking::StakingModule;

use module_manager::{DynModule, ModuleRegistry, RegistryError};
use std::sync::Arc;

/// Every module of the application, in registration order.
pub fn default_modules() -> Vec<DynModule> {
    vec![
        Arc::new(BankModule::new()) as DynModule,
        Arc::new(StakingModule::new()) as DynModule,
        Arc::new(ServiceModule::new()) as DynModule,
    ]
}

/// A finalized registry of [`default_modules`].
pub fn default_registry() -> Result<ModuleRegistry, RegistryError> {
    ModuleRegistry::from_modules(default_modules())
}
