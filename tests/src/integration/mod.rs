//! Cross-crate flows over the module manager, the default modules and the
//! node runtime.

mod block_flows;
mod genesis_flows;
mod registry_flows;
mod simulation_flows;
