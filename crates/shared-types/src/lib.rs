//! # Shared Types Crate
//!
//! Types shared between the runtime, the module manager and the modules.
//!
//! ## Design Principles
//!
//! - **Partitioned state**: each module owns exactly one partition of the
//!   [`MultiStore`]; write access is granted one partition at a time.
//! - **Deterministic layout**: every map is ordered so that hashing and
//!   export produce identical bytes on every replica.

pub mod entities;
pub mod errors;
pub mod store;

pub use entities::*;
pub use errors::*;
pub use store::{CheckedOut, KvStore, MultiStore, StoreView};
