//! # Modular-Chain Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Small modules built only for tests
//! └── integration/      # Cross-crate flows
//!     ├── registry_flows.rs
//!     ├── genesis_flows.rs
//!     ├── block_flows.rs
//!     └── simulation_flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mc-tests
//! cargo test -p mc-tests integration::genesis_flows::
//! ```

pub mod fixtures;
pub mod integration;
