//! # Shard Router Test Suite
//!
//! Cross-crate flows that exercise the router end to end.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Routing and planning throughput
//! └── src/
//!     ├── fixtures.rs   # Router builders shared by flows and benches
//!     └── integration/  # CRUD, rebalance and SQLite flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p shard-tests
//!
//! # By category
//! cargo test -p shard-tests integration::rebalance_flows
//!
//! # Benchmarks
//! cargo bench -p shard-tests
//! ```

pub mod fixtures;
pub mod integration;
