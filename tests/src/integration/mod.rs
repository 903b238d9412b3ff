//! # Integration Flows
//!
//! - `crud_flows`: routing and per-shard CRUD
//! - `rebalance_flows`: growth, partial failures, reconciliation
//! - `sqlite_flows`: the same flows over SQLite files

pub mod crud_flows;
pub mod rebalance_flows;
pub mod sqlite_flows;
