//! # Algorithms Module
//!
//! Pure routing and rebalance-planning functions.

pub mod rebalance_plan;
pub mod routing;

pub use rebalance_plan::{find_misplaced, plan_rebalance, Migration, RebalancePlan};
pub use routing::{hash_route, is_cross_shard, key_digest, range_route, route};
