//! # Service Module
//!
//! The shard router, its topology registry and the rebalancer.

pub mod async_router;
pub mod provisioning;
pub mod rebalancer;
pub mod registry;
pub mod router;

pub use async_router::AsyncShardRouter;
pub use provisioning::wait_until_ready;
pub use rebalancer::{scan, Rebalancer};
pub use registry::{ShardSet, TopologyRegistry};
pub use router::ShardRouter;
