//! # Ports Module
//!
//! Inbound API traits and outbound dependency traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{AsyncShardingApi, ShardingApi};
pub use outbound::{BackendFactory, MigrationJournal, NoopProvisioner, ShardBackend, ShardProvisioner};
