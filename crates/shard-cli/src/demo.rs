//! Reference scenario against scratch SQLite shards.
//!
//! 1. Four hash-routed shards: create 101, 202, 303, 404; read, delete and
//!    re-read 404.
//! 2. Four range-routed shards (250/500/750/catch-all): create 10 and 250,
//!    list every shard.
//! 3. Grow the hash cluster to five shards and rebalance.

use std::io::Write;

use anyhow::{ensure, Context, Result};
use shard_router::{
    Record, RouterConfig, ShardDescriptor, ShardRouter, ShardingApi, SqliteBackendFactory,
    SqliteConfig, Topology,
};
use tempfile::TempDir;

fn descriptors(n: usize) -> Vec<ShardDescriptor> {
    (0..n)
        .map(|i| {
            ShardDescriptor::new(
                format!("shard{}", i + 1),
                SqliteBackendFactory::shard_file_name(i),
            )
        })
        .collect()
}

fn open(dir: &TempDir, topology: Topology) -> Result<ShardRouter<SqliteBackendFactory>> {
    let factory = SqliteBackendFactory::new(dir.path(), SqliteConfig::default());
    ShardRouter::new(topology, factory, RouterConfig::default()).context("Failed to open demo shards")
}

/// Run the scenario, narrating each step to `out`.
pub fn run(out: &mut dyn Write) -> Result<()> {
    hash_scenario(out)?;
    range_scenario(out)?;
    Ok(())
}

fn hash_scenario(out: &mut dyn Write) -> Result<()> {
    let dir = TempDir::new().context("Failed to create scratch directory")?;
    let router = open(&dir, Topology::hashed(descriptors(4))?)?;

    writeln!(out, "== hash routing, 4 shards ==")?;
    for id in [101, 202, 303, 404] {
        let shard = router.create(Record::named(id, format!("user{}", id)))?;
        writeln!(out, "create {} -> shard {}", id, shard)?;
    }

    let (found, shard) = router.read(404)?;
    ensure!(found.is_some(), "record 404 missing after create");
    writeln!(out, "read 404 -> shard {}", shard)?;

    let deleted = router.delete(404)?;
    writeln!(out, "delete 404 -> {}", deleted)?;

    let (found, _) = router.read(404)?;
    ensure!(found.is_none(), "record 404 still present after delete");
    writeln!(out, "read 404 -> absent")?;

    let report = router.add_shard(ShardDescriptor::new(
        "shard5",
        SqliteBackendFactory::shard_file_name(4),
    ))?;
    writeln!(
        out,
        "add shard5 -> topology v{}, moved {}, total {}",
        report.topology_version,
        report.moved,
        report.total_records()
    )?;
    ensure!(report.total_records() == 3, "record count changed during rebalance");
    Ok(())
}

fn range_scenario(out: &mut dyn Write) -> Result<()> {
    let dir = TempDir::new().context("Failed to create scratch directory")?;
    let router = open(&dir, Topology::ranged(descriptors(4), vec![250, 500, 750])?)?;

    writeln!(out, "== range routing, bounds 250/500/750 ==")?;
    for id in [10, 250] {
        let shard = router.create(Record::named(id, format!("user{}", id)))?;
        writeln!(out, "create {} -> shard {}", id, shard)?;
    }

    for (shard, records) in router.list_all()? {
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        writeln!(out, "shard {}: {:?}", shard, ids)?;
    }
    Ok(())
}
