//! Subcommand dispatch.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use shard_router::{
    JsonLinesJournal, RebalanceReport, Record, RecordField, RecordId, RecordUpdate, RouterConfig,
    ShardDescriptor, ShardError, ShardRouter, ShardingApi, SqliteBackendFactory, SqliteConfig,
    Topology,
};
use shard_telemetry::{record_operation, record_rebalance, set_shard_count, HistogramTimer, REBALANCE_DURATION};
use tracing::info;

use crate::{demo, Args, Command, Strategy};

/// Router over SQLite shards.
pub type SqliteRouter = ShardRouter<SqliteBackendFactory>;

/// Upper bounds used when `--strategy range` is given without `--bounds`.
pub fn default_bounds(shards: usize) -> Vec<RecordId> {
    (1..shards as RecordId).map(|i| i * 250).collect()
}

/// Build the topology described by the flags.
pub fn build_topology(args: &Args) -> Result<Topology> {
    let descriptors: Vec<_> = (0..args.shards)
        .map(|i| {
            ShardDescriptor::new(
                format!("shard{}", i + 1),
                SqliteBackendFactory::shard_file_name(i),
            )
        })
        .collect();

    let topology = match args.strategy {
        Strategy::Hash => Topology::hashed(descriptors),
        Strategy::Range => {
            let bounds = if args.bounds.is_empty() {
                default_bounds(args.shards)
            } else {
                args.bounds.clone()
            };
            Topology::ranged(descriptors, bounds)
        }
    };
    topology.context("Invalid topology flags")
}

/// Open the router described by the flags.
pub fn build_router(args: &Args) -> Result<SqliteRouter> {
    let factory = SqliteBackendFactory::new(
        &args.data_dir,
        SqliteConfig {
            busy_timeout_ms: args.busy_timeout_ms,
        },
    );
    let config = RouterConfig::default().with_migration_order(args.order);

    let mut router = ShardRouter::new(build_topology(args)?, factory, config)
        .with_context(|| format!("Failed to open shards in {}", args.data_dir.display()))?;
    if let Some(path) = &args.journal {
        router = router.with_journal(Arc::new(JsonLinesJournal::new(path)));
    }

    set_shard_count(router.shard_count());
    Ok(router)
}

/// Run the selected subcommand, writing results to `out`.
pub fn run(args: &Args, out: &mut dyn Write) -> Result<()> {
    match &args.command {
        Command::Demo => return demo::run(out),
        Command::Pending { path } => return pending(path, out),
        _ => {}
    }

    let router = build_router(args)?;
    match &args.command {
        Command::Create { id, name, email } => create(&router, *id, name, email, out),
        Command::Get { id } => get(&router, *id, out),
        Command::Update {
            id,
            name,
            email,
            clear_name,
            clear_email,
        } => {
            let mut update = RecordUpdate::from_options(name.clone(), email.clone());
            if *clear_name {
                update = update.clear(RecordField::Name);
            }
            if *clear_email {
                update = update.clear(RecordField::Email);
            }
            update_record(&router, *id, &update, out)
        }
        Command::Delete { id } => delete(&router, *id, out),
        Command::List { shard } => list(&router, *shard, out),
        Command::AddShard {
            name,
            location,
            bound,
        } => {
            let next = router.shard_count();
            let descriptor = ShardDescriptor::new(
                name.clone().unwrap_or_else(|| format!("shard{}", next + 1)),
                location
                    .clone()
                    .unwrap_or_else(|| SqliteBackendFactory::shard_file_name(next)),
            );
            add_shard(&router, descriptor, *bound, out)
        }
        Command::Rebalance => {
            let report = timed_rebalance(|| router.rebalance())?;
            print_report(&report, out)
        }
        Command::Demo | Command::Pending { .. } => Ok(()),
    }
}

fn shard_label(router: &SqliteRouter, index: usize) -> String {
    match router.topology().descriptor(index) {
        Ok(descriptor) => format!("{} ({})", index, descriptor.name),
        Err(_) => index.to_string(),
    }
}

fn print_record(record: &Record, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "  id={} name={} email={}",
        record.id,
        record.name.as_deref().unwrap_or("-"),
        record.email.as_deref().unwrap_or("-")
    )?;
    Ok(())
}

fn create(
    router: &SqliteRouter,
    id: RecordId,
    name: &Option<String>,
    email: &Option<String>,
    out: &mut dyn Write,
) -> Result<()> {
    if let (Some(_), shard) = router.read(id).context("Failed to check for existing record")? {
        writeln!(out, "Record {} already exists on shard {}", id, shard_label(router, shard))?;
        return Ok(());
    }

    let result = router.create(Record::new(id, name.clone(), email.clone()));
    record_operation("create", result.is_ok());
    let shard = result.with_context(|| format!("Failed to create record {}", id))?;
    writeln!(out, "Record {} added to shard {}", id, shard_label(router, shard))?;
    Ok(())
}

fn get(router: &SqliteRouter, id: RecordId, out: &mut dyn Write) -> Result<()> {
    let result = router.read(id);
    record_operation("read", result.is_ok());
    match result.with_context(|| format!("Failed to read record {}", id))? {
        (Some(record), shard) => {
            writeln!(out, "Record {} on shard {}", id, shard_label(router, shard))?;
            print_record(&record, out)
        }
        (None, shard) => {
            writeln!(out, "Record {} not found (shard {})", id, shard_label(router, shard))?;
            Ok(())
        }
    }
}

fn update_record(
    router: &SqliteRouter,
    id: RecordId,
    update: &RecordUpdate,
    out: &mut dyn Write,
) -> Result<()> {
    let result = router.update(id, update);
    record_operation("update", result.is_ok());
    match result {
        Ok((record, shard)) => {
            writeln!(out, "Record {} updated on shard {}", id, shard_label(router, shard))?;
            print_record(&record, out)
        }
        Err(ShardError::NotFound { .. }) => {
            writeln!(out, "Record {} not found", id)?;
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to update record {}", id)),
    }
}

fn delete(router: &SqliteRouter, id: RecordId, out: &mut dyn Write) -> Result<()> {
    let result = router.delete(id);
    record_operation("delete", result.is_ok());
    if result.with_context(|| format!("Failed to delete record {}", id))? {
        writeln!(out, "Record {} deleted", id)?;
    } else {
        writeln!(out, "Record {} not found", id)?;
    }
    Ok(())
}

fn list(router: &SqliteRouter, shard: Option<usize>, out: &mut dyn Write) -> Result<()> {
    let listing = match shard {
        Some(index) => {
            let records = router
                .list_shard(index)
                .with_context(|| format!("Failed to list shard {}", index))?;
            std::iter::once((index, records)).collect()
        }
        None => router.list_all().context("Failed to list shards")?,
    };
    record_operation("list", true);

    for (index, records) in listing {
        writeln!(out, "Shard {}: {} record(s)", shard_label(router, index), records.len())?;
        for record in &records {
            print_record(record, out)?;
        }
    }
    Ok(())
}

fn add_shard(
    router: &SqliteRouter,
    descriptor: ShardDescriptor,
    bound: Option<RecordId>,
    out: &mut dyn Write,
) -> Result<()> {
    let name = descriptor.name.clone();
    let report = timed_rebalance(|| match bound {
        Some(bound) => router.add_shard_with_bound(descriptor, bound),
        None => router.add_shard(descriptor),
    })
    .with_context(|| format!("Failed to add shard {}", name))?;

    set_shard_count(router.shard_count());
    writeln!(
        out,
        "Shard {} added; topology now has {} shards",
        name,
        router.shard_count()
    )?;
    print_report(&report, out)
}

/// Run a rebalance, recording its duration and outcome.
fn timed_rebalance<Op>(op: Op) -> Result<RebalanceReport>
where
    Op: FnOnce() -> Result<RebalanceReport, ShardError>,
{
    let result = {
        let _timer = HistogramTimer::new(&REBALANCE_DURATION);
        op()
    };

    match &result {
        Ok(report) => record_rebalance("success", report.moved, report.discarded, report.skipped),
        Err(ShardError::PartialRebalanceFailure { .. }) => record_rebalance("partial_failure", 0, 0, 0),
        Err(ShardError::RebalanceAborted { .. }) => record_rebalance("aborted", 0, 0, 0),
        Err(_) => record_rebalance("error", 0, 0, 0),
    }

    if let Err(e) = &result {
        if e.requires_reconciliation() {
            info!("inspect unfinished steps with `shardctl pending --journal <file>`");
        }
    }
    Ok(result?)
}

fn print_report(report: &RebalanceReport, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "Rebalance (topology v{}): scanned {}, moved {}, discarded {}, skipped {} in {}ms",
        report.topology_version,
        report.scanned,
        report.moved,
        report.discarded,
        report.skipped,
        report.elapsed_ms
    )?;
    for (index, size) in &report.shard_sizes {
        writeln!(out, "  shard {}: {} record(s)", index, size)?;
    }
    Ok(())
}

fn pending(path: &std::path::Path, out: &mut dyn Write) -> Result<()> {
    let journal = JsonLinesJournal::new(path);
    let pending = journal
        .pending_migrations()
        .with_context(|| format!("Failed to read journal {}", path.display()))?;

    if pending.is_empty() {
        writeln!(out, "No unfinished migration steps")?;
        return Ok(());
    }

    writeln!(out, "{} unfinished migration step(s):", pending.len())?;
    for entry in &pending {
        writeln!(out, "{}", serde_json::to_string(entry)?)?;
    }
    bail!("{} migration step(s) need reconciliation", pending.len())
}
