//! shardctl: command line front end for the shard router.
//!
//! The topology is process-local configuration: every invocation rebuilds it
//! from `--shards`, `--strategy` and `--bounds`. After `add-shard`, pass the
//! grown shard count (and range bound) on later invocations.

mod commands;
mod demo;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shard_router::{MigrationOrder, RecordId};
use shard_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

/// shardctl: route records across SQLite shards and grow the topology
#[derive(Parser, Debug)]
#[command(name = "shardctl")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the shard database files
    #[arg(long, env = "SHARD_DATA_DIR", default_value = "./shards")]
    pub data_dir: PathBuf,

    /// Number of shards in the current topology
    #[arg(long, env = "SHARD_COUNT", default_value_t = 4)]
    pub shards: usize,

    /// Routing strategy
    #[arg(long, value_enum, default_value_t = Strategy::Hash)]
    pub strategy: Strategy,

    /// Inclusive range upper bounds, comma separated (default 250,500,...)
    #[arg(long, value_delimiter = ',')]
    pub bounds: Vec<RecordId>,

    /// Order of the two halves of a record move
    #[arg(long, default_value = "insert-then-delete")]
    pub order: MigrationOrder,

    /// Append migration steps to this JSON-lines journal
    #[arg(long, env = "SHARD_JOURNAL")]
    pub journal: Option<PathBuf>,

    /// SQLite busy timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub busy_timeout_ms: u64,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Routing strategy flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Digest of the id modulo shard count
    Hash,
    /// Fixed id ranges
    Range,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a record (reports the owning shard if the id already exists)
    Create {
        /// Record id
        #[arg(long)]
        id: RecordId,
        /// Name
        #[arg(long)]
        name: Option<String>,
        /// Email
        #[arg(long)]
        email: Option<String>,
    },
    /// Show a record
    Get {
        /// Record id
        id: RecordId,
    },
    /// Change the given fields of a record
    Update {
        /// Record id
        id: RecordId,
        /// New name
        #[arg(long, conflicts_with = "clear_name")]
        name: Option<String>,
        /// New email
        #[arg(long, conflicts_with = "clear_email")]
        email: Option<String>,
        /// Set name to NULL
        #[arg(long)]
        clear_name: bool,
        /// Set email to NULL
        #[arg(long)]
        clear_email: bool,
    },
    /// Remove a record
    Delete {
        /// Record id
        id: RecordId,
    },
    /// List records, grouped by shard
    List {
        /// Only this shard (0-based index)
        #[arg(long)]
        shard: Option<usize>,
    },
    /// Register a new shard and rebalance onto it
    AddShard {
        /// Shard name (default shard<N+1>)
        #[arg(long)]
        name: Option<String>,
        /// Database file, relative to the data dir (default shard_<N>.db)
        #[arg(long)]
        location: Option<String>,
        /// Range upper bound for the previous catch-all shard
        #[arg(long)]
        bound: Option<RecordId>,
    },
    /// Re-run reconciliation without adding a shard
    Rebalance,
    /// Run the reference scenario against scratch shards
    Demo,
    /// List migration steps that never completed
    Pending {
        /// Journal file to inspect
        #[arg(long = "journal")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = commands::run(&args, &mut out);

    if args.metrics {
        let text = encode_metrics().context("Failed to encode metrics")?;
        writeln!(out, "{}", text)?;
    }

    outcome
}
