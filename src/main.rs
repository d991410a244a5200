//! Run Store - Binary Entry Point
//!
//! Read-only inspection of a run store directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use run_store::utils::format_timestamp;
use run_store::{EventCollection, SortKey, StoreConfig, StoreResult};

#[derive(Debug, Parser)]
#[command(name = "run-store", version, about = "Inspect a run store directory")]
struct Cli {
    /// Base directory (defaults to $RUN_STORE_DIR, then ./data)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List runs with their descriptor counts
    Runs,
    /// List descriptors, optionally for one run
    Descriptors {
        #[arg(long)]
        run: Option<String>,
    },
    /// Print the events of a descriptor as JSON lines
    Events {
        descriptor: String,
        /// Sort key, e.g. `time`, `seq_num:desc`, `data.x`
        #[arg(long = "sort")]
        sort: Vec<String>,
    },
}

fn main() -> StoreResult<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.dir {
        Some(dir) => StoreConfig::new(dir),
        None => StoreConfig::from_env(),
    };
    let mut events = EventCollection::open(&config)?;

    match cli.command {
        Command::Runs => {
            for run in events.run_uids() {
                println!("{}\t{}", run, events.descriptors_of_run(&run).len());
            }
        }
        Command::Descriptors { run } => {
            let descriptors = match run {
                Some(run) => events.descriptors_of_run(&run),
                None => events.descriptor_uids(),
            };
            for descriptor in descriptors {
                let run = events.run_of_descriptor(&descriptor)?.to_string();
                let count = events.count(&descriptor)?;
                println!("{}\t{}\t{}", descriptor, run, count);
            }
        }
        Command::Events { descriptor, sort } => {
            let sort = sort
                .iter()
                .map(|s| SortKey::parse(s))
                .collect::<StoreResult<Vec<_>>>()?;
            let sort = if sort.is_empty() { None } else { Some(sort.as_slice()) };

            for event in events.find(&json!({ "descriptor": descriptor }), sort)? {
                let event = event?;
                let mut line = serde_json::to_value(&event)?;
                line["time_iso"] = json!(format_timestamp(event.time));
                println!("{}", line);
            }
        }
    }

    Ok(())
}
