//! BRT Ingest - GPS feed ingestion tool

use anyhow::{Context, Result};
use brt_common::logging::{init_logging, LogConfig, LogLevel};
use brt_ingest::{
    config::Config,
    scheduler::{shutdown_signal, Scheduler},
    Database, Fetcher, PgWarehouse, Pipeline, RunOutcome, SnapshotStore,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "brt-ingest")]
#[command(author, version, about = "BRT GPS feed ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision, fetch, persist, reload and insert once
    Run,

    /// Run the pipeline every BRT_INTERVAL_SECS until interrupted
    Schedule {
        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<u64>,
    },

    /// Create the schema and table if absent
    Provision,

    /// Show the row count and the most recent rows
    Inspect {
        /// Number of rows to show
        #[arg(short, long, default_value_t = 5)]
        limit: u32,
    },

    /// Load an existing snapshot file
    Replay {
        /// Snapshot file (.json or .csv)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::builder()
        .log_file_prefix("brt-ingest")
        .filter_directives("sqlx=warn,hyper=info,reqwest=info")
        .build()
        .merge_env()?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _guard = init_logging(&log_config)?;

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        database = %config.database.redacted_url(),
        table = %config.database.table_ref(),
        snapshot_dir = %config.snapshot.dir.display(),
        format = %config.snapshot.format,
        "Configuration loaded"
    );

    let db = Database::connect_lazy(&config.database);
    let pipeline = Pipeline::new(
        PgWarehouse::new(db.clone(), config.database.table_ref()),
        Fetcher::new(&config.feed).context("Failed to build HTTP client")?,
        SnapshotStore::from_config(&config.snapshot),
    );

    match cli.command {
        Command::Run => {
            let outcome = pipeline.run().await?;
            report(&outcome);
        },
        Command::Schedule { max_runs } => {
            let summary = Scheduler::new(config.schedule.interval())
                .with_max_runs(max_runs)
                .run(|| pipeline.run(), shutdown_signal())
                .await;
            info!(runs = summary.runs, failures = summary.failures, "Schedule finished");
        },
        Command::Provision => {
            pipeline.provision().await?;
            info!(table = %config.database.table_ref(), "Provisioning complete");
        },
        Command::Inspect { limit } => {
            let table = config.database.table_ref();
            let count = db.count_rows(&table).await?;
            println!("{}: {} rows", table, count);
            for row in db.latest_rows(&table, i64::from(limit)).await? {
                println!(
                    "  #{:<8} {}  {} vehicles",
                    row.id,
                    row.extracted_at.to_rfc3339(),
                    row.vehicle_count()
                );
            }
        },
        Command::Replay { path } => {
            let outcome = pipeline.replay(&path).await?;
            report(&outcome);
        },
    }

    Ok(())
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Loaded { run_id, path, row } => info!(
            %run_id,
            path = %path.display(),
            row_id = row.id,
            vehicles = row.vehicle_count(),
            "Snapshot loaded"
        ),
        RunOutcome::Empty { run_id, path } => info!(
            %run_id,
            path = %path.display(),
            "Snapshot empty, nothing inserted"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_limit_must_be_non_negative() {
        assert!(Cli::try_parse_from(["brt-ingest", "inspect", "--limit", "-3"]).is_err());

        let cli = Cli::try_parse_from(["brt-ingest", "inspect", "--limit", "12"]).unwrap();
        assert!(matches!(cli.command, Command::Inspect { limit: 12 }));
    }

    #[test]
    fn test_replay_takes_a_path() {
        let cli = Cli::try_parse_from(["brt-ingest", "-v", "replay", "data/gps_brt_x.json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Replay { ref path } if path.ends_with("gps_brt_x.json")));
    }
}
