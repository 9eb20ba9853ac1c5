//! `contactflow` binary: one pipeline stage per invocation.
//!
//! Designed to be driven by a periodic trigger (cron or similar); each
//! stage takes its own single-instance lock, runs one batch, and exits.
//! Fatal errors exit non-zero with a structured log line carrying the
//! cause; partial progress already committed to the store stays committed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use contactflow::config::Config;
use contactflow::db::ContactDb;
use contactflow::error::PipelineError;
use contactflow::ingest::{run_ingestion, Source, SqliteSource};
use contactflow::lock::StageLock;
use contactflow::publish::run_publication;
use contactflow::verify::run_verification;

#[derive(Debug, Parser)]
#[command(name = "contactflow")]
#[command(version, about = "Incremental contact reconciliation pipeline", long_about = None)]
struct Cli {
    /// Config file path (default: ~/.contactflow/config.json).
    #[arg(long, env = "CONTACTFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge rows from every configured source into the store.
    Import,
    /// Resolve pending emails to a verification status.
    Verify,
    /// Publish verified records to the downstream CRM.
    Export,
    /// Print store counters. Runs without a stage lock.
    Stats,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), PipelineError> {
    let config = Config::load(cli.config.as_deref())?;
    let db = ContactDb::open(&config.db_path()?)?;

    match cli.command {
        Command::Import => {
            let _lock = StageLock::acquire(&config.lock_dir()?, "import")?;
            let sources: Vec<Box<dyn Source>> = config
                .sources
                .iter()
                .map(|s| Box::new(SqliteSource::from_config(s)) as Box<dyn Source>)
                .collect();
            let summary = run_ingestion(&db, &sources)?;
            log::info!(
                "import done: {} sources ok, {} failed; {} new, {} updated, {} unchanged",
                summary.sources_ok,
                summary.sources_failed,
                summary.inserted,
                summary.updated,
                summary.unchanged
            );
        }
        Command::Verify => {
            let _lock = StageLock::acquire(&config.lock_dir()?, "verify")?;
            let summary = run_verification(&db, &config.verify)?;
            log::info!(
                "verify done: {} local, {} remote, {} unknown",
                summary.resolved_locally,
                summary.resolved_remotely,
                summary.resolved_unknown
            );
        }
        Command::Export => {
            let _lock = StageLock::acquire(&config.lock_dir()?, "export")?;
            let summary = run_publication(&db, &config.publish)?;
            log::info!(
                "export done: {} created, {} updated, {} failed",
                summary.created,
                summary.updated,
                summary.failed
            );
        }
        Command::Stats => {
            let stats = db.statistics()?;
            println!("contacts:             {}", stats.total);
            println!("pending verification: {}", stats.pending_verification);
            for (status, count) in &stats.by_status {
                println!("  {:<19} {}", format!("{}:", status), count);
            }
            println!("exported:             {}", stats.exported);
            println!("eligible for export:  {}", stats.eligible_for_export);
        }
    }

    Ok(())
}
