//! bizsync-import - one-shot import of a company CSV file
//!
//! Runs the same pipeline as the queue worker, under the same run lock, and
//! prints the resulting statistics as JSON.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use bizsync_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use bizsync_common::types::Strategy;
use clap::Parser;
use tracing::{error, info};

use bizsync_server::{
    config::DatabaseConfig,
    db,
    import::{CompanyStore, Importer, MemoryCompanyStore, PgCompanyStore},
    queue::{QueueConfig, RunLock},
};

/// Import companies from a headerless CSV file
#[derive(Parser, Debug)]
#[command(name = "bizsync-import")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The CSV file to import
    #[arg(short, long)]
    file: PathBuf,

    /// Only update existing companies; unmatched rows are discarded
    #[arg(short, long)]
    merge: bool,

    /// Reconcile against an empty in-memory store instead of the database
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

impl Cli {
    fn strategy(&self) -> Strategy {
        if self.merge {
            Strategy::Merge
        } else {
            Strategy::Import
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("bizsync-import".to_string())
        .build();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The import works without logging
    let _log_guard = init_logging(&log_config).ok();

    if let Err(e) = run(&cli).await {
        error!(error = %e, "Import failed");
        eprintln!("Error: {:#}", e);
        eprintln!("Task exited with errors");
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let strategy = cli.strategy();

    if !tokio::fs::try_exists(&cli.file).await.unwrap_or(false) {
        anyhow::bail!("CSV file {} does not exist", cli.file.display());
    }

    let store: Arc<dyn CompanyStore> = if cli.dry_run {
        info!("Dry run: reconciling against an empty in-memory store");
        Arc::new(MemoryCompanyStore::new())
    } else {
        let mut database = DatabaseConfig::from_env();
        if let Some(url) = &cli.database_url {
            database.url = url.clone();
        }
        let pool = db::create_pool(&database)
            .await
            .context("Failed to connect to the database")?;
        Arc::new(PgCompanyStore::new(pool))
    };

    // The worker and this command never import at the same time
    let guard = if cli.dry_run {
        None
    } else {
        let queue = QueueConfig::from_env()?;
        tokio::fs::create_dir_all(&queue.root).await?;
        let lock = RunLock::new(queue.lock_path(), queue.stale_lock_after());
        Some(lock.acquire().context("Another import is running")?)
    };

    let stats = Importer::new(store)
        .process_file(&cli.file, strategy)
        .await
        .with_context(|| format!("Failed to import {}", cli.file.display()))?;

    if let Some(guard) = guard {
        guard.release()?;
    }

    info!(
        file = %cli.file.display(),
        %strategy,
        created = stats.created,
        updated = stats.updated,
        "Import finished"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
