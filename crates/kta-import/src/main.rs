//! KTA Import - load a member export into PostgreSQL

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use kta_common::logging::{init_logging, LogConfig, LogLevel};
use kta_import::config::DatabaseConfig;
use kta_import::{ImportConfig, ImportStats, Importer, MemberSink, MemorySink, PgMemberSink};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kta-import")]
#[command(author, version, about = "Import KTA member records from a CSV export")]
struct Cli {
    /// Semicolon-separated export with a header row
    file: PathBuf,

    /// Records per bulk insert [env: IMPORT_BATCH_SIZE, default: 300]
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Schema of the member table [env: DB_SCHEMA, default: public]
    #[arg(long)]
    schema: Option<String>,

    /// Member table [env: DB_TABLE, default: keanggotaan]
    #[arg(long)]
    table: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Parse and count without writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Write the failed rows as JSON to this file
    #[arg(long)]
    failures_out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .log_file_prefix("kta-import")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    match run(&cli).await {
        Ok(stats) => {
            println!("=== IMPORT COMPLETE ===");
            println!("{}", stats);

            if stats.cancelled {
                process::exit(130);
            }
        },
        Err(e) => {
            error!(error = %e, "Import failed");
            eprintln!("Error: {:#}", e);
            process::exit(1);
        },
    }
}

async fn run(cli: &Cli) -> Result<ImportStats> {
    let mut config = ImportConfig::from_env().context("Invalid import configuration")?;

    if let Some(batch_size) = cli.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(ref schema) = cli.schema {
        config = config.with_schema(schema.clone());
    }
    if let Some(ref table) = cli.table {
        config = config.with_table(table.clone());
    }

    config.validate().context("Invalid import configuration")?;

    let stats = if cli.dry_run {
        info!("Dry run, nothing will be written");
        import(cli, MemorySink::new(), config).await?
    } else {
        let mut db = DatabaseConfig::from_env();
        if let Some(ref url) = cli.database_url {
            db.url = url.clone();
        }
        db.validate().context("Invalid database configuration")?;

        let pool = db.connect().await.context("Failed to connect to database")?;
        let sink = PgMemberSink::new(pool.clone(), &config)?;
        let stats = import(cli, sink, config).await;
        pool.close().await;
        stats?
    };

    if let Some(ref path) = cli.failures_out {
        write_failures(path, &stats).await?;
    }

    Ok(stats)
}

async fn import<S: MemberSink>(cli: &Cli, sink: S, config: ImportConfig) -> Result<ImportStats> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            on_signal.cancel();
        }
    });

    let progress = (!cli.verbose && std::io::stderr().is_terminal()).then(create_spinner);

    let mut importer = Importer::new(sink, config)?.with_cancellation(cancel);
    if let Some(ref pb) = progress {
        let pb = pb.clone();
        importer = importer.on_flush(move |_, stats| {
            pb.set_message(format!(
                "{} rows read: {} inserted, {} skipped, {} failed",
                stats.rows_read, stats.inserted, stats.skipped, stats.failed
            ));
        });
    }

    let result = importer
        .import_file(&cli.file)
        .await
        .with_context(|| format!("Failed to import {}", cli.file.display()));

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    result
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Importing...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn write_failures(path: &Path, stats: &ImportStats) -> Result<()> {
    let report = serde_json::json!({
        "failed": stats.failed,
        "failures_truncated": stats.failures_truncated,
        "failures": stats.failures,
    });

    let body = serde_json::to_vec_pretty(&report)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write failure report to {}", path.display()))?;

    info!(path = %path.display(), failures = stats.failures.len(), "Failure report written");
    Ok(())
}
