//! omnifile - Incremental file inventory for local and remote trees.
//!
//! Usage:
//!   omnifile                     Run the configured default action
//!   omnifile scan [--truncate]   Scan the local root (and remotes if enabled)
//!   omnifile remote [--truncate] Scan enabled remote connections only
//!   omnifile status              Show what the store holds
//!   omnifile dedupe              Remove duplicate records from the store
//!   omnifile --help              Show help

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

use omnifile_core::AppConfig;
use omnifile_index::{
    HostIdentity, Indexer, RunReport, ScanMode, ScanOrchestrator, SqliteStore, StartMode,
};
use omnifile_scan::ScanProgress;

#[derive(Parser)]
#[command(
    name = "omnifile",
    version,
    about = "Incremental file inventory for local and remote trees",
    long_about = "omnifile walks the local root and configured SFTP connections and \
                  records every file and directory once in a SQLite store.\n\n\
                  Without a subcommand the `default_action` from the configuration \
                  file is run."
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/omnifile/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format of the run report
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the local root, then enabled connections if remote scanning is on
    Scan {
        /// Delete every stored record before scanning
        #[arg(long)]
        truncate: bool,
    },

    /// Scan enabled remote connections only
    Remote {
        /// Delete every stored record before scanning
        #[arg(long)]
        truncate: bool,
    },

    /// Show record count, most recent record and protocol statistics
    Status,

    /// Remove records without a path and repeated paths
    Dedupe,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    setup_logging(&config.log_level);

    let (mode, start) = match cli.command {
        Some(Command::Scan { truncate }) => (ScanMode::Full, start_mode(truncate)),
        Some(Command::Remote { truncate }) => (ScanMode::RemoteOnly, start_mode(truncate)),
        Some(Command::Status) => (ScanMode::StatusOnly, StartMode::Resume),
        Some(Command::Dedupe) => return run_dedupe(&config),
        None => match config.default_action.parse::<ScanMode>() {
            Ok(mode) => (mode, StartMode::Resume),
            Err(_) => bail!(
                "Unknown default_action {:?}, expected scan, status or remote",
                config.default_action
            ),
        },
    };

    let report = run(config, mode, start)?;
    match cli.format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn start_mode(truncate: bool) -> StartMode {
    if truncate {
        StartMode::Truncate
    } else {
        StartMode::Resume
    }
}

fn open_indexer(config: &AppConfig) -> Result<Arc<Indexer>> {
    let store = SqliteStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store at {}", config.store_path.display()))?;
    Ok(Arc::new(Indexer::new(Arc::new(store), HostIdentity::detect())))
}

/// Run one pass, logging walk progress while it goes.
fn run(config: AppConfig, mode: ScanMode, start: StartMode) -> Result<RunReport> {
    let indexer = open_indexer(&config)?;
    let orchestrator = ScanOrchestrator::new(config, indexer).context("Invalid scan configuration")?;

    let mut progress_rx = orchestrator.walker().subscribe();
    let progress = thread::spawn(move || {
        loop {
            match progress_rx.blocking_recv() {
                Ok(progress) => log_progress(&progress),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = orchestrator.run(mode, start);
    drop(orchestrator);
    let _ = progress.join();

    result.context("Run aborted")
}

fn log_progress(progress: &ScanProgress) {
    info!(
        root = %progress.root,
        files = progress.files_scanned,
        directories = progress.dirs_scanned,
        size = %format_size(progress.bytes_scanned),
        rate = format_args!("{:.0}/s", progress.records_per_second()),
        "Scan progress"
    );
}

fn run_dedupe(config: &AppConfig) -> Result<()> {
    let indexer = open_indexer(config)?;
    indexer.self_check().context("Store is not reachable")?;

    let removed = indexer.remove_duplicates().context("Duplicate cleanup failed")?;
    indexer
        .ensure_unique_index()
        .context("Unique path index still cannot be created")?;

    println!("Removed {removed} duplicate record(s)");
    Ok(())
}

/// Print the run report.
fn print_report(report: &RunReport) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" omnifile {} ({})", report.mode, report.start);
    println!(" {} record(s) stored before the run", report.records_before);
    if report.truncated > 0 {
        println!(" {} record(s) truncated", report.truncated);
    }
    if let Some(record) = &report.most_recent {
        let read_at = record
            .read_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(" Most recent: {} ({})", record.path, read_at);
    }
    println!("{}", "─".repeat(60));

    if !report.targets.is_empty() {
        println!();
        println!(" Targets:");
        for target in &report.targets {
            match &target.error {
                None => println!(
                    "   {:<44} {:>7} new {:>7} known {:>5} errors  {:.2}s",
                    truncate(&target.label, 44),
                    target.inserted,
                    target.skipped,
                    target.node_errors as u64 + target.failed,
                    target.duration_ms as f64 / 1000.0
                ),
                Some(error) => println!("   {:<44} FAILED: {}", truncate(&target.label, 44), error),
            }
        }
    }

    println!();
    println!(" Protocol statistics:");
    if report.stats.is_empty() {
        println!("   (store is empty)");
    }
    for (protocol, stats) in &report.stats {
        println!(
            "   {:<8} {:>9} files {:>9} dirs {:>12}",
            protocol,
            stats.files,
            stats.directories,
            format_size(stats.total_size)
        );
    }

    println!();
    println!(
        " {} inserted, {} skipped, {} failed in {:.2}s",
        report.summary.inserted,
        report.summary.skipped,
        report.summary.failed,
        report.duration_ms as f64 / 1000.0
    );
    let failed = report.failed_targets().count();
    if failed > 0 {
        println!(" {failed} target(s) could not be scanned");
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
