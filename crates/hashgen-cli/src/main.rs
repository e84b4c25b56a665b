//! hashgen CLI
//!
//! Keeps a `<digest>   <name>` manifest in step with the files of a directory.
//! New files are hashed by default; `-a` rehashes everything and `-c` drops
//! entries whose files are gone.

mod config;
mod progress;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use hashgen_files::{DigestAlgorithm, Recompute, SyncMode, SyncReport, Synchronizer, WorkerPool};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use config::Config;
use progress::ConsoleProgress;

/// hashgen - directory integrity manifests
#[derive(Parser, Debug)]
#[command(name = "hashgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Regenerate all hashes
    #[arg(short = 'a')]
    all: bool,

    /// Clear hash orphans
    #[arg(short = 'c')]
    clear: bool,

    /// Quiet mode, no progress output
    #[arg(short = 'q')]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<String>,

    /// Block size in bytes
    #[arg(long)]
    block_size: Option<usize>,

    /// Number of hashing workers (0 = auto)
    #[arg(long)]
    workers: Option<usize>,

    /// Digest algorithm (sha1 or blake3)
    #[arg(long)]
    algorithm: Option<DigestAlgorithm>,

    /// Target directory
    source: String,
}

impl Cli {
    fn mode(&self) -> SyncMode {
        SyncMode {
            clear_orphans: self.clear,
            recompute: if self.all {
                Recompute::All
            } else {
                Recompute::New
            },
        }
    }

    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(block_size) = self.block_size {
            config.hashing.block_size = block_size;
        }
        if let Some(workers) = self.workers {
            config.hashing.workers = workers;
        }
        if let Some(algorithm) = self.algorithm {
            config.hashing.algorithm = algorithm;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if e.kind() == clap::error::ErrorKind::DisplayVersion {
                let _ = e.print();
            } else {
                let _ = Cli::command().print_help();
                println!();
            }
            std::process::exit(0);
        }
    };

    init_logging(&cli);

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let source = normalize_source(&cli.source);
    let mut progress = ConsoleProgress::stdout(cli.quiet);
    let report = run(&source, cli.mode(), &config, &mut progress)?;

    tracing::debug!(
        hashed = report.hashed.len(),
        orphans_removed = report.orphans_removed.len(),
        entries = report.entries,
        "Done"
    );

    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Default log filter. `-q` only silences progress output; warnings such as
/// a failed manifest rewrite are still reported.
fn log_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

/// Load the configuration file named on the command line, or the default one
fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(&expand_tilde(path)),
        None => Config::load_or_default(),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(rest),
        None => PathBuf::from(path),
    }
}

/// Strip trailing path separators; a bare root stays a root
fn normalize_source(raw: &str) -> PathBuf {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && !raw.is_empty() {
        PathBuf::from(&raw[..1])
    } else {
        PathBuf::from(trimmed)
    }
}

/// Synchronize `source` according to `mode`.
///
/// The worker pool is only started once hashing is needed, and is always
/// drained before returning, including when hashing fails.
fn run(
    source: &Path,
    mode: SyncMode,
    config: &Config,
    progress: &mut dyn hashgen_files::ProgressSink,
) -> anyhow::Result<SyncReport> {
    let sync = Synchronizer::open(source, config.sync_config())
        .with_context(|| format!("Failed to scan {}", source.display()))?;

    let pool_config = config.pool_config();
    let (report, pool_report) = sync
        .run_with(mode, || WorkerPool::start(&pool_config), progress)
        .with_context(|| format!("Failed to synchronize {}", source.display()))?;

    if let Some(pool_report) = pool_report {
        tracing::debug!(
            workers = pool_report.workers.len(),
            blocks = pool_report.total_blocks(),
            "Workers stopped"
        );
    }
    if !report.manifest_written {
        tracing::warn!(dir = %source.display(), "Manifest could not be written");
    }

    Ok(report)
}
