// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{Result, anyhow, Context};
use log::{warn, info, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::path::{Path, PathBuf};
use std::io::Write;
use std::sync::Arc;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use stsync::app_config::{self, Config};
use stsync::operations::{CommitRange, OperationsForRepository};
use stsync::{Controller, DirectorySnapshots, TokenKind};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for TokenKind to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTokenKind {
    SubtitleMark,
    GapMark,
    RecordMark,
    ParagraphNumber,
    IalSpan,
}

impl From<CliTokenKind> for TokenKind {
    fn from(cli_kind: CliTokenKind) -> Self {
        match cli_kind {
            CliTokenKind::SubtitleMark => TokenKind::SubtitleMark,
            CliTokenKind::GapMark => TokenKind::GapMark,
            CliTokenKind::RecordMark => TokenKind::RecordMark,
            CliTokenKind::ParagraphNumber => TokenKind::ParagraphNumber,
            CliTokenKind::IalSpan => TokenKind::IalSpan,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract subtitle operations between two snapshots of the primary documents
    Extract(ExtractArgs),

    /// Apply stored subtitle operations to foreign documents
    Transfer(TransferArgs),

    /// Generate fresh persistent subtitle ids and record them in the inventory
    GenerateStids {
        /// Number of ids to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Carry tokens from an old document over to its edited text
    Replay {
        /// Document carrying the tokens
        #[arg(long)]
        tokens: PathBuf,
        /// Document carrying the edited text
        #[arg(long)]
        text: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Token kinds to replay (all if omitted)
        #[arg(short, long, value_enum, value_delimiter = ',')]
        kinds: Vec<CliTokenKind>,
    },

    /// Replace tokens of a document with those of a text-equivalent document
    Replace {
        /// Document carrying the tokens to transplant
        #[arg(long)]
        source: PathBuf,
        /// Document receiving them
        #[arg(long)]
        target: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Token kinds to replace
        #[arg(short, long, value_enum, value_delimiter = ',', required = true)]
        kinds: Vec<CliTokenKind>,
    },

    /// Remove tokens of some kinds from a document
    Strip {
        /// Input document
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Token kinds to remove
        #[arg(short, long, value_enum, value_delimiter = ',', required = true)]
        kinds: Vec<CliTokenKind>,
    },

    /// Generate shell completions for stsync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Primary snapshot at the from commit
    #[arg(long, value_name = "DIR")]
    from: PathBuf,

    /// Primary snapshot at the to commit
    #[arg(long, value_name = "DIR")]
    to: PathBuf,

    /// From commit id
    #[arg(long)]
    from_commit: String,

    /// To commit id
    #[arg(long)]
    to_commit: String,

    /// Repository name written into the operations file
    #[arg(long, default_value = "primary")]
    repository: String,
}

#[derive(Parser, Debug)]
struct TransferArgs {
    /// Primary snapshot at the from commit of the operations
    #[arg(long, value_name = "DIR")]
    primary: PathBuf,

    /// Foreign documents, rewritten in place
    #[arg(long, value_name = "DIR")]
    foreign: PathBuf,

    /// Operations file (the newest one in the operations directory if omitted)
    #[arg(long, value_name = "FILE")]
    operations: Option<PathBuf>,
}

/// stsync - subtitle operation lifecycle for content AT documents
///
/// Tracks subtitle boundary changes in primary documents and replays them
/// onto foreign documents.
#[derive(Parser, Debug)]
#[command(name = "stsync")]
#[command(version)]
#[command(about = "Subtitle operation extraction and transfer for content AT documents")]
#[command(long_about = "stsync extracts subtitle operations from two snapshots of the primary documents and transfers them to foreign documents.

EXAMPLES:
    stsync extract --from old/ --to new/ --from-commit 1a2b --to-commit 3c4d
    stsync transfer --primary old/ --foreign foreign/
    stsync generate-stids -n 10
    stsync strip chapter.at -o plain.at -k subtitle-mark,gap-mark
    stsync completions bash > stsync.bash

CONFIGURATION:
    Configuration is stored in stsync.json by default. You can specify a
    different config file with --config-path. If the config file doesn't exist,
    a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "stsync.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with trace level; the effective level is set below
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "stsync", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config_path, cli.log_level.clone())?;
    log::set_max_level(config.log_level.to_level_filter());
    let controller = Controller::with_config(config)?;

    match cli.command {
        Commands::Extract(args) => run_extract(&controller, args).await,
        Commands::Transfer(args) => run_transfer(&controller, args).await,
        Commands::GenerateStids { count } => {
            for id in controller.generate_stids(count)? {
                println!("{}", id);
            }
            Ok(())
        }
        Commands::Replay { tokens, text, output, kinds } => {
            let kinds = if kinds.is_empty() {
                TokenKind::ALL.to_vec()
            } else {
                to_token_kinds(&kinds)
            };
            controller.replay_document(&tokens, &text, &kinds, &output)
        }
        Commands::Replace { source, target, output, kinds } => {
            controller.replace_document_tokens(&source, &target, &to_token_kinds(&kinds), &output)
        }
        Commands::Strip { input, output, kinds } => {
            controller.strip_document(&input, &to_token_kinds(&kinds), &output)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

// Load the config file or write a default one, then apply CLI overrides
fn load_config(config_path: &Path, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        warn!("Config file not found at {:?}, creating default config.", config_path);
        let config = Config::default();
        config
            .save(config_path)
            .context("Failed to write default config")?;
        config
    };

    if let Some(log_level) = log_level {
        config.log_level = log_level.into();
    }

    config.validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

fn to_token_kinds(kinds: &[CliTokenKind]) -> Vec<TokenKind> {
    kinds.iter().map(|k| (*k).into()).collect()
}

async fn run_extract(controller: &Controller, args: ExtractArgs) -> Result<()> {
    if !args.from.is_dir() || !args.to.is_dir() {
        return Err(anyhow!("Snapshot directories do not exist: {:?}, {:?}", args.from, args.to));
    }
    let source = Arc::new(DirectorySnapshots::new(
        args.repository,
        args.from,
        args.to,
        CommitRange::new(args.from_commit, args.to_commit),
    ));

    let run = controller.extract_operations(source).await?;
    run.report.log_summary();
    if let Some(path) = &run.saved_to {
        info!("Operations written to {:?}", path);
    }
    if run.report.has_failures() {
        return Err(anyhow!("{} documents failed", run.report.failures().len()));
    }
    Ok(())
}

async fn run_transfer(controller: &Controller, args: TransferArgs) -> Result<()> {
    let store = controller.operations_store();
    let operations: OperationsForRepository = match &args.operations {
        Some(path) => store.load(path)?,
        None => store
            .latest()?
            .ok_or_else(|| anyhow!("No operations files in {:?}", store.dir()))?,
    };

    // Only the from side of the primary snapshot is read during transfer
    let primary = Arc::new(DirectorySnapshots::new(
        operations.repository.clone(),
        &args.primary,
        &args.primary,
        operations.commits(),
    ));

    let report = controller
        .transfer_operations(&operations, primary, &args.foreign)
        .await?;
    report.log_summary();
    if report.has_failures() {
        return Err(anyhow!("{} documents failed", report.failures().len()));
    }
    Ok(())
}
