//! sflheap command-line runner
//!
//! Feeds heap commands from a script file or stdin into one heap session.
//! Protocol output goes to stdout, logs to stderr (and optionally to daily
//! rolling files).
//!
//! # Examples
//!
//! ```bash
//! # Run a script
//! sflheap run tests/session.in
//!
//! # Interactive, JSON dumps, keep going after a segmentation fault
//! sflheap run --format json --keep-going
//!
//! # Debug logging to ./logs
//! sflheap --log-level debug --log-dir logs run script.in
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sflheap::{OutputFormat, Session, SessionConfig};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// sflheap - Segregated free list heap simulator
#[derive(Parser, Debug)]
#[command(name = "sflheap")]
#[command(version = sflheap::VERSION)]
#[command(about = "Segregated free list heap simulator", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SFLHEAP_CONFIG")]
    config: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, env = "SFLHEAP_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run heap commands from a script or stdin
    Run(RunArgs),

    /// Show version
    Version,
}

/// Session arguments
#[derive(Args, Debug)]
struct RunArgs {
    /// Command script (reads stdin when omitted)
    script: Option<PathBuf>,

    /// Dump format (text, json)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Keep running after a segmentation fault
    #[arg(long)]
    keep_going: bool,

    /// Do not dump the heap after a segmentation fault
    #[arg(long)]
    no_fault_dump: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }

    setup_logging(&config, cli.no_color)?;

    match cli.command {
        Commands::Run(args) => run_command(config, args),
        Commands::Version => {
            println!("sflheap {}", sflheap::VERSION);
            Ok(())
        }
    }
}

/// Setup logging to stderr, plus rolling files when a log directory is set
fn setup_logging(config: &SessionConfig, no_color: bool) -> anyhow::Result<()> {
    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "sflheap.log");
            Some(fmt::layer().with_writer(file_appender).with_ansi(false))
        }
        None => None,
    };

    let log_level = config
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(!no_color),
        )
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Run command - drive one session to completion
fn run_command(mut config: SessionConfig, args: RunArgs) -> anyhow::Result<()> {
    if let Some(format) = args.format {
        config.output_format = format;
    }
    if args.keep_going {
        config.terminate_on_fault = false;
    }
    if args.no_fault_dump {
        config.dump_on_fault = false;
    }

    info!(
        format = %config.output_format,
        terminate_on_fault = config.terminate_on_fault,
        "Starting heap session"
    );

    let mut session = Session::new(config);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match args.script {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            session.run(BufReader::new(file), &mut out)?;
        }
        None => session.run(io::stdin().lock(), &mut out)?,
    }

    Ok(())
}
