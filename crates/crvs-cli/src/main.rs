//! crvs - operator CLI for the civil-registration declaration ledger.
//!
//! Drives the full request pipeline against an on-disk ledger, with the
//! schema provider, location tree and token table taken from the
//! configuration file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crvs_core::ActionError;
use crvs_core::config::CoreConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod wiring;

/// crvs - civil-registration declaration ledger
#[derive(Parser, Debug)]
#[command(name = "crvs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "crvs.toml", env = "CRVS_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new event
    Create(commands::action::CreateArgs),

    /// Record an action against an event
    Act(commands::action::ActArgs),

    /// Print an event's full document
    Show {
        /// Event id
        event: crvs_core::EventId,
    },

    /// Print an event's current state
    State(commands::action::StateArgs),

    /// Audit an event's action hash chain
    Verify {
        /// Event id
        event: crvs_core::EventId,
    },

    /// List events with their status
    List {
        /// Number of events to skip
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Maximum number of events to print
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Some(log_file) = &cli.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("failed to open log file {}", log_file.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        // stdout carries command output
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<CoreConfig> {
    if path.exists() {
        CoreConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))
    } else {
        tracing::warn!(path = %path.display(), "configuration file not found, using defaults");
        Ok(CoreConfig::default())
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let json = cli.json;

    runtime.block_on(async {
        match &cli.command {
            Commands::Create(args) => {
                let router = wiring::router(&config)?;
                commands::action::create(&router, args, json).await
            },
            Commands::Act(args) => {
                let router = wiring::router(&config)?;
                commands::action::act(&router, args, json).await
            },
            Commands::State(args) => {
                let router = wiring::router(&config)?;
                commands::action::state(&router, args, json).await
            },
            Commands::Show { event } => {
                let ledger = wiring::ledger(&config)?;
                commands::inspect::show(&ledger, *event).await
            },
            Commands::Verify { event } => {
                let ledger = wiring::ledger(&config)?;
                commands::inspect::verify(&ledger, *event, json).await
            },
            Commands::List { offset, limit } => {
                let ledger = wiring::ledger(&config)?;
                commands::inspect::list(&ledger, *offset, *limit, json).await
            },
        }
    })
}

fn report(err: &anyhow::Error, json: bool) {
    let code = err
        .downcast_ref::<ActionError>()
        .map_or("ERROR", ActionError::code);
    if json {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": format!("{err:#}"),
            }
        });
        println!("{body}");
    } else {
        eprintln!("error[{code}]: {err:#}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, cli.json);
            ExitCode::FAILURE
        },
    }
}
