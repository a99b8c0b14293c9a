//! AMX adapter CLI.
//!
//! This tool provides commands for:
//! - Validating adapter configuration files
//! - Building AMX bid requests and interpreting responses from JSON files
//! - Listing user syncs from response bodies
//! - Resolving user IDs from a `Cookie` header
//! - Firing (or previewing) lifecycle tracking pixels

use std::path::PathBuf;
use std::sync::Arc;

use amx_adapter_common::logging::init_logging;
use amx_adapter_common::pixel::{PixelSink, RecordingPixelSink};
use amx_adapter_common::settings::Settings;
use clap::{Parser, Subcommand};
use log::LevelFilter;

mod bid;
mod config;
mod error;
mod event;
mod id;

use error::CliError;
use event::EventKind;

#[derive(Parser)]
#[command(name = "amxcli")]
#[command(about = "CLI for the AMX bid adapter and customData ID submodule")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings TOML file (defaults to the embedded amx-adapter.toml)
    #[arg(long, short, global = true, env = "AMX_ADAPTER_CONFIG")]
    config: Option<PathBuf>,

    /// Bidder code of the adapter to drive
    #[arg(long, global = true, default_value = "amx")]
    bidder: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Bid request and response handling
    Bid {
        #[command(subcommand)]
        action: BidAction,
    },
    /// User ID resolution
    Id {
        #[command(subcommand)]
        action: IdAction,
    },
    /// Report a lifecycle event through tracking pixels
    Event {
        /// Event to report
        #[arg(value_enum)]
        kind: EventKind,

        /// JSON file describing the event
        #[arg(long, short)]
        file: PathBuf,

        /// Print the pixel URLs instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config against settings validation
    Validate {
        /// Path to the TOML configuration file
        #[arg(long, short)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum BidAction {
    /// Build the server request for `{"bids": [...], "bidderRequest": {...}}`
    Build {
        /// Path to the auction input JSON
        #[arg(long, short)]
        file: PathBuf,

        /// Cookie header used to resolve user IDs for bids without any
        #[arg(long)]
        cookie: Option<String>,
    },

    /// Interpret a response body against the request that produced it
    Interpret {
        /// Server request JSON, as printed by `bid build`
        #[arg(long)]
        request: PathBuf,

        /// Response body (JSON, or anything else for a no-bid)
        #[arg(long)]
        response: PathBuf,
    },

    /// List user syncs from one or more response bodies
    Syncs {
        /// Response body files
        #[arg(long = "response", required = true)]
        responses: Vec<PathBuf>,

        /// Allow iframe syncs
        #[arg(long)]
        iframe: bool,
    },
}

#[derive(Subcommand)]
enum IdAction {
    /// Resolve the user ID map
    Get {
        /// Raw `Cookie` header of the page request
        #[arg(long)]
        cookie: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        command,
        verbose,
        config: config_file,
        bidder,
    } = cli;

    match command {
        Commands::Config { action } => match action {
            ConfigAction::Validate { file } => config::validate(&file, verbose),
        },
        command => {
            let settings = config::load_settings(config_file.as_deref(), verbose)?;

            let level = if verbose {
                LevelFilter::Debug
            } else {
                settings.logging.level.to_level_filter()
            };
            init_logging(level)?;

            run_with_settings(command, &settings, &bidder)
        }
    }
}

fn run_with_settings(
    command: Commands,
    settings: &Settings,
    bidder: &str,
) -> Result<(), CliError> {
    // Only lifecycle events send real pixels.
    let pixels: Arc<dyn PixelSink> = Arc::new(RecordingPixelSink::new());

    match command {
        Commands::Bid { action } => match action {
            BidAction::Build { file, cookie } => {
                bid::build(settings, &pixels, bidder, &file, cookie.as_deref())
            }
            BidAction::Interpret { request, response } => {
                bid::interpret(settings, &pixels, bidder, &request, &response)
            }
            BidAction::Syncs { responses, iframe } => {
                bid::syncs(settings, &pixels, bidder, &responses, iframe)
            }
        },
        Commands::Id { action } => match action {
            IdAction::Get { cookie } => id::get(settings, cookie.as_deref()),
        },
        Commands::Event {
            kind,
            file,
            dry_run,
        } => event::fire(settings, bidder, kind, &file, dry_run),
        Commands::Config { .. } => Err(CliError::Config(
            "config commands do not take loaded settings".into(),
        )),
    }
}
