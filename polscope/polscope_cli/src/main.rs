use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use polscope_core::utils::init_logging;
use polscope_core::{Config, LogLevel};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod commands;
mod settings;

use commands::bitmap::{execute_bitmap, BitmapCommand};
use commands::mls::{execute_level, execute_range, LevelArgs, RangeArgs};
use commands::search::{execute_search, SearchArgs};
use settings::SearchSettings;

/// polscope Command Line Interface
///
/// Ask questions about a type-enforcement and MLS policy snapshot.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warning, error)
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a policy for elements matching tests
    Search(SearchArgs),

    /// Render a level, or compare two levels
    Level(LevelArgs),

    /// Render a range and compare it with others
    Range(RangeArgs),

    /// Decode or encode serialized bitmaps
    #[clap(subcommand)]
    Bitmap(BitmapCommand),

    /// Print the effective settings as TOML
    #[clap(name = "show-config")]
    ShowConfig,
}

fn load_settings(cli: &Cli) -> Result<SearchSettings> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::new(),
    };

    let mut settings = SearchSettings::from_config(&config)?;
    if let Some(level) = &cli.log_level {
        settings.log.level = level
            .parse::<LogLevel>()
            .map_err(|_| anyhow!("Unknown log level: {}", level))?;
    }
    Ok(settings)
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    init_logging(settings.log.level);
    debug!(?settings, "effective settings");

    match &cli.command {
        Commands::Search(args) => execute_search(args, &settings),
        Commands::Level(args) => execute_level(args),
        Commands::Range(args) => execute_range(args),
        Commands::Bitmap(command) => execute_bitmap(command),
        Commands::ShowConfig => {
            print!("{}", toml::to_string(&settings)?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
