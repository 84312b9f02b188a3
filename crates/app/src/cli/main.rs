//! moa CLI Application

mod commands;

use clap::{Parser, Subcommand};
use moa_core::domain::config::{MoaConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "moa")]
#[command(about = "Roaming agents calling around a 5.1 listener", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run without opening an output device
    #[arg(long)]
    no_audio: bool,

    /// Seed for a reproducible simulation
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the simulation until Ctrl+C (default)
    Run,
    /// Play an identifying tone in each quadrant at three distances
    TestTones,
    /// List output devices and their capabilities
    ListDevices,
    /// Write synthesized placeholder calls
    GenerateCalls {
        /// Target directory (defaults to the configured assets directory)
        dir: Option<PathBuf>,
    },
    /// Write the default configuration
    InitConfig {
        /// Target file (defaults to the --config path)
        file: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::info!("🐓 moa starting...");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let config = MoaConfig::load_or_default(&cli.config).await?;
            commands::run(config, cli.no_audio, cli.seed).await
        }
        Command::TestTones => {
            let config = MoaConfig::load_or_default(&cli.config).await?;
            commands::test_tones(&config, cli.no_audio).await
        }
        Command::ListDevices => commands::list_devices(),
        Command::GenerateCalls { dir } => {
            let config = MoaConfig::load_or_default(&cli.config).await?;
            let dir = dir.unwrap_or(config.audio.assets_dir);
            commands::generate_calls(&dir, config.audio.sample_rate)
        }
        Command::InitConfig { file } => commands::init_config(&file.unwrap_or(cli.config)).await,
    }
}
