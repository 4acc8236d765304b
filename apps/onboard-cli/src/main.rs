//! d2onboard: imports game archives into the private asset directory.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "d2onboard", version, about = "Game asset onboarding")]
struct Cli {
    /// Use this config file instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run the onboarding wizard (default).
    Run(RunArgs),
    /// Show the completion ledger.
    Status,
    /// List removable storage devices.
    Devices,
    /// Look for existing game installs below the given directories.
    Scan {
        /// Directories to search; defaults to the configured browse roots.
        paths: Vec<PathBuf>,
    },
    /// Print the effective configuration.
    Config {
        /// Write the effective configuration to disk.
        #[arg(long)]
        init: bool,
    },
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Use the directory containing this archive, without prompting.
    #[arg(long, conflicts_with = "usb")]
    pub local: Option<PathBuf>,

    /// Use the USB device mounted at this path, without prompting.
    #[arg(long)]
    pub usb: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,d2onboard=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let config = config::OnboardConfig::load_from(&config_path)?;
    tracing::debug!(
        path = %config_path.display(),
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    match cli.command.unwrap_or(CliCommand::Run(RunArgs::default())) {
        CliCommand::Run(args) => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting d2onboard");
            let rt = tokio::runtime::Runtime::new()?;
            let _guard = rt.enter();
            app::run(&config, args, &rt)?;
        }
        CliCommand::Status => app::status(&config)?,
        CliCommand::Devices => app::devices(&config),
        CliCommand::Scan { paths } => app::scan(&config, paths),
        CliCommand::Config { init } => {
            if init {
                config.save_to(&config_path)?;
                println!("wrote {}", config_path.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
