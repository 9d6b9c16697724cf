pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::collector::DayKey;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to a file (the platform data directory when no path is given)
    #[arg(long, global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Configuration profile to use instead of the default
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Number of concurrent fetches per request
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Collect picture URLs for a date range and print them
    Fetch {
        /// First day (YYYY-MM-DD)
        #[arg(long, required = true)]
        from: DayKey,

        /// Last day (YYYY-MM-DD), inclusive
        #[arg(long, required = true)]
        to: DayKey,

        /// Number of concurrent fetches
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Show or manage configuration
    Config {
        /// List all available profiles
        #[arg(short, long)]
        list: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

impl Cli {
    /// Log file requested on the command line, if any
    pub fn log_file(&self) -> Option<PathBuf> {
        match &self.log_file {
            Some(Some(path)) => Some(path.clone()),
            Some(None) => Some(crate::utils::default_log_file()),
            None => None,
        }
    }
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    let profile = cli.profile.clone();

    match cli.command {
        Commands::Serve { port, workers } => {
            info!("Starting HTTP service");
            commands::serve(profile, port, workers).await
        },
        Commands::Fetch { from, to, workers } => {
            info!("Collecting pictures from {} to {}", from, to);
            commands::fetch(profile, from, to, workers).await
        },
        Commands::Config { list, init } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if init {
                info!("Writing default configuration");
                commands::init_config()
            } else {
                info!("Showing current configuration");
                commands::show_config(profile)
            }
        },
    }
}
