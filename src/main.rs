// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qrscan")]
#[command(about = "Scan QR codes from a camera preview")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan image files as a camera preview
    Scan {
        /// Images to serve as preview frames, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Configuration file (default: ~/.config/qrscan/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Keep scanning after each result
        #[arg(short, long)]
        bulk: bool,

        /// Open URL results in the default browser
        #[arg(short, long)]
        open: bool,

        /// Turn the torch on
        #[arg(long)]
        torch: bool,

        /// Disable the auto-focus cycle
        #[arg(long)]
        no_autofocus: bool,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "10")]
        timeout: u64,
    },

    /// List the camera the given image files are exposed as
    List {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the configuration
    Config {
        /// Configuration file (default: ~/.config/qrscan/config.json)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite the file with defaults
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qrscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            files,
            config,
            bulk,
            open,
            torch,
            no_autofocus,
            timeout,
        } => cli::scan(cli::ScanOptions {
            files,
            config,
            torch,
            no_autofocus,
            bulk,
            open,
            timeout,
        }),
        Commands::List { files } => cli::list_cameras(files),
        Commands::Config { path, reset } => cli::show_config(path, reset),
    }
}
