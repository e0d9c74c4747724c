//! Aperture CLI
//!
//! Camera capture-session lifecycle controller.
//!
//! # Usage
//!
//! ```bash
//! # List available cameras
//! aperture list
//!
//! # Open the front camera and pull 60 preview frames
//! aperture preview --front --frames 60
//!
//! # Write a default config file
//! aperture config init
//!
//! # Shrink the preview
//! aperture config set preview.width 640
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Aperture - camera capture-session lifecycle controller
#[derive(Parser)]
#[command(name = "aperture")]
#[command(version)]
#[command(about = "Open a camera, run a capture session and pull preview frames", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    #[command(alias = "ls")]
    List(commands::ListArgs),

    /// Open a camera and pull preview frames
    Preview(commands::PreviewArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("aperture={}", level).parse()?)
                .add_directive(format!("aperture_core={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::List(args) => commands::list(args).await?,
        Commands::Preview(args) => commands::preview(args).await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
