//! `aperture config` - inspect and edit the configuration file

use anyhow::Result;
use aperture_core::config::{sample_config, ConfigFile, SessionConfig};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::with_hint;

#[derive(Args)]
pub struct ConfigArgs {
    /// Use this file instead of the default location
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print where the config file is read from
    Path,

    /// Print the effective settings and any validation problems
    Show,

    /// Write the annotated sample config
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Change a single setting, e.g. `preview.width 640`
    Set {
        /// Setting as table.key
        key: String,

        value: String,
    },

    /// Print the annotated sample config
    Sample,
}

pub async fn config(args: ConfigArgs) -> Result<()> {
    let path = args.file.unwrap_or_else(ConfigFile::default_path);

    match args.command {
        ConfigCommand::Path => {
            let note = if path.exists() { "" } else { " (not created yet)" };
            println!("{}{}", path.display(), note);
        }
        ConfigCommand::Show => {
            let file = ConfigFile::load_from(path.clone()).map_err(with_hint)?;
            if path.exists() {
                println!("Settings from {}:", path.display());
            } else {
                println!("No config file at {}, built-in defaults:", path.display());
            }
            print_settings(&file);

            let session = SessionConfig::from_file(&file);
            let mut clean = true;
            if let Err(e) = session.validate_strict() {
                println!("Error: {}", e);
                clean = false;
            }
            for warning in session.validate() {
                println!("Warning: {}", warning);
                clean = false;
            }
            if clean {
                println!("\nConfiguration is valid.");
            }
        }
        ConfigCommand::Init { force } => {
            if ConfigFile::init_at(path.clone(), force).map_err(with_hint)? {
                println!("Wrote {}", path.display());
            } else {
                println!("{} already exists; pass --force to replace it.", path.display());
            }
        }
        ConfigCommand::Set { key, value } => {
            let mut file = ConfigFile::load_from(path.clone()).map_err(with_hint)?;
            file.set(&key, &value).map_err(with_hint)?;
            file.save_to(path.clone()).map_err(with_hint)?;
            println!("{} = {} ({})", key, value, path.display());
        }
        ConfigCommand::Sample => print!("{}", sample_config()),
    }

    Ok(())
}

fn print_settings(file: &ConfigFile) {
    println!("  camera.facing       {}", file.camera.facing);
    println!(
        "  preview             {}x{} {}",
        file.preview.width, file.preview.height, file.preview.format
    );
    if file.still.enabled {
        println!("  still               {}", file.still.format);
    } else {
        println!("  still               disabled");
    }
    println!("  poll.interval_ms    {}", file.poll.interval_ms);
    println!("  simulator.fps       {}", file.simulator.fps);
    for device in &file.simulator.devices {
        println!(
            "  simulator.device    {} ({}, {} deg)",
            device.id, device.facing, device.sensor_orientation
        );
    }
}
