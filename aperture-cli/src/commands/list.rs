//! List cameras command

use anyhow::{Context, Result};
use aperture_core::registry::DeviceRegistry;
use aperture_core::{CameraBackend, ConfigFile};
use clap::Args;
use serde_json::json;
use tracing::warn;

/// Arguments for the list command
#[derive(Args)]
pub struct ListArgs {
    /// Print the device list as JSON
    #[arg(long)]
    json: bool,
}

/// List available cameras
pub async fn list(args: ListArgs) -> Result<()> {
    let file = ConfigFile::load_or_default();
    let (camera, _surfaces) = super::camera_service(&file)?;

    let devices = DeviceRegistry::new(&*camera)
        .list()
        .map_err(super::with_hint)?;

    let rows: Vec<_> = devices
        .iter()
        .map(|device| {
            let metadata = camera.characteristics(&device.id).unwrap_or_else(|status| {
                warn!("Characteristics of camera {} unavailable: {}", device.id, status);
                Default::default()
            });
            (device, metadata)
        })
        .collect();

    camera.release_manager();

    if args.json {
        let entries: Vec<_> = rows
            .iter()
            .map(|(device, metadata)| {
                json!({
                    "id": device.id,
                    "facing": device.facing,
                    "sensor_orientation": metadata.sensor_orientation,
                    "output_sizes": metadata.output_sizes,
                })
            })
            .collect();
        let output =
            serde_json::to_string_pretty(&entries).context("Failed to serialize device list")?;
        println!("{}", output);
        return Ok(());
    }

    println!("Aperture - Available Cameras\n");

    if rows.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("{:<8} {:<10} {:<12} {}", "ID", "Facing", "Orientation", "Sizes");
    println!("{}", "-".repeat(60));

    for (device, metadata) in &rows {
        let orientation = metadata
            .sensor_orientation
            .map(|o| format!("{}°", o))
            .unwrap_or_else(|| "Unknown".to_string());

        let sizes = metadata
            .output_sizes
            .iter()
            .map(|(w, h)| format!("{}x{}", w, h))
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "{:<8} {:<10} {:<12} {}",
            truncate(&device.id, 8),
            device.facing,
            orientation,
            sizes
        );
    }

    println!("\nUse 'aperture preview --front' or '--rear' to open a camera.");

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}
