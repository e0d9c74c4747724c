//! Preview command - open a camera and pull preview frames

use anyhow::{Context, Result};
use aperture_core::{
    CameraController, ConfigFile, LensFacing, SessionConfig, SessionState, types::FrameBuffer,
};
use clap::Args;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, trace, warn};

/// Arguments for the preview command
#[derive(Args)]
pub struct PreviewArgs {
    /// Open the front camera
    #[arg(long, conflicts_with = "rear")]
    front: bool,

    /// Open the rear camera
    #[arg(long)]
    rear: bool,

    /// Preview width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Preview height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Stop after this many distinct frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Delay between two frame polls in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Take one still capture once the first frame arrived
    #[arg(long)]
    still: bool,
}

impl PreviewArgs {
    /// Layer the command line over the config file
    fn session_config(&self, file: &ConfigFile) -> SessionConfig {
        let mut config = SessionConfig::from_file(file);

        if self.front || self.rear {
            config = config.with_facing(LensFacing::from_rear(self.rear));
        }
        if self.width.is_some() || self.height.is_some() {
            let width = self.width.unwrap_or(config.preview.width);
            let height = self.height.unwrap_or(config.preview.height);
            config = config.with_size(width, height);
        }
        if let Some(ms) = self.interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(frames) = self.frames {
            config = config.with_frame_limit(frames);
        }

        config
    }
}

/// Open a camera and pull preview frames until interrupted
pub async fn preview(args: PreviewArgs) -> Result<()> {
    println!("Aperture - Starting Preview\n");

    let file = ConfigFile::load_or_default();
    let config = args.session_config(&file);

    for warning in config.validate() {
        warn!("{}", warning);
    }
    config
        .validate_strict()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    println!("Configuration:");
    println!("  Facing:    {}", config.facing);
    println!("  Preview:   {}", config.preview);
    match config.still {
        Some(still) => println!("  Still:     {}", still),
        None => println!("  Still:     disabled"),
    }
    println!("  Poll:      {} ms", config.poll_interval.as_millis());
    if let Some(limit) = config.frame_limit {
        println!("  Frames:    {}", limit);
    }
    println!();

    let (camera, surfaces) = super::camera_service(&file)?;
    let mut controller = CameraController::new(camera, surfaces);

    let device = controller
        .init_facing(config.facing)
        .map_err(super::with_hint)
        .context("Failed to open camera")?;
    println!("Opened {}", device);

    controller
        .create_session_with_formats(config.preview, config.still)
        .map_err(super::with_hint)
        .context("Failed to create capture session")?;
    controller
        .start_preview(true)
        .map_err(super::with_hint)
        .context("Failed to start preview")?;

    println!("Preview running. Press Ctrl+C to stop...\n");

    let interval = config.poll_interval;
    let limit = config.frame_limit;
    let want_still = args.still && config.still.is_some();
    let mut distinct = 0u64;

    let poll = async {
        let mut last_sequence = None;
        let mut still_taken = false;

        while limit.is_none_or(|l| distinct < l) {
            match controller.latest_frame() {
                Some(frame) if last_sequence != Some(frame.sequence) => {
                    last_sequence = Some(frame.sequence);
                    distinct += 1;
                    report(&frame);

                    if want_still && !still_taken {
                        still_taken = true;
                        match controller.capture_still() {
                            Ok(sequence) => {
                                println!("Still capture submitted (sequence {})", sequence)
                            }
                            Err(e) => warn!("Still capture failed: {}", e),
                        }
                    }
                }
                Some(frame) => trace!("Frame #{} unchanged", frame.sequence),
                None => debug!("No frame queued yet, retrying in {:?}", interval),
            }
            tokio::time::sleep(interval).await;
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            println!("\nReceived interrupt signal...");
        }
        _ = poll => {
            info!("Frame limit reached");
        }
    }

    println!("Stopping preview...");
    if controller.state() == SessionState::Active {
        if let Err(e) = controller.start_preview(false) {
            warn!("Failed to stop preview: {}", e);
        }
    }

    let stats = controller.frame_stats().unwrap_or_default();
    controller.teardown();

    println!();
    println!("Preview stopped.");
    println!("  Distinct frames: {}", distinct);
    println!("  Polls:           {}", stats.frames_pulled + stats.empty_polls);
    println!("  Repeated:        {}", stats.repeated);
    println!("  Empty:           {}", stats.empty_polls);
    println!("  Session state:   {}", controller.state());

    Ok(())
}

fn report(frame: &FrameBuffer) {
    println!(
        "Frame #{:<6} {}x{} {} ({} bytes)",
        frame.sequence,
        frame.width,
        frame.height,
        frame.format,
        frame.data.len()
    );
}
