//! CLI command implementations

mod config;
mod list;
mod preview;

pub use config::{config, ConfigArgs};
pub use list::{list, ListArgs};
pub use preview::{preview, PreviewArgs};

use anyhow::Result;
use aperture_core::sim::{self, SimulatedCamera, SimulatedSurfaces};
use aperture_core::{CameraError, ConfigFile};
use std::sync::Arc;

/// Start the in-process camera service described by the config file
fn camera_service(file: &ConfigFile) -> Result<(Arc<SimulatedCamera>, Arc<SimulatedSurfaces>)> {
    sim::simulated(file.simulator.clone()).map_err(with_hint)
}

/// Turn a library error into a CLI error, appending the user hint if any
fn with_hint(err: CameraError) -> anyhow::Error {
    match err.user_hint() {
        Some(hint) => anyhow::anyhow!("{}\nHint: {}", err, hint),
        None => anyhow::Error::new(err),
    }
}
