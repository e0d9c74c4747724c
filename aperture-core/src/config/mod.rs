//! Configuration types for Aperture
//!
//! [`SessionConfig`] is the runtime description of a capture session;
//! [`ConfigFile`] is its persisted form.

mod file;

pub use file::{
    sample_config, CameraSettings, ConfigFile, PollSettings, PreviewSettings, StillSettings,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{ImageFormat, LensFacing, PixelFormat};

/// Largest surface dimension accepted
pub const MAX_DIMENSION: u32 = 8192;

/// Complete capture session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lens facing of the camera to open
    pub facing: LensFacing,
    /// Preview surface shape
    pub preview: ImageFormat,
    /// Still-capture surface shape, `None` for a preview-only session
    pub still: Option<ImageFormat>,
    /// Delay between two frame polls
    pub poll_interval: Duration,
    /// Stop after this many frames
    pub frame_limit: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_file(&ConfigFile::default())
    }
}

impl SessionConfig {
    /// Build the runtime configuration from a loaded config file
    pub fn from_file(file: &ConfigFile) -> Self {
        let preview = ImageFormat::new(
            file.preview.width,
            file.preview.height,
            file.preview.format,
        );
        let still = file.still.enabled.then(|| {
            ImageFormat::new(file.preview.width, file.preview.height, file.still.format)
        });

        Self {
            facing: file.camera.facing,
            preview,
            still,
            poll_interval: Duration::from_millis(file.poll.interval_ms),
            frame_limit: None,
        }
    }

    /// Select the camera by lens facing
    pub fn with_facing(mut self, facing: LensFacing) -> Self {
        self.facing = facing;
        self
    }

    /// Resize both surfaces
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.preview.width = width;
        self.preview.height = height;
        if let Some(still) = self.still.as_mut() {
            still.width = width;
            still.height = height;
        }
        self
    }

    /// Set the preview pixel format
    pub fn with_preview_format(mut self, format: PixelFormat) -> Self {
        self.preview.format = format;
        self
    }

    /// Set or clear the still-capture stream
    pub fn with_still(mut self, still: Option<ImageFormat>) -> Self {
        self.still = still;
        self
    }

    /// Set the delay between two frame polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Stop after `frames` frames
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Validate the configuration and return any warnings
    ///
    /// An empty list means the configuration looks good.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.preview.format == PixelFormat::Jpeg {
            warnings.push(
                "JPEG preview frames are compressed and cannot be inspected pixel by pixel."
                    .to_string(),
            );
        }

        if self.preview.width % 16 != 0 || self.preview.height % 16 != 0 {
            warnings.push(format!(
                "Preview size {}x{} is not 16-aligned; most sensors will pick the nearest supported size.",
                self.preview.width, self.preview.height
            ));
        }

        if self.poll_interval < Duration::from_millis(5) {
            warnings.push(format!(
                "Poll interval {:?} is very short and will mostly see repeated frames.",
                self.poll_interval
            ));
        } else if self.poll_interval > Duration::from_secs(1) {
            warnings.push(format!(
                "Poll interval {:?} is longer than a second; preview will look frozen.",
                self.poll_interval
            ));
        }

        if self.frame_limit == Some(0) {
            warnings.push("Frame limit of 0 stops before the first frame.".to_string());
        }

        warnings
    }

    /// Validate and return an error if configuration is invalid
    ///
    /// Unlike `validate()` which returns warnings, this returns hard errors
    /// for configurations that cannot work.
    pub fn validate_strict(&self) -> Result<(), String> {
        let mut formats = vec![("Preview", self.preview)];
        if let Some(still) = self.still {
            formats.push(("Still", still));
        }

        for (name, format) in formats {
            if format.width == 0 || format.height == 0 {
                return Err(format!("{} resolution cannot be zero", name));
            }
            if format.width > MAX_DIMENSION || format.height > MAX_DIMENSION {
                return Err(format!(
                    "{} resolution {}x{} exceeds maximum supported ({}x{})",
                    name, format.width, format.height, MAX_DIMENSION, MAX_DIMENSION
                ));
            }
        }

        if self.poll_interval.is_zero() {
            return Err("Poll interval cannot be zero".to_string());
        }

        Ok(())
    }
}
