//! Configuration file loading
//!
//! Loads user configuration from `~/.config/aperture/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{CameraError, Result};
use crate::sim::SimulatorConfig;
use crate::types::{LensFacing, PixelFormat};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Camera selection
    #[serde(default)]
    pub camera: CameraSettings,

    /// Preview stream
    #[serde(default)]
    pub preview: PreviewSettings,

    /// Still-capture stream
    #[serde(default)]
    pub still: StillSettings,

    /// Frame polling
    #[serde(default)]
    pub poll: PollSettings,

    /// Simulated camera service
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Camera selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Lens facing to open (front, back, external)
    #[serde(default = "default_facing")]
    pub facing: LensFacing,
}

/// Preview stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSettings {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Pixel format (yuv420, rgba8888)
    #[serde(default)]
    pub format: PixelFormat,
}

/// Still-capture stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StillSettings {
    /// Bind a still-capture stream next to the preview
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pixel format of captured stills
    #[serde(default = "default_still_format")]
    pub format: PixelFormat,
}

/// Frame polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay between two frame polls in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_facing() -> LensFacing {
    LensFacing::Back
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_true() -> bool {
    true
}

fn default_still_format() -> PixelFormat {
    PixelFormat::Jpeg
}

fn default_interval_ms() -> u64 {
    33
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: default_facing(),
        }
    }
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: PixelFormat::default(),
        }
    }
}

impl Default for StillSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: default_still_format(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("aperture").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("aperture")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/aperture/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| CameraError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| CameraError::config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CameraError::config(format!("Failed to serialize config: {}", e)))?;

        write_config(&path, &content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Write the annotated sample to `path`
    ///
    /// Returns `false` without touching the file if it exists and `force`
    /// is not set.
    pub fn init_at(path: PathBuf, force: bool) -> Result<bool> {
        if path.exists() && !force {
            debug!("Keeping existing config file at {:?}", path);
            return Ok(false);
        }

        write_config(&path, &sample_config())?;
        info!("Wrote sample configuration to {:?}", path);
        Ok(true)
    }

    /// Change one setting addressed as `table.key`, e.g. `preview.width`
    ///
    /// Integers and booleans are taken as such, anything else as a string.
    /// The result must still deserialize, so `camera.facing = sideways`
    /// is rejected and the config is left untouched.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        let (table, field) = key
            .split_once('.')
            .ok_or_else(|| CameraError::config(format!("Expected table.key, got '{}'", key)))?;

        let mut root = toml::Value::try_from(&*self)
            .map_err(|e| CameraError::config(format!("Failed to serialize config: {}", e)))?;

        let slot = root
            .get_mut(table)
            .and_then(|t| t.get_mut(field))
            .filter(|v| !v.is_array() && !v.is_table())
            .ok_or_else(|| CameraError::config(format!("Unknown setting '{}'", key)))?;
        *slot = parse_scalar(raw);

        *self = root
            .try_into()
            .map_err(|e| CameraError::config(format!("Invalid value for {}: {}", key, e)))?;
        debug!("Set {} = {}", key, raw);
        Ok(())
    }
}

fn parse_scalar(raw: &str) -> toml::Value {
    if let Ok(n) = raw.parse::<i64>() {
        toml::Value::Integer(n)
    } else if let Ok(b) = raw.parse::<bool>() {
        toml::Value::Boolean(b)
    } else {
        toml::Value::String(raw.to_string())
    }
}

fn write_config(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CameraError::config(format!("Failed to create config directory: {}", e))
            })?;
        }
    }

    std::fs::write(path, content)
        .map_err(|e| CameraError::config(format!("Failed to write config file: {}", e)))
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Aperture Configuration

[camera]
# Lens facing to open: front, back, external
facing = "back"

[preview]
# Preview surface size in pixels
width = 1280
height = 720

# Pixel format: yuv420, rgba8888
format = "yuv420"

[still]
# Bind a still-capture stream next to the preview
enabled = true

# Pixel format of captured stills: jpeg, yuv420
format = "jpeg"

[poll]
# Delay between two frame polls in milliseconds
interval_ms = 33

[simulator]
# Frames per second produced by the simulated camera service
fps = 30

[[simulator.devices]]
id = "0"
facing = "back"
sensor_orientation = 90
output_sizes = [[640, 480], [1280, 720], [1920, 1080]]

[[simulator.devices]]
id = "1"
facing = "front"
sensor_orientation = 270
output_sizes = [[640, 480], [1280, 720], [1920, 1080]]
"#
    .to_string()
}
