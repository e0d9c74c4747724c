//! Aperture Core Library
//!
//! Camera capture-session lifecycle control.
//!
//! This library provides:
//! - Device discovery and selection by lens facing
//! - Per-stream binding of surfaces to session outputs and capture requests
//! - Thread-safe tracking of asynchronously reported session state
//! - Non-blocking access to the latest preview frame
//! - An in-process camera service for running without hardware
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ Device Registry │───▶│ Stream Table │───▶│ Capture Session │
//! │ (select)        │    │ (bind)       │    │ (track state)   │
//! └─────────────────┘    └──────────────┘    └────────┬────────┘
//!                                                     │
//!                                            ┌────────▼────────┐
//!                                            │ Frame Accessor  │
//!                                            └─────────────────┘
//! ```

pub mod backend;
pub mod binding;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod registry;
pub mod session;
pub mod sim;
pub mod status;
pub mod types;

pub use backend::{CameraBackend, CameraEventListener, NativeWindow, SurfaceProvider};
pub use config::{ConfigFile, SessionConfig};
pub use controller::CameraController;
pub use error::{CameraError, Result};
pub use status::{CameraStatus, DeviceError};
pub use types::{DeviceDescriptor, FrameBuffer, ImageFormat, LensFacing, PixelFormat, SessionState};
