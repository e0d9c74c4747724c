//! Error types for Aperture

use thiserror::Error;

use crate::status::CameraStatus;
use crate::types::{SessionState, StreamRole};

/// Result type alias using CameraError
pub type Result<T> = std::result::Result<T, CameraError>;

/// Main error type for Aperture operations
#[derive(Debug, Error)]
pub enum CameraError {
    /// A camera subsystem call returned a non-OK status
    #[error("{call} failed: {status}")]
    Status {
        call: &'static str,
        status: CameraStatus,
    },

    /// No device satisfied the selector
    #[error("No camera device matches the selector")]
    NoMatchingDevice,

    /// Device characteristics could not be read
    #[error("Metadata unavailable for camera {0}")]
    MetadataUnavailable(String),

    /// Building the stream binding table failed
    #[error("Binding stream #{index} ({role}) failed: {source}")]
    BindingFailed {
        index: usize,
        role: StreamRole,
        #[source]
        source: Box<CameraError>,
    },

    /// A stream role was bound twice
    #[error("Stream {0} is already bound")]
    DuplicateStream(StreamRole),

    /// Operation requires a stream that is not bound
    #[error("Stream {0} is not bound")]
    StreamNotBound(StreamRole),

    /// Operation is illegal in the current session state
    #[error("Session state conflict: expected {expected}, found {actual}")]
    StateConflict {
        expected: SessionState,
        actual: SessionState,
    },

    /// Controller has no open device
    #[error("Camera not initialized")]
    NotInitialized,

    /// Controller already holds an open device
    #[error("Camera already initialized")]
    AlreadyInitialized,

    /// Controller was torn down and cannot be reused
    #[error("Camera controller has been torn down")]
    TornDown,

    /// No capture session exists
    #[error("No active capture session")]
    NoSession,

    /// A capture session already exists
    #[error("Capture session already exists")]
    SessionAlreadyExists,

    /// Surface provider failure
    #[error("Surface error: {0}")]
    Surface(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CameraError>,
    },
}

impl CameraError {
    /// Create a status error for a subsystem call
    pub fn status(call: &'static str, status: CameraStatus) -> Self {
        Self::Status { call, status }
    }

    /// Create a surface error
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context and binding wrappers
    pub fn root(&self) -> &CameraError {
        match self {
            Self::WithContext { source, .. } | Self::BindingFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Subsystem status carried by this error, if any
    pub fn camera_status(&self) -> Option<CameraStatus> {
        match self.root() {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A short hint for the user on how to resolve the error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::NoMatchingDevice => {
                Some("Run 'aperture list' to see available cameras and their facing")
            }
            Self::MetadataUnavailable(_) => {
                Some("The camera service could not describe this device; check camera permissions")
            }
            Self::Status { status, .. } => match status {
                CameraStatus::PermissionDenied => {
                    Some("Grant the camera permission to this process")
                }
                CameraStatus::CameraInUse | CameraStatus::MaxCameraInUse => {
                    Some("Close other applications using the camera")
                }
                CameraStatus::CameraDisabled => Some("The camera is disabled by device policy"),
                _ => None,
            },
            Self::SessionAlreadyExists => {
                Some("Tear down the current session before creating a new one")
            }
            Self::Config(_) => Some("Check your config.toml (see 'aperture config path')"),
            _ => None,
        }
    }

    /// Whether the error is a setup/precondition fault that callers should
    /// treat as unrecoverable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            Self::Status { .. }
                | Self::NoMatchingDevice
                | Self::MetadataUnavailable(_)
                | Self::DuplicateStream(_)
                | Self::StateConflict { .. }
                | Self::Surface(_)
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

/// Extension trait turning raw subsystem results into `CameraError`
pub trait StatusExt<T> {
    /// Tag a failed status with the name of the subsystem call
    fn call(self, call: &'static str) -> Result<T>;
}

impl<T> StatusExt<T> for std::result::Result<T, CameraStatus> {
    fn call(self, call: &'static str) -> Result<T> {
        self.map_err(|status| CameraError::status(call, status))
    }
}
