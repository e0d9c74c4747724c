//! Core types for Aperture
//!
//! Opaque handles for camera subsystem objects, device descriptors,
//! session state and the frame buffer descriptor handed to consumers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter shared by every handle type, so handles never collide
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Allocate a new unique handle
            pub fn new() -> Self {
                Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
            }

            /// Wrap a raw value handed out by a backend
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw handle value
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

native_handle!(
    /// An opened camera device
    DeviceHandle
);
native_handle!(
    /// A capture session created on a device
    SessionHandle
);
native_handle!(
    /// The container grouping every session output of a session
    ContainerHandle
);
native_handle!(
    /// A session output created from a window
    SessionOutputHandle
);
native_handle!(
    /// An output target created from a window
    OutputTargetHandle
);
native_handle!(
    /// A capture request built from a template
    RequestHandle
);
native_handle!(
    /// A drawable window owned by the compositor
    WindowHandle
);

/// Direction a camera lens faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    Back,
    External,
}

impl LensFacing {
    /// `rear == true` selects the back camera, otherwise the front one
    pub fn from_rear(rear: bool) -> Self {
        if rear { Self::Back } else { Self::Front }
    }

    /// Map the metadata enum value (0 = front, 1 = back, 2 = external)
    pub fn from_metadata(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Front),
            1 => Some(Self::Back),
            2 => Some(Self::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for LensFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "front" | "user" => Ok(Self::Front),
            "back" | "rear" | "environment" => Ok(Self::Back),
            "external" | "usb" => Ok(Self::External),
            _ => Err(format!("Unknown lens facing: {}", s)),
        }
    }
}

/// A camera visible to the subsystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Subsystem identifier (e.g. "0")
    pub id: String,
    /// Lens facing read from the device metadata
    pub facing: LensFacing,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, facing: LensFacing) -> Self {
        Self {
            id: id.into(),
            facing,
        }
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "camera {} ({})", self.id, self.facing)
    }
}

/// Static characteristics of a camera device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraMetadata {
    /// Lens facing entry, absent if the device did not report one
    pub lens_facing: Option<LensFacing>,
    /// Clockwise sensor orientation in degrees
    pub sensor_orientation: Option<i32>,
    /// Supported output sizes (width, height)
    pub output_sizes: Vec<(u32, u32)>,
}

impl CameraMetadata {
    pub fn with_facing(facing: LensFacing) -> Self {
        Self {
            lens_facing: Some(facing),
            ..Self::default()
        }
    }
}

/// Capture session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// No session has been created yet
    #[default]
    Uninitialized,
    /// Session is configured and idle
    Ready,
    /// Session is processing capture requests
    Active,
    /// Session was closed, by itself or because a new session evicted it
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "UNINITIALIZED"),
            SessionState::Ready => write!(f, "READY"),
            SessionState::Active => write!(f, "ACTIVE"),
            SessionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Logical output stream of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRole {
    Preview,
    StillCapture,
}

impl StreamRole {
    /// Request template used for this stream
    pub fn template(&self) -> RequestTemplate {
        match self {
            StreamRole::Preview => RequestTemplate::Preview,
            StreamRole::StillCapture => RequestTemplate::StillCapture,
        }
    }
}

impl std::fmt::Display for StreamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamRole::Preview => write!(f, "preview"),
            StreamRole::StillCapture => write!(f, "still-capture"),
        }
    }
}

/// Template a capture request is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTemplate {
    Preview,
    StillCapture,
}

/// Pixel layout of a surface's buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// YUV 4:2:0, 8 bits per sample
    #[default]
    Yuv420,
    /// Compressed JPEG blob
    Jpeg,
    /// RGBA 8 bits per channel
    Rgba8888,
}

impl PixelFormat {
    /// Bytes needed for one frame, or `None` for compressed formats
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Yuv420 => Some(pixels + pixels / 2),
            PixelFormat::Rgba8888 => Some(pixels * 4),
            PixelFormat::Jpeg => None,
        }
    }

    /// Row stride in bytes of the first plane
    pub fn stride(&self, width: u32) -> u32 {
        match self {
            PixelFormat::Rgba8888 => width * 4,
            PixelFormat::Yuv420 | PixelFormat::Jpeg => width,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Yuv420 => write!(f, "yuv420"),
            PixelFormat::Jpeg => write!(f, "jpeg"),
            PixelFormat::Rgba8888 => write!(f, "rgba8888"),
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yuv420" | "yuv" | "yuv_420_888" => Ok(Self::Yuv420),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "rgba" | "rgba8888" => Ok(Self::Rgba8888),
            _ => Err(format!("Unknown pixel format: {}", s)),
        }
    }
}

/// Requested shape of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFormat {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl ImageFormat {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.format)
    }
}

/// Sync fence file descriptor attached to a queued buffer
pub type Fence = i32;

/// 4x4 column-major texture transform
pub type TransformMatrix = [f32; 16];

/// Identity transform
pub const IDENTITY_TRANSFORM: TransformMatrix = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// A buffer queued on a surface by the producer
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Stride in bytes
    pub stride: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Acquire fence, `None` if the buffer is already signalled
    pub fence: Option<Fence>,
    /// Texture transform reported alongside the buffer
    pub transform: TransformMatrix,
    /// Producer sequence number
    pub sequence: u64,
    /// Pixel data
    pub data: Bytes,
}

impl FrameBuffer {
    /// Create a buffer with an identity transform and no fence
    pub fn new(width: u32, height: u32, format: PixelFormat, sequence: u64, data: Bytes) -> Self {
        Self {
            width,
            height,
            stride: format.stride(width),
            format,
            fence: None,
            transform: IDENTITY_TRANSFORM,
            sequence,
            data,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let a = SessionHandle::new();
        let b = SessionHandle::new();
        assert_ne!(a, b);
        assert_eq!(SessionHandle::from_raw(a.as_u64()), a);
    }

    #[test]
    fn test_handle_display() {
        let handle = DeviceHandle::from_raw(7);
        assert_eq!(handle.to_string(), "DeviceHandle(7)");
    }

    #[test]
    fn test_lens_facing_from_rear() {
        assert_eq!(LensFacing::from_rear(true), LensFacing::Back);
        assert_eq!(LensFacing::from_rear(false), LensFacing::Front);
    }

    #[test]
    fn test_lens_facing_parse() {
        assert_eq!("rear".parse::<LensFacing>(), Ok(LensFacing::Back));
        assert_eq!("FRONT".parse::<LensFacing>(), Ok(LensFacing::Front));
        assert!("sideways".parse::<LensFacing>().is_err());
        assert_eq!(LensFacing::from_metadata(2), Some(LensFacing::External));
        assert_eq!(LensFacing::from_metadata(3), None);
    }

    #[test]
    fn test_stream_role_templates() {
        assert_eq!(StreamRole::Preview.template(), RequestTemplate::Preview);
        assert_eq!(
            StreamRole::StillCapture.template(),
            RequestTemplate::StillCapture
        );
    }

    #[test]
    fn test_yuv_frame_size() {
        assert_eq!(PixelFormat::Yuv420.frame_size(1280, 720), Some(1_382_400));
        assert_eq!(PixelFormat::Rgba8888.frame_size(2, 2), Some(16));
        assert_eq!(PixelFormat::Jpeg.frame_size(1280, 720), None);
    }

    #[test]
    fn test_session_state_default() {
        assert_eq!(SessionState::default(), SessionState::Uninitialized);
        assert_eq!(SessionState::Active.to_string(), "ACTIVE");
    }
}
