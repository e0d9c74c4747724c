//! Camera subsystem status codes
//!
//! Every call into the camera subsystem reports a status. Anything other
//! than `Ok` is surfaced as a [`CameraStatus`] inside
//! [`CameraError::Status`](crate::error::CameraError::Status).

use serde::{Deserialize, Serialize};

/// Status code returned by a camera subsystem call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraStatus {
    Ok,
    Unknown,
    InvalidParameter,
    CameraDisconnected,
    NotEnoughMemory,
    MetadataNotFound,
    CameraDevice,
    CameraService,
    SessionClosed,
    InvalidOperation,
    StreamConfigureFail,
    CameraInUse,
    MaxCameraInUse,
    CameraDisabled,
    PermissionDenied,
}

const ERROR_BASE: i32 = -10000;

impl CameraStatus {
    /// Raw numeric code as reported by the subsystem
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Unknown => ERROR_BASE,
            Self::InvalidParameter => ERROR_BASE - 1,
            Self::CameraDisconnected => ERROR_BASE - 2,
            Self::NotEnoughMemory => ERROR_BASE - 3,
            Self::MetadataNotFound => ERROR_BASE - 4,
            Self::CameraDevice => ERROR_BASE - 5,
            Self::CameraService => ERROR_BASE - 6,
            Self::SessionClosed => ERROR_BASE - 7,
            Self::InvalidOperation => ERROR_BASE - 8,
            Self::StreamConfigureFail => ERROR_BASE - 9,
            Self::CameraInUse => ERROR_BASE - 10,
            Self::MaxCameraInUse => ERROR_BASE - 11,
            Self::CameraDisabled => ERROR_BASE - 12,
            Self::PermissionDenied => ERROR_BASE - 13,
        }
    }

    /// Map a raw code back to a status; unrecognised codes become `Unknown`
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            -10001 => Self::InvalidParameter,
            -10002 => Self::CameraDisconnected,
            -10003 => Self::NotEnoughMemory,
            -10004 => Self::MetadataNotFound,
            -10005 => Self::CameraDevice,
            -10006 => Self::CameraService,
            -10007 => Self::SessionClosed,
            -10008 => Self::InvalidOperation,
            -10009 => Self::StreamConfigureFail,
            -10010 => Self::CameraInUse,
            -10011 => Self::MaxCameraInUse,
            -10012 => Self::CameraDisabled,
            -10013 => Self::PermissionDenied,
            _ => Self::Unknown,
        }
    }

    /// Canonical status name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "ACAMERA_OK",
            Self::Unknown => "ACAMERA_ERROR_UNKNOWN",
            Self::InvalidParameter => "ACAMERA_ERROR_INVALID_PARAMETER",
            Self::CameraDisconnected => "ACAMERA_ERROR_CAMERA_DISCONNECTED",
            Self::NotEnoughMemory => "ACAMERA_ERROR_NOT_ENOUGH_MEMORY",
            Self::MetadataNotFound => "ACAMERA_ERROR_METADATA_NOT_FOUND",
            Self::CameraDevice => "ACAMERA_ERROR_CAMERA_DEVICE",
            Self::CameraService => "ACAMERA_ERROR_CAMERA_SERVICE",
            Self::SessionClosed => "ACAMERA_ERROR_SESSION_CLOSED",
            Self::InvalidOperation => "ACAMERA_ERROR_INVALID_OPERATION",
            Self::StreamConfigureFail => "ACAMERA_ERROR_STREAM_CONFIGURE_FAIL",
            Self::CameraInUse => "ACAMERA_ERROR_CAMERA_IN_USE",
            Self::MaxCameraInUse => "ACAMERA_ERROR_MAX_CAMERA_IN_USE",
            Self::CameraDisabled => "ACAMERA_ERROR_CAMERA_DISABLED",
            Self::PermissionDenied => "ACAMERA_ERROR_PERMISSION_DENIED",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Fatal device-level error reported through the device state callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceError {
    /// The device was disconnected or its lease was revoked
    Disconnected,
    /// Another client with higher priority holds the device
    InUse,
    /// The system-wide limit of open devices was reached
    MaxCamerasInUse,
    /// Device policy disabled the camera
    Disabled,
    /// The device hit a fatal hardware error
    Device,
    /// The camera service hit a fatal error
    Service,
    /// Code not covered by the variants above
    Other(i32),
}

impl DeviceError {
    /// Map a device error-state code; `0` is never produced by the subsystem
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::InUse,
            2 => Self::MaxCamerasInUse,
            3 => Self::Disabled,
            4 => Self::Device,
            5 => Self::Service,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "device disconnected"),
            Self::InUse => write!(f, "device already in use"),
            Self::MaxCamerasInUse => write!(f, "too many devices in use"),
            Self::Disabled => write!(f, "device disabled"),
            Self::Device => write!(f, "fatal device error"),
            Self::Service => write!(f, "camera service failure"),
            Self::Other(code) => write!(f, "device error {:#x}", code),
        }
    }
}
