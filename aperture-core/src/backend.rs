//! Seams to the platform camera service and the compositor
//!
//! [`CameraBackend`] mirrors the object model of the camera subsystem:
//! a manager that enumerates and opens devices, output containers, session
//! outputs and output targets created from windows, capture requests built
//! from templates, and capture sessions. Every object is referred to by an
//! opaque handle; whoever creates a handle is responsible for freeing it
//! through the matching call.
//!
//! Asynchronous notifications flow back through a single
//! [`CameraEventListener`] registered with the device, the session and the
//! availability notifier.
//!
//! Windows come from a [`SurfaceProvider`] and are reference counted by the
//! compositor; see [`SurfaceLease`](crate::binding::SurfaceLease).

use std::sync::Arc;

use crate::status::{CameraStatus, DeviceError};
use crate::types::{
    CameraMetadata, ContainerHandle, DeviceHandle, FrameBuffer, ImageFormat, OutputTargetHandle,
    RequestHandle, RequestTemplate, SessionHandle, SessionOutputHandle, SessionState,
    WindowHandle,
};

/// Result of a raw subsystem call
pub type StatusResult<T> = std::result::Result<T, CameraStatus>;

/// Receiver for every asynchronous notification of the camera subsystem
///
/// Callbacks may arrive on any thread, concurrently with the caller.
pub trait CameraEventListener: Send + Sync {
    /// A capture session moved to a new state
    fn on_session_transition(&self, session: SessionHandle, state: SessionState);

    /// An open device reported a fatal error
    fn on_device_error(&self, device: DeviceHandle, error: DeviceError);

    /// A camera became available or unavailable system-wide
    fn on_availability_changed(&self, camera_id: &str, available: bool);
}

/// Camera subsystem
pub trait CameraBackend: Send + Sync {
    // Manager

    /// Identifiers of every camera visible to this process
    fn camera_ids(&self) -> StatusResult<Vec<String>>;

    /// Static characteristics of a camera
    fn characteristics(&self, camera_id: &str) -> StatusResult<CameraMetadata>;

    /// Open a camera; device errors are reported to `listener`
    fn open_device(
        &self,
        camera_id: &str,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<DeviceHandle>;

    /// Close an open camera
    fn close_device(&self, device: DeviceHandle) -> StatusResult<()>;

    /// Start receiving availability notifications
    fn register_availability_listener(
        &self,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<()>;

    /// Stop receiving availability notifications
    fn unregister_availability_listener(&self) -> StatusResult<()>;

    /// Release the manager; no other call is valid afterwards
    fn release_manager(&self);

    // Outputs

    fn create_output_container(&self) -> StatusResult<ContainerHandle>;

    fn free_output_container(&self, container: ContainerHandle);

    fn create_session_output(&self, window: WindowHandle) -> StatusResult<SessionOutputHandle>;

    fn free_session_output(&self, output: SessionOutputHandle);

    fn container_add(
        &self,
        container: ContainerHandle,
        output: SessionOutputHandle,
    ) -> StatusResult<()>;

    fn container_remove(
        &self,
        container: ContainerHandle,
        output: SessionOutputHandle,
    ) -> StatusResult<()>;

    fn create_output_target(&self, window: WindowHandle) -> StatusResult<OutputTargetHandle>;

    fn free_output_target(&self, target: OutputTargetHandle);

    // Requests

    fn create_capture_request(
        &self,
        device: DeviceHandle,
        template: RequestTemplate,
    ) -> StatusResult<RequestHandle>;

    fn free_capture_request(&self, request: RequestHandle);

    fn request_add_target(
        &self,
        request: RequestHandle,
        target: OutputTargetHandle,
    ) -> StatusResult<()>;

    fn request_remove_target(
        &self,
        request: RequestHandle,
        target: OutputTargetHandle,
    ) -> StatusResult<()>;

    // Sessions

    /// Create a session; its state transitions are reported to `listener`
    fn create_capture_session(
        &self,
        device: DeviceHandle,
        container: ContainerHandle,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<SessionHandle>;

    fn close_capture_session(&self, session: SessionHandle);

    /// Submit a request to be repeated until stopped; returns the sequence id
    fn set_repeating_request(
        &self,
        session: SessionHandle,
        request: RequestHandle,
    ) -> StatusResult<i32>;

    fn stop_repeating(&self, session: SessionHandle) -> StatusResult<()>;

    /// Submit a single request; returns the sequence id
    fn capture(&self, session: SessionHandle, request: RequestHandle) -> StatusResult<i32>;
}

/// A drawable window owned by the compositor
pub trait NativeWindow: Send + Sync {
    /// Handle under which the camera subsystem knows this window
    fn handle(&self) -> WindowHandle;

    /// Shape the window was allocated with
    fn format(&self) -> ImageFormat;

    /// Take an extra reference on the window
    fn acquire(&self);

    /// Drop a reference taken with [`acquire`](Self::acquire)
    fn release(&self);

    /// The buffer most recently queued by the producer, without blocking
    fn last_queued_buffer(&self) -> Option<FrameBuffer>;
}

/// Compositor that hands out drawable windows
pub trait SurfaceProvider: Send + Sync {
    fn create_surface(
        &self,
        name: &str,
        format: ImageFormat,
    ) -> crate::error::Result<Arc<dyn NativeWindow>>;
}
