//! Capture session controller
//!
//! Owns the camera device, the output container, the stream bindings and
//! the capture session, and drives them through their lifecycle:
//!
//! ```text
//! init ──▶ create_session ──▶ start_preview(true) ──▶ latest_frame ...
//!                                                        │
//!                               teardown ◀── start_preview(false)
//! ```
//!
//! Setup failures are returned to the caller, which is expected to treat
//! them as fatal. Asynchronous notifications never fail a call; they only
//! update the [`SessionTracker`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{CameraBackend, SurfaceProvider};
use crate::binding::{StreamSpec, StreamTable};
use crate::error::{CameraError, Result, StatusExt};
use crate::frame::{FrameAccessor, FrameStats};
use crate::registry::{self, DeviceRegistry};
use crate::session::SessionTracker;
use crate::types::{
    ContainerHandle, DeviceDescriptor, DeviceHandle, FrameBuffer, ImageFormat, LensFacing,
    PixelFormat, SessionHandle, SessionState, StreamRole,
};

/// Surface name used for the preview stream
pub const PREVIEW_SURFACE_NAME: &str = "aperture-preview";

/// Surface name used for the still-capture stream
pub const STILL_SURFACE_NAME: &str = "aperture-still";

/// Lifecycle controller for one camera and its capture session
pub struct CameraController {
    backend: Arc<dyn CameraBackend>,
    surfaces: Arc<dyn SurfaceProvider>,
    tracker: Arc<SessionTracker>,
    /// Selected device
    device: Option<DeviceDescriptor>,
    /// Open device handle
    device_handle: Option<DeviceHandle>,
    availability_registered: bool,
    manager_released: bool,
    container: Option<ContainerHandle>,
    streams: StreamTable,
    session: Option<SessionHandle>,
    preview: Option<FrameAccessor>,
}

impl CameraController {
    /// Create a controller on top of a camera backend and a compositor
    pub fn new(backend: Arc<dyn CameraBackend>, surfaces: Arc<dyn SurfaceProvider>) -> Self {
        Self {
            backend,
            surfaces,
            tracker: SessionTracker::new(),
            device: None,
            device_handle: None,
            availability_registered: false,
            manager_released: false,
            container: None,
            streams: StreamTable::new(),
            session: None,
            preview: None,
        }
    }

    /// Select a device, open it and start listening for availability changes
    pub fn init<F>(&mut self, selector: F) -> Result<DeviceDescriptor>
    where
        F: Fn(&DeviceDescriptor) -> bool,
    {
        if self.manager_released {
            return Err(CameraError::TornDown);
        }
        if self.device_handle.is_some() {
            return Err(CameraError::AlreadyInitialized);
        }

        let device = DeviceRegistry::new(self.backend.as_ref()).enumerate(selector)?;

        let handle = self
            .backend
            .open_device(&device.id, self.tracker.listener())
            .call("open_device")?;
        self.device_handle = Some(handle);
        self.device = Some(device.clone());
        info!("Opened {} as {}", device, handle);

        self.backend
            .register_availability_listener(self.tracker.listener())
            .call("register_availability_callback")?;
        self.availability_registered = true;

        Ok(device)
    }

    /// Open the first camera facing `facing`
    pub fn init_facing(&mut self, facing: LensFacing) -> Result<DeviceDescriptor> {
        self.init(registry::facing(facing))
    }

    /// Bind `streams` and create a capture session over them
    ///
    /// The session starts out READY; the subsystem confirms asynchronously.
    /// A second call while a session exists fails with
    /// `SessionAlreadyExists`. On failure every stream bound by this call
    /// is unbound and the container freed, so the call can be retried.
    pub fn create_session(&mut self, streams: &[StreamSpec]) -> Result<()> {
        let device = self.device_handle.ok_or(CameraError::NotInitialized)?;
        if self.session.is_some() {
            return Err(CameraError::SessionAlreadyExists);
        }

        let container = self
            .backend
            .create_output_container()
            .call("create_output_container")?;

        let created = self
            .streams
            .bind(self.backend.as_ref(), device, container, streams)
            .and_then(|()| {
                self.backend
                    .create_capture_session(device, container, self.tracker.listener())
                    .call("create_capture_session")
            });
        let session = match created {
            Ok(session) => session,
            Err(err) => {
                warn!("Session setup failed, releasing bound streams: {}", err);
                self.streams.unbind(self.backend.as_ref(), container);
                self.backend.free_output_container(container);
                return Err(err);
            }
        };

        self.container = Some(container);
        self.session = Some(session);
        self.tracker.adopt(session);

        self.preview = self
            .streams
            .get(StreamRole::Preview)
            .map(|binding| FrameAccessor::new(binding.window().clone()));

        info!(
            "Created {} with streams [{}]",
            session,
            self.streams
                .roles()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// Allocate a YUV preview surface and a JPEG still surface of the given
    /// size and create a session over them
    pub fn create_session_with_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.create_session_with_formats(
            ImageFormat::new(width, height, PixelFormat::Yuv420),
            Some(ImageFormat::new(width, height, PixelFormat::Jpeg)),
        )
    }

    /// Allocate surfaces in the given formats and create a session over them
    pub fn create_session_with_formats(
        &mut self,
        preview: ImageFormat,
        still: Option<ImageFormat>,
    ) -> Result<()> {
        if self.device_handle.is_none() {
            return Err(CameraError::NotInitialized);
        }
        if self.session.is_some() {
            return Err(CameraError::SessionAlreadyExists);
        }

        let mut streams = vec![StreamSpec::preview(
            self.surfaces.create_surface(PREVIEW_SURFACE_NAME, preview)?,
        )];
        if let Some(still) = still {
            streams.push(StreamSpec::still_capture(
                self.surfaces.create_surface(STILL_SURFACE_NAME, still)?,
            ));
        }

        self.create_session(&streams)
    }

    /// Start (`true`) or stop (`false`) the repeating preview request
    ///
    /// Starting is accepted in any tracked state; the subsystem validates
    /// readiness itself. Stopping requires the session to be ACTIVE.
    pub fn start_preview(&mut self, enable: bool) -> Result<()> {
        let session = self.session.ok_or(CameraError::NoSession)?;

        if enable {
            let request = self.streams.require(StreamRole::Preview)?.request();
            let sequence = self
                .backend
                .set_repeating_request(session, request)
                .call("set_repeating_request")?;
            info!("Preview started (sequence {})", sequence);
            return Ok(());
        }

        let actual = self.tracker.state();
        if actual != SessionState::Active {
            return Err(CameraError::StateConflict {
                expected: SessionState::Active,
                actual,
            });
        }

        self.backend
            .stop_repeating(session)
            .call("stop_repeating")?;
        info!("Preview stop requested");
        Ok(())
    }

    /// Submit a single still-capture request; returns its sequence id
    pub fn capture_still(&mut self) -> Result<i32> {
        let session = self.session.ok_or(CameraError::NoSession)?;
        let request = self.streams.require(StreamRole::StillCapture)?.request();

        let sequence = self
            .backend
            .capture(session, request)
            .call("capture")?;
        debug!("Still capture submitted (sequence {})", sequence);
        Ok(sequence)
    }

    /// Most recent buffer queued on the preview surface, without blocking
    pub fn latest_frame(&self) -> Option<FrameBuffer> {
        self.preview.as_ref().and_then(FrameAccessor::latest)
    }

    /// Release everything in dependency order
    ///
    /// Safe to call repeatedly; each release happens at most once.
    pub fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            if self.tracker.state() == SessionState::Active {
                if let Err(status) = self.backend.stop_repeating(session) {
                    warn!("stop_repeating failed during teardown: {}", status);
                }
            }
            self.backend.close_capture_session(session);
            debug!("Closed {}", session);
        }

        self.preview = None;

        if let Some(container) = self.container.take() {
            self.streams.unbind(self.backend.as_ref(), container);
            self.backend.free_output_container(container);
        }

        if let Some(device) = self.device_handle.take() {
            if let Err(status) = self.backend.close_device(device) {
                warn!("close_device failed: {}", status);
            }
            info!("Closed {}", device);
        }

        if self.availability_registered {
            if let Err(status) = self.backend.unregister_availability_listener() {
                warn!("unregister_availability_callback failed: {}", status);
            }
            self.availability_registered = false;
        }

        if !self.manager_released {
            self.backend.release_manager();
            self.manager_released = true;
            debug!("Camera manager released");
        }
    }

    /// Tracked session state
    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    /// State holder shared with the subsystem's callbacks
    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    /// Selected device, once initialized
    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.device_handle.is_some()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.session
    }

    pub fn streams(&self) -> &StreamTable {
        &self.streams
    }

    /// Reader of the preview surface, once a session with a preview exists
    pub fn frame_accessor(&self) -> Option<&FrameAccessor> {
        self.preview.as_ref()
    }

    /// Bookkeeping of the preview frame accessor
    pub fn frame_stats(&self) -> Option<FrameStats> {
        self.preview.as_ref().map(FrameAccessor::stats)
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.teardown();
    }
}
