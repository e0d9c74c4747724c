//! Mock infrastructure for testing
//!
//! Provides a recording camera backend, mock windows and helpers to fire
//! subsystem notifications by hand.

#![allow(dead_code)]

use aperture_core::backend::{
    CameraBackend, CameraEventListener, NativeWindow, StatusResult, SurfaceProvider,
};
use aperture_core::status::CameraStatus;
use aperture_core::types::{
    CameraMetadata, ContainerHandle, DeviceHandle, FrameBuffer, ImageFormat, LensFacing,
    OutputTargetHandle, PixelFormat, RequestHandle, RequestTemplate, SessionHandle,
    SessionOutputHandle, SessionState, WindowHandle,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Create/free call pairs whose counts must match after teardown
pub const PAIRED_CALLS: &[(&str, &str)] = &[
    ("open_device", "close_device"),
    ("create_output_container", "free_output_container"),
    ("create_session_output", "free_session_output"),
    ("container_add", "container_remove"),
    ("create_output_target", "free_output_target"),
    ("create_capture_request", "free_capture_request"),
    ("request_add_target", "request_remove_target"),
    ("create_capture_session", "close_capture_session"),
    ("register_availability_listener", "unregister_availability_listener"),
];

/// A camera as seen by the mock backend
#[derive(Clone)]
pub struct MockDevice {
    pub id: String,
    pub metadata: StatusResult<CameraMetadata>,
}

impl MockDevice {
    pub fn new(id: &str, facing: LensFacing) -> Self {
        Self {
            id: id.to_string(),
            metadata: Ok(CameraMetadata::with_facing(facing)),
        }
    }

    /// Device whose characteristics cannot be read
    pub fn unreadable(id: &str, status: CameraStatus) -> Self {
        Self {
            id: id.to_string(),
            metadata: Err(status),
        }
    }

    /// Device whose metadata carries no lens facing
    pub fn without_facing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            metadata: Ok(CameraMetadata::default()),
        }
    }
}

struct Failure {
    nth: usize,
    status: CameraStatus,
}

#[derive(Default)]
struct Recorder {
    calls: Vec<&'static str>,
    failed: Vec<&'static str>,
    attempts: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, Failure>,
    device_listener: Option<Arc<dyn CameraEventListener>>,
    availability_listener: Option<Arc<dyn CameraEventListener>>,
    session_listener: Option<Arc<dyn CameraEventListener>>,
    last_session: Option<SessionHandle>,
    last_device: Option<DeviceHandle>,
    next_sequence: i32,
}

/// Camera backend recording every call it receives
pub struct MockBackend {
    devices: Vec<MockDevice>,
    inner: Mutex<Recorder>,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Arc<Self> {
        Arc::new(Self {
            devices,
            inner: Mutex::new(Recorder::default()),
        })
    }

    /// Backend with camera "0" facing back and camera "1" facing front
    pub fn with_default_devices() -> Arc<Self> {
        Self::new(vec![
            MockDevice::new("0", LensFacing::Back),
            MockDevice::new("1", LensFacing::Front),
        ])
    }

    /// Make the `nth` (1-based) invocation of `call` return `status`
    pub fn fail_at(&self, call: &'static str, nth: usize, status: CameraStatus) {
        self.inner.lock().failures.insert(call, Failure { nth, status });
    }

    /// Names of every call that succeeded, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().calls.clone()
    }

    /// Names of every call failed on purpose, in order
    pub fn failed_calls(&self) -> Vec<&'static str> {
        self.inner.lock().failed.clone()
    }

    /// Number of times `call` succeeded
    pub fn count(&self, call: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Position of the first `call` in the call log
    pub fn position(&self, call: &str) -> Option<usize> {
        self.inner.lock().calls.iter().position(|c| *c == call)
    }

    /// Position of the last `call` in the call log
    pub fn last_position(&self, call: &str) -> Option<usize> {
        self.inner.lock().calls.iter().rposition(|c| *c == call)
    }

    pub fn last_session(&self) -> Option<SessionHandle> {
        self.inner.lock().last_session
    }

    pub fn last_device(&self) -> Option<DeviceHandle> {
        self.inner.lock().last_device
    }

    /// Assert that every create call was matched by its free call
    pub fn assert_balanced(&self) {
        for (create, free) in PAIRED_CALLS {
            assert_eq!(
                self.count(create),
                self.count(free),
                "{} / {} are unbalanced",
                create,
                free
            );
        }
    }

    /// Deliver a transition for the most recent session, as the subsystem would
    pub fn fire_transition(&self, state: SessionState) {
        let session = self.last_session().expect("no session created");
        self.fire_transition_for(session, state);
    }

    /// Deliver a transition naming an arbitrary session
    pub fn fire_transition_for(&self, session: SessionHandle, state: SessionState) {
        let listener = self
            .inner
            .lock()
            .session_listener
            .clone()
            .expect("no session listener registered");
        listener.on_session_transition(session, state);
    }

    /// Deliver a device error through the listener attached at open
    pub fn fire_device_error(&self, error: aperture_core::DeviceError) {
        let (listener, device) = {
            let inner = self.inner.lock();
            (
                inner.device_listener.clone().expect("no device listener"),
                inner.last_device.expect("no device opened"),
            )
        };
        listener.on_device_error(device, error);
    }

    /// Deliver an availability change
    pub fn fire_availability(&self, camera_id: &str, available: bool) {
        let listener = self
            .inner
            .lock()
            .availability_listener
            .clone()
            .expect("no availability listener");
        listener.on_availability_changed(camera_id, available);
    }

    /// Log a call and apply any configured failure
    ///
    /// Failed calls are kept out of the main log, so create/free counts
    /// only see objects that were actually created.
    fn record(&self, call: &'static str) -> StatusResult<()> {
        let mut inner = self.inner.lock();
        let attempt = {
            let attempts = inner.attempts.entry(call).or_insert(0);
            *attempts += 1;
            *attempts
        };
        let status = match inner.failures.get(call) {
            Some(failure) if failure.nth == attempt => Some(failure.status),
            _ => None,
        };
        match status {
            Some(status) => {
                inner.failed.push(call);
                Err(status)
            }
            None => {
                inner.calls.push(call);
                Ok(())
            }
        }
    }
}

impl CameraBackend for MockBackend {
    fn camera_ids(&self) -> StatusResult<Vec<String>> {
        self.record("camera_ids")?;
        Ok(self.devices.iter().map(|d| d.id.clone()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> StatusResult<CameraMetadata> {
        self.record("characteristics")?;
        self.devices
            .iter()
            .find(|d| d.id == camera_id)
            .map(|d| d.metadata.clone())
            .unwrap_or(Err(CameraStatus::InvalidParameter))
    }

    fn open_device(
        &self,
        _camera_id: &str,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<DeviceHandle> {
        self.record("open_device")?;
        let device = DeviceHandle::new();
        let mut inner = self.inner.lock();
        inner.device_listener = Some(listener);
        inner.last_device = Some(device);
        Ok(device)
    }

    fn close_device(&self, _device: DeviceHandle) -> StatusResult<()> {
        self.record("close_device")
    }

    fn register_availability_listener(
        &self,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<()> {
        self.record("register_availability_listener")?;
        self.inner.lock().availability_listener = Some(listener);
        Ok(())
    }

    fn unregister_availability_listener(&self) -> StatusResult<()> {
        self.record("unregister_availability_listener")
    }

    fn release_manager(&self) {
        let _ = self.record("release_manager");
    }

    fn create_output_container(&self) -> StatusResult<ContainerHandle> {
        self.record("create_output_container")?;
        Ok(ContainerHandle::new())
    }

    fn free_output_container(&self, _container: ContainerHandle) {
        let _ = self.record("free_output_container");
    }

    fn create_session_output(&self, _window: WindowHandle) -> StatusResult<SessionOutputHandle> {
        self.record("create_session_output")?;
        Ok(SessionOutputHandle::new())
    }

    fn free_session_output(&self, _output: SessionOutputHandle) {
        let _ = self.record("free_session_output");
    }

    fn container_add(
        &self,
        _container: ContainerHandle,
        _output: SessionOutputHandle,
    ) -> StatusResult<()> {
        self.record("container_add")
    }

    fn container_remove(
        &self,
        _container: ContainerHandle,
        _output: SessionOutputHandle,
    ) -> StatusResult<()> {
        self.record("container_remove")
    }

    fn create_output_target(&self, _window: WindowHandle) -> StatusResult<OutputTargetHandle> {
        self.record("create_output_target")?;
        Ok(OutputTargetHandle::new())
    }

    fn free_output_target(&self, _target: OutputTargetHandle) {
        let _ = self.record("free_output_target");
    }

    fn create_capture_request(
        &self,
        _device: DeviceHandle,
        _template: RequestTemplate,
    ) -> StatusResult<RequestHandle> {
        self.record("create_capture_request")?;
        Ok(RequestHandle::new())
    }

    fn free_capture_request(&self, _request: RequestHandle) {
        let _ = self.record("free_capture_request");
    }

    fn request_add_target(
        &self,
        _request: RequestHandle,
        _target: OutputTargetHandle,
    ) -> StatusResult<()> {
        self.record("request_add_target")
    }

    fn request_remove_target(
        &self,
        _request: RequestHandle,
        _target: OutputTargetHandle,
    ) -> StatusResult<()> {
        self.record("request_remove_target")
    }

    fn create_capture_session(
        &self,
        _device: DeviceHandle,
        _container: ContainerHandle,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<SessionHandle> {
        self.record("create_capture_session")?;
        let session = SessionHandle::new();
        let mut inner = self.inner.lock();
        inner.session_listener = Some(listener);
        inner.last_session = Some(session);
        Ok(session)
    }

    fn close_capture_session(&self, _session: SessionHandle) {
        let _ = self.record("close_capture_session");
    }

    fn set_repeating_request(
        &self,
        _session: SessionHandle,
        _request: RequestHandle,
    ) -> StatusResult<i32> {
        self.record("set_repeating_request")?;
        let mut inner = self.inner.lock();
        inner.next_sequence += 1;
        Ok(inner.next_sequence)
    }

    fn stop_repeating(&self, _session: SessionHandle) -> StatusResult<()> {
        self.record("stop_repeating")
    }

    fn capture(&self, _session: SessionHandle, _request: RequestHandle) -> StatusResult<i32> {
        self.record("capture")?;
        let mut inner = self.inner.lock();
        inner.next_sequence += 1;
        Ok(inner.next_sequence)
    }
}

/// Window counting the references taken on it
pub struct MockWindow {
    handle: WindowHandle,
    format: ImageFormat,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    last: Mutex<Option<FrameBuffer>>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Arc<Self> {
        Arc::new(Self {
            handle: WindowHandle::new(),
            format: ImageFormat::new(width, height, format),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// References currently held
    pub fn held(&self) -> usize {
        self.acquires() - self.releases()
    }

    /// Queue a buffer of the window's shape
    pub fn queue_buffer(&self, sequence: u64) -> FrameBuffer {
        let frame = create_test_frame(
            self.format.width,
            self.format.height,
            self.format.format,
            sequence,
        );
        *self.last.lock() = Some(frame.clone());
        frame
    }
}

impl NativeWindow for MockWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn acquire(&self) {
        self.acquires.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn last_queued_buffer(&self) -> Option<FrameBuffer> {
        self.last.lock().clone()
    }
}

/// Surface provider handing out [`MockWindow`]s and remembering them by name
#[derive(Default)]
pub struct MockSurfaces {
    windows: Mutex<Vec<(String, Arc<MockWindow>)>>,
}

impl MockSurfaces {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn window(&self, name: &str) -> Option<Arc<MockWindow>> {
        self.windows
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, w)| w.clone())
    }

    /// Windows handed out so far
    pub fn allocated(&self) -> usize {
        self.windows.lock().len()
    }

    /// References still held across every window
    pub fn held(&self) -> usize {
        self.windows.lock().iter().map(|(_, w)| w.held()).sum()
    }
}

impl SurfaceProvider for MockSurfaces {
    fn create_surface(
        &self,
        name: &str,
        format: ImageFormat,
    ) -> aperture_core::Result<Arc<dyn NativeWindow>> {
        let window = MockWindow::new(format.width, format.height, format.format);
        self.windows.lock().push((name.to_string(), window.clone()));
        Ok(window)
    }
}

/// Create a frame filled with a single value
pub fn create_test_frame(
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
) -> FrameBuffer {
    let size = format
        .frame_size(width, height)
        .unwrap_or(64);
    FrameBuffer::new(
        width,
        height,
        format,
        sequence,
        Bytes::from(vec![(sequence % 256) as u8; size]),
    )
}
