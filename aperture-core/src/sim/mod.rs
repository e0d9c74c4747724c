//! In-process camera service
//!
//! [`SimulatedCamera`] implements [`CameraBackend`] on top of plain maps and
//! a dispatcher thread. Like the real service it delivers every
//! notification from its own thread, after the call that caused it has
//! returned, and it produces frames into the target windows while a
//! repeating request is active.
//!
//! Sessions are created idle. `Active` is reported when a repeating request
//! starts, `Ready` when it stops and `Closed` when the session is closed or
//! evicted by a newer session on the same device.

mod surface;

pub use surface::{SimulatedSurfaces, SimulatedWindow};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::backend::{CameraBackend, CameraEventListener, NativeWindow, StatusResult};
use crate::error::{CameraError, Result};
use crate::status::{CameraStatus, DeviceError};
use crate::types::{
    CameraMetadata, ContainerHandle, DeviceHandle, LensFacing, OutputTargetHandle, RequestHandle,
    RequestTemplate, SessionHandle, SessionOutputHandle, SessionState, WindowHandle,
};

/// A camera exposed by the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedDevice {
    pub id: String,
    pub facing: LensFacing,
    #[serde(default)]
    pub sensor_orientation: i32,
    #[serde(default = "default_output_sizes")]
    pub output_sizes: Vec<(u32, u32)>,
}

fn default_output_sizes() -> Vec<(u32, u32)> {
    vec![(640, 480), (1280, 720), (1920, 1080)]
}

impl SimulatedDevice {
    pub fn new(id: impl Into<String>, facing: LensFacing) -> Self {
        Self {
            id: id.into(),
            facing,
            sensor_orientation: 0,
            output_sizes: default_output_sizes(),
        }
    }

    fn metadata(&self) -> CameraMetadata {
        CameraMetadata {
            lens_facing: Some(self.facing),
            sensor_orientation: Some(self.sensor_orientation),
            output_sizes: self.output_sizes.clone(),
        }
    }
}

/// Simulator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Frames per second produced while a repeating request is active
    pub fps: u32,
    /// Cameras visible to the process
    pub devices: Vec<SimulatedDevice>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            devices: vec![
                SimulatedDevice {
                    sensor_orientation: 90,
                    ..SimulatedDevice::new("0", LensFacing::Back)
                },
                SimulatedDevice {
                    sensor_orientation: 270,
                    ..SimulatedDevice::new("1", LensFacing::Front)
                },
            ],
        }
    }
}

impl SimulatorConfig {
    /// Interval between two produced frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

/// Build a simulated camera service and the compositor it draws into
pub fn simulated(
    config: SimulatorConfig,
) -> Result<(Arc<SimulatedCamera>, Arc<SimulatedSurfaces>)> {
    let surfaces = SimulatedSurfaces::new();
    let camera = SimulatedCamera::new(config, surfaces.clone())?;
    Ok((Arc::new(camera), surfaces))
}

/// Work handed to the dispatcher thread
enum Event {
    Transition {
        listener: Arc<dyn CameraEventListener>,
        session: SessionHandle,
        state: SessionState,
    },
    DeviceError {
        listener: Arc<dyn CameraEventListener>,
        device: DeviceHandle,
        error: DeviceError,
    },
    Availability {
        listener: Arc<dyn CameraEventListener>,
        camera_id: String,
        available: bool,
    },
    Repeat {
        session: SessionHandle,
        windows: Vec<Arc<SimulatedWindow>>,
    },
    StopRepeat {
        session: SessionHandle,
    },
    Capture {
        windows: Vec<Arc<SimulatedWindow>>,
    },
}

struct OpenDevice {
    camera_id: String,
    listener: Arc<dyn CameraEventListener>,
}

struct Request {
    targets: Vec<OutputTargetHandle>,
}

struct Session {
    device: DeviceHandle,
    container: ContainerHandle,
    listener: Arc<dyn CameraEventListener>,
}

/// Objects currently alive inside the simulated service
#[derive(Default)]
struct ServiceState {
    released: bool,
    availability: Option<Arc<dyn CameraEventListener>>,
    devices: HashMap<DeviceHandle, OpenDevice>,
    containers: HashMap<ContainerHandle, Vec<SessionOutputHandle>>,
    outputs: HashMap<SessionOutputHandle, WindowHandle>,
    targets: HashMap<OutputTargetHandle, WindowHandle>,
    requests: HashMap<RequestHandle, Request>,
    sessions: HashMap<SessionHandle, Session>,
    repeating: Option<SessionHandle>,
    next_sequence: i32,
}

impl ServiceState {
    fn live_objects(&self) -> usize {
        self.devices.len()
            + self.containers.len()
            + self.outputs.len()
            + self.targets.len()
            + self.requests.len()
            + self.sessions.len()
    }

    fn next_sequence(&mut self) -> i32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }
}

/// Simulated camera service
pub struct SimulatedCamera {
    config: SimulatorConfig,
    surfaces: Arc<SimulatedSurfaces>,
    state: Mutex<ServiceState>,
    events: Mutex<Option<mpsc::Sender<Event>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedCamera {
    /// Start the service and its dispatcher thread
    pub fn new(config: SimulatorConfig, surfaces: Arc<SimulatedSurfaces>) -> Result<Self> {
        if config.fps == 0 {
            return Err(CameraError::config("Simulator fps must be greater than zero"));
        }

        let (tx, rx) = mpsc::channel();
        let interval = config.frame_interval();

        let dispatcher = std::thread::Builder::new()
            .name("aperture-camera-dispatch".to_string())
            .spawn(move || run_dispatcher(rx, interval))
            .map_err(|e| CameraError::from(e).with_context("Failed to spawn camera dispatcher"))?;

        info!(
            "Simulated camera service started ({} device(s), {} fps)",
            config.devices.len(),
            config.fps
        );

        Ok(Self {
            config,
            surfaces,
            state: Mutex::new(ServiceState::default()),
            events: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Compositor whose windows this service draws into
    pub fn surfaces(&self) -> &Arc<SimulatedSurfaces> {
        &self.surfaces
    }

    /// Number of handles created and not yet freed
    pub fn live_objects(&self) -> usize {
        self.state.lock().live_objects()
    }

    /// Whether the manager has been released
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Report `camera_id` as unplugged: every open device on it gets a
    /// `Disconnected` error and the availability listener is told it is gone
    pub fn disconnect(&self, camera_id: &str) {
        let state = self.state.lock();
        for (device, open) in state.devices.iter().filter(|(_, d)| d.camera_id == camera_id) {
            self.send(Event::DeviceError {
                listener: open.listener.clone(),
                device: *device,
                error: DeviceError::Disconnected,
            });
        }
        if let Some(listener) = &state.availability {
            self.send(Event::Availability {
                listener: listener.clone(),
                camera_id: camera_id.to_string(),
                available: false,
            });
        }
    }

    /// Raise a device error on an open device
    pub fn inject_device_error(&self, device: DeviceHandle, error: DeviceError) {
        let state = self.state.lock();
        match state.devices.get(&device) {
            Some(open) => self.send(Event::DeviceError {
                listener: open.listener.clone(),
                device,
                error,
            }),
            None => warn!("Cannot inject {} into unknown {}", error, device),
        }
    }

    /// Stop the dispatcher after it has delivered every queued event
    pub fn shutdown(&self) {
        // Dropping the sender lets the dispatcher drain and exit
        self.events.lock().take();

        if let Some(thread) = self.dispatcher.lock().take() {
            if thread.join().is_err() {
                error!("Camera dispatcher panicked");
            }
            debug!("Camera dispatcher stopped");
        }
    }

    fn send(&self, event: Event) {
        match self.events.lock().as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("Camera dispatcher is gone; event dropped");
                }
            }
            None => trace!("Service shut down; event dropped"),
        }
    }

    fn find_device(&self, camera_id: &str) -> Option<&SimulatedDevice> {
        self.config.devices.iter().find(|d| d.id == camera_id)
    }

    fn check_live(state: &ServiceState) -> StatusResult<()> {
        if state.released {
            Err(CameraStatus::InvalidOperation)
        } else {
            Ok(())
        }
    }

    /// Windows targeted by `request`, which must all be outputs of `session`
    fn resolve_targets(
        &self,
        state: &ServiceState,
        session: SessionHandle,
        request: RequestHandle,
    ) -> StatusResult<Vec<Arc<SimulatedWindow>>> {
        let session = state
            .sessions
            .get(&session)
            .ok_or(CameraStatus::SessionClosed)?;
        let request = state
            .requests
            .get(&request)
            .ok_or(CameraStatus::InvalidParameter)?;
        if request.targets.is_empty() {
            return Err(CameraStatus::InvalidParameter);
        }

        let configured: Vec<WindowHandle> = state
            .containers
            .get(&session.container)
            .map(|outputs| {
                outputs
                    .iter()
                    .filter_map(|o| state.outputs.get(o).copied())
                    .collect()
            })
            .unwrap_or_default();

        request
            .targets
            .iter()
            .map(|target| {
                let window = state
                    .targets
                    .get(target)
                    .copied()
                    .ok_or(CameraStatus::InvalidParameter)?;
                if !configured.contains(&window) {
                    warn!("{} is not an output of the session", window);
                    return Err(CameraStatus::InvalidParameter);
                }
                self.surfaces
                    .window(window)
                    .ok_or(CameraStatus::InvalidParameter)
            })
            .collect()
    }

    /// Remove a session and report it closed
    fn evict_session(&self, state: &mut ServiceState, session: SessionHandle) {
        if let Some(record) = state.sessions.remove(&session) {
            if state.repeating == Some(session) {
                state.repeating = None;
                self.send(Event::StopRepeat { session });
            }
            self.send(Event::Transition {
                listener: record.listener,
                session,
                state: SessionState::Closed,
            });
        }
    }
}

impl CameraBackend for SimulatedCamera {
    fn camera_ids(&self) -> StatusResult<Vec<String>> {
        Self::check_live(&self.state.lock())?;
        Ok(self.config.devices.iter().map(|d| d.id.clone()).collect())
    }

    fn characteristics(&self, camera_id: &str) -> StatusResult<CameraMetadata> {
        Self::check_live(&self.state.lock())?;
        self.find_device(camera_id)
            .map(SimulatedDevice::metadata)
            .ok_or(CameraStatus::InvalidParameter)
    }

    fn open_device(
        &self,
        camera_id: &str,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<DeviceHandle> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        if self.find_device(camera_id).is_none() {
            return Err(CameraStatus::InvalidParameter);
        }
        if state.devices.values().any(|d| d.camera_id == camera_id) {
            return Err(CameraStatus::CameraInUse);
        }

        let device = DeviceHandle::new();
        state.devices.insert(
            device,
            OpenDevice {
                camera_id: camera_id.to_string(),
                listener,
            },
        );
        if let Some(availability) = &state.availability {
            self.send(Event::Availability {
                listener: availability.clone(),
                camera_id: camera_id.to_string(),
                available: false,
            });
        }
        debug!("Opened camera {} as {}", camera_id, device);
        Ok(device)
    }

    fn close_device(&self, device: DeviceHandle) -> StatusResult<()> {
        let mut state = self.state.lock();
        let open = state
            .devices
            .remove(&device)
            .ok_or(CameraStatus::InvalidParameter)?;

        let orphaned: Vec<SessionHandle> = state
            .sessions
            .iter()
            .filter(|(_, s)| s.device == device)
            .map(|(h, _)| *h)
            .collect();
        for session in orphaned {
            self.evict_session(&mut state, session);
        }

        if let Some(availability) = &state.availability {
            self.send(Event::Availability {
                listener: availability.clone(),
                camera_id: open.camera_id.clone(),
                available: true,
            });
        }
        debug!("Closed {} (camera {})", device, open.camera_id);
        Ok(())
    }

    fn register_availability_listener(
        &self,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<()> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        state.availability = Some(listener);
        Ok(())
    }

    fn unregister_availability_listener(&self) -> StatusResult<()> {
        let mut state = self.state.lock();
        match state.availability.take() {
            Some(_) => Ok(()),
            None => Err(CameraStatus::InvalidParameter),
        }
    }

    fn release_manager(&self) {
        {
            let mut state = self.state.lock();
            if state.released {
                warn!("Camera manager released twice");
                return;
            }
            state.released = true;
            let leaked = state.live_objects();
            if leaked > 0 {
                warn!("Camera manager released with {} live object(s)", leaked);
            }
        }
        self.shutdown();
    }

    fn create_output_container(&self) -> StatusResult<ContainerHandle> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        let container = ContainerHandle::new();
        state.containers.insert(container, Vec::new());
        Ok(container)
    }

    fn free_output_container(&self, container: ContainerHandle) {
        if self.state.lock().containers.remove(&container).is_none() {
            warn!("Freeing unknown {}", container);
        }
    }

    fn create_session_output(&self, window: WindowHandle) -> StatusResult<SessionOutputHandle> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        if self.surfaces.window(window).is_none() {
            return Err(CameraStatus::InvalidParameter);
        }
        let output = SessionOutputHandle::new();
        state.outputs.insert(output, window);
        Ok(output)
    }

    fn free_session_output(&self, output: SessionOutputHandle) {
        if self.state.lock().outputs.remove(&output).is_none() {
            warn!("Freeing unknown {}", output);
        }
    }

    fn container_add(
        &self,
        container: ContainerHandle,
        output: SessionOutputHandle,
    ) -> StatusResult<()> {
        let mut state = self.state.lock();
        if !state.outputs.contains_key(&output) {
            return Err(CameraStatus::InvalidParameter);
        }
        let outputs = state
            .containers
            .get_mut(&container)
            .ok_or(CameraStatus::InvalidParameter)?;
        if !outputs.contains(&output) {
            outputs.push(output);
        }
        Ok(())
    }

    fn container_remove(
        &self,
        container: ContainerHandle,
        output: SessionOutputHandle,
    ) -> StatusResult<()> {
        let mut state = self.state.lock();
        let outputs = state
            .containers
            .get_mut(&container)
            .ok_or(CameraStatus::InvalidParameter)?;
        outputs.retain(|o| *o != output);
        Ok(())
    }

    fn create_output_target(&self, window: WindowHandle) -> StatusResult<OutputTargetHandle> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        if self.surfaces.window(window).is_none() {
            return Err(CameraStatus::InvalidParameter);
        }
        let target = OutputTargetHandle::new();
        state.targets.insert(target, window);
        Ok(target)
    }

    fn free_output_target(&self, target: OutputTargetHandle) {
        if self.state.lock().targets.remove(&target).is_none() {
            warn!("Freeing unknown {}", target);
        }
    }

    fn create_capture_request(
        &self,
        device: DeviceHandle,
        template: RequestTemplate,
    ) -> StatusResult<RequestHandle> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        if !state.devices.contains_key(&device) {
            return Err(CameraStatus::CameraDisconnected);
        }
        let request = RequestHandle::new();
        state.requests.insert(
            request,
            Request {
                targets: Vec::new(),
            },
        );
        trace!("Created {:?} request {}", template, request);
        Ok(request)
    }

    fn free_capture_request(&self, request: RequestHandle) {
        if self.state.lock().requests.remove(&request).is_none() {
            warn!("Freeing unknown {}", request);
        }
    }

    fn request_add_target(
        &self,
        request: RequestHandle,
        target: OutputTargetHandle,
    ) -> StatusResult<()> {
        let mut state = self.state.lock();
        if !state.targets.contains_key(&target) {
            return Err(CameraStatus::InvalidParameter);
        }
        let request = state
            .requests
            .get_mut(&request)
            .ok_or(CameraStatus::InvalidParameter)?;
        if !request.targets.contains(&target) {
            request.targets.push(target);
        }
        Ok(())
    }

    fn request_remove_target(
        &self,
        request: RequestHandle,
        target: OutputTargetHandle,
    ) -> StatusResult<()> {
        let mut state = self.state.lock();
        let request = state
            .requests
            .get_mut(&request)
            .ok_or(CameraStatus::InvalidParameter)?;
        request.targets.retain(|t| *t != target);
        Ok(())
    }

    fn create_capture_session(
        &self,
        device: DeviceHandle,
        container: ContainerHandle,
        listener: Arc<dyn CameraEventListener>,
    ) -> StatusResult<SessionHandle> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        if !state.devices.contains_key(&device) {
            return Err(CameraStatus::CameraDisconnected);
        }
        match state.containers.get(&container) {
            Some(outputs) if !outputs.is_empty() => {}
            _ => return Err(CameraStatus::InvalidParameter),
        }

        let evicted: Vec<SessionHandle> = state
            .sessions
            .iter()
            .filter(|(_, s)| s.device == device)
            .map(|(h, _)| *h)
            .collect();
        for previous in evicted {
            debug!("{} evicted by a new session", previous);
            self.evict_session(&mut state, previous);
        }

        let session = SessionHandle::new();
        state.sessions.insert(
            session,
            Session {
                device,
                container,
                listener,
            },
        );
        debug!("Created {} on {}", session, device);
        Ok(session)
    }

    fn close_capture_session(&self, session: SessionHandle) {
        let mut state = self.state.lock();
        if !state.sessions.contains_key(&session) {
            warn!("Closing unknown {}", session);
            return;
        }
        self.evict_session(&mut state, session);
    }

    fn set_repeating_request(
        &self,
        session: SessionHandle,
        request: RequestHandle,
    ) -> StatusResult<i32> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        let windows = self.resolve_targets(&state, session, request)?;
        let sequence = state.next_sequence();

        let was_repeating = state.repeating.replace(session) == Some(session);
        if !was_repeating {
            if let Some(record) = state.sessions.get(&session) {
                self.send(Event::Transition {
                    listener: record.listener.clone(),
                    session,
                    state: SessionState::Active,
                });
            }
        }
        self.send(Event::Repeat { session, windows });
        Ok(sequence)
    }

    fn stop_repeating(&self, session: SessionHandle) -> StatusResult<()> {
        let mut state = self.state.lock();
        let listener = state
            .sessions
            .get(&session)
            .map(|s| s.listener.clone())
            .ok_or(CameraStatus::SessionClosed)?;

        if state.repeating == Some(session) {
            state.repeating = None;
            self.send(Event::StopRepeat { session });
            self.send(Event::Transition {
                listener,
                session,
                state: SessionState::Ready,
            });
        }
        Ok(())
    }

    fn capture(&self, session: SessionHandle, request: RequestHandle) -> StatusResult<i32> {
        let mut state = self.state.lock();
        Self::check_live(&state)?;
        let windows = self.resolve_targets(&state, session, request)?;
        let sequence = state.next_sequence();
        self.send(Event::Capture { windows });
        Ok(sequence)
    }
}

impl Drop for SimulatedCamera {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Dispatcher loop: delivers notifications in order and produces frames
/// while a repeating request is active
fn run_dispatcher(rx: mpsc::Receiver<Event>, interval: Duration) {
    let mut repeating: Option<(SessionHandle, Vec<Arc<SimulatedWindow>>)> = None;
    let mut next_frame = Instant::now();

    loop {
        let event = if repeating.is_some() {
            let wait = next_frame.saturating_duration_since(Instant::now());
            match rx.recv_timeout(wait) {
                Ok(event) => event,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Some((_, windows)) = &repeating {
                        for window in windows {
                            produce_frame(window);
                        }
                    }
                    next_frame += interval;
                    continue;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            }
        };

        match event {
            Event::Transition {
                listener,
                session,
                state,
            } => listener.on_session_transition(session, state),
            Event::DeviceError {
                listener,
                device,
                error,
            } => listener.on_device_error(device, error),
            Event::Availability {
                listener,
                camera_id,
                available,
            } => listener.on_availability_changed(&camera_id, available),
            Event::Repeat { session, windows } => {
                next_frame = Instant::now() + interval;
                repeating = Some((session, windows));
            }
            Event::StopRepeat { session } => {
                if repeating.as_ref().is_some_and(|(s, _)| *s == session) {
                    repeating = None;
                }
            }
            Event::Capture { windows } => {
                for window in &windows {
                    produce_frame(window);
                }
            }
        }
    }

    trace!("Camera dispatcher exiting");
}

/// Queue one synthetic buffer on `window`
fn produce_frame(window: &SimulatedWindow) {
    let format = window.format();
    let shade = (window.queued() % 256) as u8;

    let data = match format.format.frame_size(format.width, format.height) {
        Some(size) => Bytes::from(vec![shade; size]),
        None => synthetic_jpeg(shade),
    };
    window.queue(data);
}

/// Smallest byte sequence that starts and ends like a JPEG stream
fn synthetic_jpeg(shade: u8) -> Bytes {
    Bytes::from(vec![0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x03, shade, 0xFF, 0xD9])
}
