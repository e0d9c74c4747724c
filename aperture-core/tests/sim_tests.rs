//! End-to-end tests against the simulated camera service
//!
//! These run the controller against real asynchrony: every notification
//! arrives on the dispatcher thread.

use aperture_core::controller::STILL_SURFACE_NAME;
use aperture_core::registry::DeviceRegistry;
use aperture_core::sim::{self, SimulatorConfig};
use aperture_core::status::{CameraStatus, DeviceError};
use aperture_core::types::{LensFacing, PixelFormat, SessionState};
use aperture_core::{CameraController, CameraError, NativeWindow};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_config() -> SimulatorConfig {
    SimulatorConfig {
        fps: 100,
        ..SimulatorConfig::default()
    }
}

/// Poll `condition` until it holds or the timeout expires
fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_full_lifecycle() {
    let (camera, surfaces) = sim::simulated(fast_config()).unwrap();
    let mut controller = CameraController::new(camera.clone(), surfaces.clone());

    let device = controller.init_facing(LensFacing::Back).unwrap();
    assert_eq!(device.id, "0");

    controller.create_session_with_size(320, 240).unwrap();
    assert_eq!(controller.state(), SessionState::Ready);
    assert!(controller.latest_frame().is_none());

    controller.start_preview(true).unwrap();
    assert!(wait_for(|| controller.state() == SessionState::Active));
    assert!(wait_for(|| controller.latest_frame().is_some()));

    let frame = controller.latest_frame().unwrap();
    assert_eq!(frame.dimensions(), (320, 240));
    assert_eq!(frame.format, PixelFormat::Yuv420);
    assert_eq!(frame.data.len(), 320 * 240 * 3 / 2);

    let first = frame.sequence;
    assert!(wait_for(|| controller
        .latest_frame()
        .is_some_and(|f| f.sequence > first)));

    controller.start_preview(false).unwrap();
    assert!(wait_for(|| controller.state() == SessionState::Ready));

    controller.teardown();

    // The dispatcher drains before the manager is released
    assert_eq!(controller.state(), SessionState::Closed);
    assert_eq!(controller.tracker().stale_notification_count(), 0);
    assert_eq!(camera.live_objects(), 0);
    assert_eq!(surfaces.outstanding_refs(), 0);
    assert!(surfaces.windows().is_empty());
    assert!(camera.is_released());
}

#[test]
fn test_rejected_session_allocates_no_surfaces() {
    let (camera, surfaces) = sim::simulated(fast_config()).unwrap();
    let mut controller = CameraController::new(camera, surfaces.clone());
    controller.init_facing(LensFacing::Back).unwrap();
    controller.create_session_with_size(160, 120).unwrap();
    assert_eq!(surfaces.windows().len(), 2);

    let err = controller.create_session_with_size(320, 240).unwrap_err();

    assert!(matches!(err, CameraError::SessionAlreadyExists));
    assert_eq!(surfaces.windows().len(), 2);

    controller.teardown();
    assert!(surfaces.windows().is_empty());
}

#[test]
fn test_teardown_while_active() {
    let (camera, surfaces) = sim::simulated(fast_config()).unwrap();
    let mut controller = CameraController::new(camera.clone(), surfaces.clone());

    controller.init_facing(LensFacing::Front).unwrap();
    controller.create_session_with_size(160, 120).unwrap();
    controller.start_preview(true).unwrap();
    assert!(wait_for(|| controller.state() == SessionState::Active));

    drop(controller);

    assert_eq!(camera.live_objects(), 0);
    assert_eq!(surfaces.outstanding_refs(), 0);
}

#[test]
fn test_still_capture_produces_jpeg() {
    let (camera, surfaces) = sim::simulated(fast_config()).unwrap();
    let mut controller = CameraController::new(camera, surfaces.clone());

    controller.init_facing(LensFacing::Back).unwrap();
    controller.create_session_with_size(320, 240).unwrap();
    controller.capture_still().unwrap();

    let still = surfaces
        .windows()
        .into_iter()
        .find(|w| w.name() == STILL_SURFACE_NAME)
        .unwrap();
    assert!(wait_for(|| still.last_queued_buffer().is_some()));

    let buffer = still.last_queued_buffer().unwrap();
    assert_eq!(buffer.format, PixelFormat::Jpeg);
    assert_eq!(&buffer.data[..2], &[0xFF, 0xD8]);

    // A single capture does not start the preview stream
    assert!(controller.latest_frame().is_none());
    assert_eq!(controller.state(), SessionState::Ready);
}

#[test]
fn test_camera_in_use() {
    let (camera, surfaces) = sim::simulated(fast_config()).unwrap();
    let mut first = CameraController::new(camera.clone(), surfaces.clone());
    first.init_facing(LensFacing::Back).unwrap();

    let mut second = CameraController::new(camera.clone(), surfaces.clone());
    let err = second.init_facing(LensFacing::Back).unwrap_err();

    assert_eq!(err.camera_status(), Some(CameraStatus::CameraInUse));
    assert!(err.user_hint().is_some());

    // Other camera is still free
    second.init_facing(LensFacing::Front).unwrap();
}

#[test]
fn test_disconnect_is_reported_without_state_change() {
    let (camera, surfaces) = sim::simulated(fast_config()).unwrap();
    let mut controller = CameraController::new(camera.clone(), surfaces);
    controller.init_facing(LensFacing::Back).unwrap();
    controller.create_session_with_size(160, 120).unwrap();

    camera.disconnect("0");

    assert!(wait_for(|| controller.tracker().device_error_count() == 1));
    assert_eq!(
        controller.tracker().last_device_error().map(|(_, e)| e),
        Some(DeviceError::Disconnected)
    );
    assert_eq!(controller.state(), SessionState::Ready);
}

#[test]
fn test_registry_over_simulator() {
    let (camera, _surfaces) = sim::simulated(SimulatorConfig::default()).unwrap();
    let registry = DeviceRegistry::new(&*camera);

    let devices = registry.list().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].facing, LensFacing::Front);

    assert!(matches!(
        registry.enumerate(|d| d.facing == LensFacing::External),
        Err(CameraError::NoMatchingDevice)
    ));
}
