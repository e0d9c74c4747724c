//! Integration tests for device enumeration and selection

mod mocks;

use aperture_core::error::CameraError;
use aperture_core::registry::{self, DeviceRegistry};
use aperture_core::status::CameraStatus;
use aperture_core::types::LensFacing;
use mocks::{MockBackend, MockDevice};

#[test]
fn test_selects_first_matching_device() {
    let backend = MockBackend::with_default_devices();
    let registry = DeviceRegistry::new(&*backend);

    let back = registry.enumerate(registry::facing(LensFacing::Back)).unwrap();
    assert_eq!(back.id, "0");

    let front = registry.enumerate(registry::facing(LensFacing::Front)).unwrap();
    assert_eq!(front.id, "1");
    assert_eq!(front.facing, LensFacing::Front);
}

#[test]
fn test_rear_flag_maps_to_back() {
    let backend = MockBackend::with_default_devices();
    let registry = DeviceRegistry::new(&*backend);

    let device = registry
        .enumerate(registry::facing(LensFacing::from_rear(true)))
        .unwrap();
    assert_eq!(device.facing, LensFacing::Back);
}

#[test]
fn test_no_matching_device() {
    let backend = MockBackend::with_default_devices();
    let registry = DeviceRegistry::new(&*backend);

    let result = registry.enumerate(registry::facing(LensFacing::External));
    assert!(matches!(result, Err(CameraError::NoMatchingDevice)));
}

#[test]
fn test_empty_device_list() {
    let backend = MockBackend::new(vec![]);
    let registry = DeviceRegistry::new(&*backend);

    assert!(matches!(
        registry.enumerate(registry::any_device),
        Err(CameraError::NoMatchingDevice)
    ));
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn test_custom_selector() {
    let backend = MockBackend::new(vec![
        MockDevice::new("0", LensFacing::Back),
        MockDevice::new("5", LensFacing::Back),
    ]);
    let registry = DeviceRegistry::new(&*backend);

    let device = registry.enumerate(|d| d.id == "5").unwrap();
    assert_eq!(device.id, "5");
}

#[test]
fn test_unreadable_metadata() {
    let backend = MockBackend::new(vec![
        MockDevice::unreadable("0", CameraStatus::MetadataNotFound),
        MockDevice::new("1", LensFacing::Front),
    ]);
    let registry = DeviceRegistry::new(&*backend);

    let result = registry.enumerate(registry::facing(LensFacing::Front));
    match result {
        Err(CameraError::MetadataUnavailable(id)) => assert_eq!(id, "0"),
        other => panic!("expected MetadataUnavailable, got {:?}", other),
    }
}

#[test]
fn test_missing_lens_facing() {
    let backend = MockBackend::new(vec![MockDevice::without_facing("3")]);
    let registry = DeviceRegistry::new(&*backend);

    assert!(matches!(
        registry.enumerate(registry::any_device),
        Err(CameraError::MetadataUnavailable(_))
    ));
}

#[test]
fn test_list_skips_unreadable_devices() {
    let backend = MockBackend::new(vec![
        MockDevice::new("0", LensFacing::Back),
        MockDevice::unreadable("1", CameraStatus::CameraDisconnected),
        MockDevice::new("2", LensFacing::External),
    ]);
    let registry = DeviceRegistry::new(&*backend);

    let ids: Vec<_> = registry.list().unwrap().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["0", "2"]);
}

#[test]
fn test_id_list_failure_names_the_call() {
    let backend = MockBackend::with_default_devices();
    backend.fail_at("camera_ids", 1, CameraStatus::CameraService);
    let registry = DeviceRegistry::new(&*backend);

    let err = registry.enumerate(registry::any_device).unwrap_err();
    assert_eq!(err.camera_status(), Some(CameraStatus::CameraService));
    assert!(err.to_string().starts_with("get_camera_id_list failed"));
}
