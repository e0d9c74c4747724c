//! Camera device enumeration and selection

use tracing::{debug, info, warn};

use crate::backend::CameraBackend;
use crate::error::{CameraError, Result, StatusExt};
use crate::types::{DeviceDescriptor, LensFacing};

/// Enumerates the cameras visible to a backend
pub struct DeviceRegistry<'a> {
    backend: &'a dyn CameraBackend,
}

impl<'a> DeviceRegistry<'a> {
    pub fn new(backend: &'a dyn CameraBackend) -> Self {
        Self { backend }
    }

    /// Return the first device whose descriptor satisfies `selector`
    ///
    /// Devices are visited in the order the subsystem reports them. Metadata
    /// that cannot be read aborts the search with `MetadataUnavailable`.
    pub fn enumerate<F>(&self, selector: F) -> Result<DeviceDescriptor>
    where
        F: Fn(&DeviceDescriptor) -> bool,
    {
        let ids = self.backend.camera_ids().call("get_camera_id_list")?;
        debug!("Camera subsystem reports {} device(s)", ids.len());

        for id in ids {
            let descriptor = self.describe(&id)?;
            if selector(&descriptor) {
                info!("Selected {}", descriptor);
                return Ok(descriptor);
            }
            debug!("Skipping {}", descriptor);
        }

        Err(CameraError::NoMatchingDevice)
    }

    /// List every device with readable metadata
    pub fn list(&self) -> Result<Vec<DeviceDescriptor>> {
        let ids = self.backend.camera_ids().call("get_camera_id_list")?;

        let mut devices = Vec::with_capacity(ids.len());
        for id in ids {
            match self.describe(&id) {
                Ok(descriptor) => devices.push(descriptor),
                Err(e) => warn!("Ignoring camera {}: {}", id, e),
            }
        }
        Ok(devices)
    }

    fn describe(&self, id: &str) -> Result<DeviceDescriptor> {
        let metadata = self.backend.characteristics(id).map_err(|status| {
            warn!("get_camera_characteristics({}) returned {}", id, status);
            CameraError::MetadataUnavailable(id.to_string())
        })?;

        let facing = metadata.lens_facing.ok_or_else(|| {
            warn!("Camera {} reports no lens facing", id);
            CameraError::MetadataUnavailable(id.to_string())
        })?;

        Ok(DeviceDescriptor::new(id, facing))
    }
}

/// Selector matching a lens facing
pub fn facing(wanted: LensFacing) -> impl Fn(&DeviceDescriptor) -> bool {
    move |device| device.facing == wanted
}

/// Selector matching every device
pub fn any_device(_: &DeviceDescriptor) -> bool {
    true
}
