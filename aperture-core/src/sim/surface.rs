//! In-process compositor
//!
//! Hands out windows that keep the last queued buffer and count the
//! references taken on them, so leaks show up as a non-zero count. A window
//! leaves the compositor once its last reference is released.

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace, warn};

use crate::backend::{NativeWindow, SurfaceProvider};
use crate::error::{CameraError, Result};
use crate::types::{FrameBuffer, ImageFormat, WindowHandle};

type WindowMap = RwLock<HashMap<WindowHandle, Arc<SimulatedWindow>>>;

/// A window allocated by [`SimulatedSurfaces`]
pub struct SimulatedWindow {
    handle: WindowHandle,
    name: String,
    format: ImageFormat,
    /// References taken through `acquire`
    refs: AtomicUsize,
    /// Producer sequence counter
    sequence: AtomicU64,
    last: Mutex<Option<FrameBuffer>>,
    /// Compositor the window is registered with
    registry: Weak<WindowMap>,
}

impl SimulatedWindow {
    fn new(name: &str, format: ImageFormat, registry: Weak<WindowMap>) -> Self {
        Self {
            handle: WindowHandle::new(),
            name: name.to_string(),
            format,
            refs: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
            last: Mutex::new(None),
            registry,
        }
    }

    fn retire(&self) {
        if let Some(windows) = self.registry.upgrade() {
            if windows.write().remove(&self.handle).is_some() {
                debug!("Retired surface {} ({})", self.name, self.handle);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// References currently held on the window
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    /// Buffers queued so far
    pub fn queued(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Queue a buffer in the window's own shape; returns its sequence number
    pub fn queue(&self, data: Bytes) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let buffer = FrameBuffer::new(
            self.format.width,
            self.format.height,
            self.format.format,
            sequence,
            data,
        );
        *self.last.lock() = Some(buffer);
        trace!("{} queued buffer #{}", self.name, sequence);
        sequence
    }
}

impl NativeWindow for SimulatedWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        let previous = self
            .refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.retire(),
            Ok(_) => {}
            Err(_) => warn!("{} released without a matching acquire", self.name),
        }
    }

    fn last_queued_buffer(&self) -> Option<FrameBuffer> {
        self.last.lock().clone()
    }
}

/// Compositor handing out [`SimulatedWindow`]s
#[derive(Default)]
pub struct SimulatedSurfaces {
    windows: Arc<WindowMap>,
}

impl SimulatedSurfaces {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Look up a window by the handle the camera service knows it under
    pub fn window(&self, handle: WindowHandle) -> Option<Arc<SimulatedWindow>> {
        self.windows.read().get(&handle).cloned()
    }

    /// Every window still registered
    pub fn windows(&self) -> Vec<Arc<SimulatedWindow>> {
        self.windows.read().values().cloned().collect()
    }

    /// Sum of references still held on all windows
    pub fn outstanding_refs(&self) -> usize {
        self.windows.read().values().map(|w| w.ref_count()).sum()
    }
}

impl SurfaceProvider for SimulatedSurfaces {
    fn create_surface(&self, name: &str, format: ImageFormat) -> Result<Arc<dyn NativeWindow>> {
        if format.width == 0 || format.height == 0 {
            return Err(CameraError::surface(format!(
                "Cannot allocate {} with zero extent ({})",
                name, format
            )));
        }

        let window = Arc::new(SimulatedWindow::new(
            name,
            format,
            Arc::downgrade(&self.windows),
        ));
        self.windows.write().insert(window.handle, window.clone());
        debug!("Allocated surface {} ({}) as {}", name, format, window.handle);
        Ok(window)
    }
}
