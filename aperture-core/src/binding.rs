//! Per-stream binding of windows to session outputs and capture requests
//!
//! Each logical stream of a session owns, in acquisition order:
//!
//! 1. a lease on the compositor window
//! 2. a session output created from the window, registered in the container
//! 3. an output target created from the same window
//! 4. a capture request built from the stream's template, targeting (3)
//!
//! Teardown walks the same chain backwards.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{CameraBackend, NativeWindow};
use crate::error::{CameraError, Result, StatusExt};
use crate::types::{
    ContainerHandle, DeviceHandle, OutputTargetHandle, RequestHandle, RequestTemplate,
    SessionOutputHandle, StreamRole, WindowHandle,
};

/// Retained reference on a compositor window
///
/// The reference is taken on construction and dropped when the lease goes
/// out of scope, including on error paths.
pub struct SurfaceLease {
    window: Arc<dyn NativeWindow>,
}

impl SurfaceLease {
    pub fn acquire(window: Arc<dyn NativeWindow>) -> Self {
        window.acquire();
        Self { window }
    }

    pub fn handle(&self) -> WindowHandle {
        self.window.handle()
    }

    pub fn window(&self) -> &Arc<dyn NativeWindow> {
        &self.window
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        self.window.release();
    }
}

impl std::fmt::Debug for SurfaceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceLease")
            .field("window", &self.window.handle())
            .finish()
    }
}

/// A stream to bind: which role it plays and where its frames go
#[derive(Clone)]
pub struct StreamSpec {
    pub role: StreamRole,
    pub window: Arc<dyn NativeWindow>,
}

impl StreamSpec {
    pub fn new(role: StreamRole, window: Arc<dyn NativeWindow>) -> Self {
        Self { role, window }
    }

    pub fn preview(window: Arc<dyn NativeWindow>) -> Self {
        Self::new(StreamRole::Preview, window)
    }

    pub fn still_capture(window: Arc<dyn NativeWindow>) -> Self {
        Self::new(StreamRole::StillCapture, window)
    }
}

/// A fully constructed stream binding
#[derive(Debug)]
pub struct StreamBinding {
    role: StreamRole,
    template: RequestTemplate,
    surface: SurfaceLease,
    output: SessionOutputHandle,
    target: OutputTargetHandle,
    request: RequestHandle,
}

impl StreamBinding {
    pub fn role(&self) -> StreamRole {
        self.role
    }

    pub fn template(&self) -> RequestTemplate {
        self.template
    }

    pub fn window(&self) -> &Arc<dyn NativeWindow> {
        self.surface.window()
    }

    pub fn session_output(&self) -> SessionOutputHandle {
        self.output
    }

    pub fn output_target(&self) -> OutputTargetHandle {
        self.target
    }

    pub fn request(&self) -> RequestHandle {
        self.request
    }
}

/// Undo log for a binding under construction
///
/// Dropping it before [`commit`](Self::commit) undoes every completed step in
/// reverse order. The surface lease is held outside the guard and declared
/// before it, so it is released after the rollback.
struct BindingRollback<'a> {
    backend: &'a dyn CameraBackend,
    container: ContainerHandle,
    role: StreamRole,
    output: Option<SessionOutputHandle>,
    in_container: bool,
    target: Option<OutputTargetHandle>,
    request: Option<RequestHandle>,
    target_attached: bool,
    committed: bool,
}

impl<'a> BindingRollback<'a> {
    fn new(backend: &'a dyn CameraBackend, container: ContainerHandle, role: StreamRole) -> Self {
        Self {
            backend,
            container,
            role,
            output: None,
            in_container: false,
            target: None,
            request: None,
            target_attached: false,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for BindingRollback<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        warn!("Rolling back partially bound {} stream", self.role);

        if let (true, Some(request), Some(target)) =
            (self.target_attached, self.request, self.target)
        {
            if let Err(status) = self.backend.request_remove_target(request, target) {
                warn!("request_remove_target failed during rollback: {}", status);
            }
        }
        if let Some(request) = self.request {
            self.backend.free_capture_request(request);
        }
        if let Some(target) = self.target {
            self.backend.free_output_target(target);
        }
        if let (true, Some(output)) = (self.in_container, self.output) {
            if let Err(status) = self.backend.container_remove(self.container, output) {
                warn!("container_remove failed during rollback: {}", status);
            }
        }
        if let Some(output) = self.output {
            self.backend.free_session_output(output);
        }
    }
}

/// Build one binding in acquisition order
fn bind_stream(
    backend: &dyn CameraBackend,
    device: DeviceHandle,
    container: ContainerHandle,
    spec: &StreamSpec,
) -> Result<StreamBinding> {
    let template = spec.role.template();

    let surface = SurfaceLease::acquire(spec.window.clone());
    let window = surface.handle();
    let mut undo = BindingRollback::new(backend, container, spec.role);

    let output = backend
        .create_session_output(window)
        .call("create_session_output")?;
    undo.output = Some(output);

    backend
        .container_add(container, output)
        .call("container_add")?;
    undo.in_container = true;

    let target = backend
        .create_output_target(window)
        .call("create_output_target")?;
    undo.target = Some(target);

    let request = backend
        .create_capture_request(device, template)
        .call("create_capture_request")?;
    undo.request = Some(request);

    backend
        .request_add_target(request, target)
        .call("request_add_target")?;
    undo.target_attached = true;

    undo.commit();
    Ok(StreamBinding {
        role: spec.role,
        template,
        surface,
        output,
        target,
        request,
    })
}

/// Stream bindings of one capture session, keyed by role
#[derive(Debug, Default)]
pub struct StreamTable {
    bindings: Vec<StreamBinding>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every stream, in order
    ///
    /// On failure the failing stream is rolled back and the error names it;
    /// streams bound before it stay in the table until [`unbind`](Self::unbind).
    pub fn bind(
        &mut self,
        backend: &dyn CameraBackend,
        device: DeviceHandle,
        container: ContainerHandle,
        streams: &[StreamSpec],
    ) -> Result<()> {
        for (index, spec) in streams.iter().enumerate() {
            let fail = |source: CameraError| CameraError::BindingFailed {
                index,
                role: spec.role,
                source: Box::new(source),
            };

            if self.get(spec.role).is_some() {
                return Err(fail(CameraError::DuplicateStream(spec.role)));
            }

            let binding = bind_stream(backend, device, container, spec).map_err(fail)?;

            debug!(
                "Bound {} stream: window={} output={} target={} request={}",
                spec.role,
                binding.surface.handle(),
                binding.output,
                binding.target,
                binding.request
            );
            self.bindings.push(binding);
        }

        info!("Bound {} stream(s)", self.bindings.len());
        Ok(())
    }

    /// Release every binding in reverse bind order
    ///
    /// Safe to call on an empty table.
    pub fn unbind(&mut self, backend: &dyn CameraBackend, container: ContainerHandle) {
        if self.bindings.is_empty() {
            return;
        }

        while let Some(binding) = self.bindings.pop() {
            if let Err(status) = backend.request_remove_target(binding.request, binding.target) {
                warn!("request_remove_target failed for {}: {}", binding.role, status);
            }
            backend.free_capture_request(binding.request);
            backend.free_output_target(binding.target);

            if let Err(status) = backend.container_remove(container, binding.output) {
                warn!("container_remove failed for {}: {}", binding.role, status);
            }
            backend.free_session_output(binding.output);

            debug!("Unbound {} stream", binding.role);
            drop(binding.surface);
        }
    }

    pub fn get(&self, role: StreamRole) -> Option<&StreamBinding> {
        self.bindings.iter().find(|b| b.role == role)
    }

    /// Binding for `role`, or `StreamNotBound`
    pub fn require(&self, role: StreamRole) -> Result<&StreamBinding> {
        self.get(role).ok_or(CameraError::StreamNotBound(role))
    }

    pub fn roles(&self) -> impl Iterator<Item = StreamRole> + '_ {
        self.bindings.iter().map(|b| b.role)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
