/// RenderDevice trait - the GPU abstraction the batcher submits into

use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::{Error, Result};
use crate::device::{
    Buffer, BufferDesc, IndexType, VertexAttribs, VertexDeclaration,
    PassBegin, RenderCommand,
};

/// GPU device consumed by the render queue
///
/// Implemented by backend renderers. Every method is synchronous from the
/// batcher's point of view; a backend may queue work internally.
pub trait RenderDevice: Send + Sync {
    /// Create a vertex buffer of `desc.size` bytes
    fn create_vertex_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create an index buffer of `desc.size` bytes holding `index_type` elements
    fn create_index_buffer(&mut self, desc: &BufferDesc, index_type: IndexType) -> Result<Arc<dyn Buffer>>;

    /// Write `data` into `buffer` starting at byte `offset`
    fn update_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, data: &[u8]) -> Result<()>;

    /// Create the attribute binding object for a vertex declaration
    fn create_vertex_attribs(&mut self, decl: &VertexDeclaration) -> Result<Arc<dyn VertexAttribs>>;

    /// Begin a pass: bind the target, set the viewport, clear, and bind
    /// pass-wide samplers and constants
    fn begin_pass(&mut self, pass: &PassBegin<'_>) -> Result<()>;

    /// End the current pass
    fn end_pass(&mut self) -> Result<()>;

    /// Execute one command inside the current pass
    fn execute(&mut self, command: RenderCommand) -> Result<()>;
}

/// Lock a shared device, mapping a poisoned lock to `Error::BackendError`
pub(crate) fn lock_device(
    device: &Arc<Mutex<dyn RenderDevice>>,
) -> Result<MutexGuard<'_, dyn RenderDevice + 'static>> {
    device.lock().map_err(|_| {
        crate::engine_error!("galaxy::RenderDevice", "Render device lock poisoned");
        Error::BackendError("Render device lock poisoned".to_string())
    })
}
