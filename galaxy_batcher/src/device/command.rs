/// Commands executed by the render device inside a pass

use std::sync::Arc;
use slotmap::new_key_type;
use crate::device::{Buffer, IndexType, PrimitiveTopology, VertexAttribs};

new_key_type! {
    /// Stable key of a material owned by the material/asset system
    pub struct MaterialKey;
}

/// 2D rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// A vertex buffer bound with the attribute layout used to read it
#[derive(Debug, Clone)]
pub struct VertexBufferBinding {
    pub buffer: Arc<dyn Buffer>,
    pub attribs: Arc<dyn VertexAttribs>,
    /// Byte offset of the first vertex inside `buffer`
    pub offset: u64,
}

impl VertexBufferBinding {
    pub fn new(buffer: Arc<dyn Buffer>, attribs: Arc<dyn VertexAttribs>) -> Self {
        Self { buffer, attribs, offset: 0 }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Same buffer, same attribute object and same offset
    pub fn same_binding(&self, other: &VertexBufferBinding) -> bool {
        same_object(&self.buffer, &other.buffer)
            && same_object(&self.attribs, &other.attribs)
            && self.offset == other.offset
    }
}

/// Whether two handles point at the same device object
///
/// Only the data addresses are compared; trait object vtables may be
/// duplicated across codegen units.
pub fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// An indexed draw over an index buffer
#[derive(Debug, Clone)]
pub struct IndexedDraw {
    pub buffer: Arc<dyn Buffer>,
    pub index_type: IndexType,
    pub index_count: u32,
    /// Offset of the first index, in indices
    pub first_index: u32,
    pub topology: PrimitiveTopology,
}

/// One indexed draw call
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub material: MaterialKey,
    pub indexed: IndexedDraw,
}

/// Commands accepted by `RenderDevice::execute`
#[derive(Debug, Clone)]
pub enum RenderCommand {
    /// Bind the vertex stream used by subsequent draws
    BindVertexBuffers(VertexBufferBinding),
    /// Change the scissor rectangle (`None` disables scissoring)
    SetScissor(Option<Rect2D>),
    /// Issue an indexed draw
    Draw(DrawCommand),
}
