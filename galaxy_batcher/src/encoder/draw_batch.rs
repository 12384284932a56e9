/// Recorded draw items: transient batches and pre-built meshes

use std::sync::Arc;
use crate::device::{
    same_object, IndexedDraw, MaterialKey, PrimitiveTopology, Rect2D, VertexAttribs,
    VertexBufferBinding,
};
use crate::memory::ArenaSpan;

/// Where a batch's geometry currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStorage {
    /// Still in the frame arena: vertices first, indices right after
    Pending {
        span: ArenaSpan,
        vertex_bytes: usize,
        index_bytes: usize,
    },
    /// Copied into buffer pair `pair` during flush
    Uploaded {
        pair: usize,
        /// Byte offset of the vertex region holding the batch; batches of
        /// one vertex type share a region inside a pair
        region_offset: u64,
        /// Index of the batch's first vertex inside its region, already
        /// added to the uploaded indices
        base_vertex: u32,
        /// Offset of the first index in the pair's index buffer, in indices
        first_index: u32,
    },
}

/// Transient geometry recorded into a pass
#[derive(Debug, Clone)]
pub struct DrawBatch {
    pub material: MaterialKey,
    pub topology: PrimitiveTopology,
    pub attribs: Arc<dyn VertexAttribs>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub scissor: Option<Rect2D>,
    pub storage: BatchStorage,
}

impl DrawBatch {
    /// Arena bytes holding the vertices, while pending
    pub fn vertex_span(&self) -> Option<ArenaSpan> {
        match self.storage {
            BatchStorage::Pending { span, vertex_bytes, .. } => Some(span.split_at(vertex_bytes).0),
            BatchStorage::Uploaded { .. } => None,
        }
    }

    /// Arena bytes holding the indices, while pending
    pub fn index_span(&self) -> Option<ArenaSpan> {
        match self.storage {
            BatchStorage::Pending { span, vertex_bytes, .. } => Some(span.split_at(vertex_bytes).1),
            BatchStorage::Uploaded { .. } => None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self.storage, BatchStorage::Uploaded { .. })
    }
}

/// Two batches are equal when they draw the same bytes the same way
impl PartialEq for DrawBatch {
    fn eq(&self, other: &Self) -> bool {
        self.material == other.material
            && self.topology == other.topology
            && same_object(&self.attribs, &other.attribs)
            && self.storage == other.storage
            && self.scissor == other.scissor
    }
}

/// Geometry already resident in device buffers
#[derive(Debug, Clone)]
pub struct DrawMesh {
    pub material: MaterialKey,
    pub vertices: VertexBufferBinding,
    pub indexed: IndexedDraw,
    pub scissor: Option<Rect2D>,
}
