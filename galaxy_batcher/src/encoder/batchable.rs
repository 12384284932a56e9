/// Batchable trait - a source of transient geometry

use crate::device::{PrimitiveTopology, Vertex};
use crate::memory::{IndexIterator, VertexIterator};

/// Geometry that writes itself into frame memory
///
/// Indices are relative to the first vertex of the batch.
pub trait Batchable {
    type Vertex: Vertex + 'static;

    fn vertex_count(&self) -> usize;

    fn index_count(&self) -> usize;

    fn topology(&self) -> PrimitiveTopology;

    /// Write exactly `vertex_count()` vertices
    fn write_vertices(&self, vertices: &mut VertexIterator<'_, Self::Vertex>);

    /// Write exactly `index_count()` indices
    fn write_indices(&self, indices: &mut IndexIterator<'_>);
}
