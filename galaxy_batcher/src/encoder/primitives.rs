/// Ready-made batch sources for 2D overlays and debug geometry

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use crate::device::{BufferFormat, PrimitiveTopology, Vertex, VertexDeclaration};
use crate::encoder::Batchable;
use crate::memory::{Index, IndexIterator, VertexIterator};

// ============================================================================
// Vertex types
// ============================================================================

/// Position + RGBA8 color (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: Vec3,
    pub color: [u8; 4],
}

impl Vertex for ColorVertex {
    fn decl() -> VertexDeclaration {
        VertexDeclaration::new()
            .add_attribute("a_position", BufferFormat::R32G32B32_SFLOAT)
            .add_attribute("a_color", BufferFormat::R8G8B8A8_UNORM)
    }
}

/// Position + texture coordinates + RGBA8 tint (24 bytes, 32-byte stride)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: Vec3,
    pub uv: Vec2,
    pub color: [u8; 4],
}

impl Vertex for SpriteVertex {
    fn decl() -> VertexDeclaration {
        VertexDeclaration::new()
            .add_attribute("a_position", BufferFormat::R32G32B32_SFLOAT)
            .add_attribute("a_uv", BufferFormat::R32G32_SFLOAT)
            .add_attribute("a_color", BufferFormat::R8G8B8A8_UNORM)
    }
}

/// Two triangles over corners 0-1-2-3 (counter-clockwise from min)
const QUAD_INDICES: [Index; 6] = [0, 1, 2, 2, 3, 0];

/// Corners of an axis-aligned rectangle, counter-clockwise from `min`
fn quad_corners(min: Vec2, max: Vec2) -> [Vec2; 4] {
    [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)]
}

// ============================================================================
// ColoredQuad
// ============================================================================

/// Flat-colored axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredQuad {
    pub min: Vec2,
    pub max: Vec2,
    pub depth: f32,
    pub color: [u8; 4],
}

impl ColoredQuad {
    pub fn new(min: Vec2, max: Vec2, color: [u8; 4]) -> Self {
        Self { min, max, depth: 0.0, color }
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }
}

impl Batchable for ColoredQuad {
    type Vertex = ColorVertex;

    fn vertex_count(&self) -> usize {
        4
    }

    fn index_count(&self) -> usize {
        QUAD_INDICES.len()
    }

    fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::Triangles
    }

    fn write_vertices(&self, vertices: &mut VertexIterator<'_, ColorVertex>) {
        for corner in quad_corners(self.min, self.max) {
            vertices.push(ColorVertex {
                position: corner.extend(self.depth),
                color: self.color,
            });
        }
    }

    fn write_indices(&self, indices: &mut IndexIterator<'_>) {
        indices.extend_from_slice(&QUAD_INDICES);
    }
}

// ============================================================================
// TexturedQuad
// ============================================================================

/// Axis-aligned sprite sampling `uv_min..uv_max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturedQuad {
    pub min: Vec2,
    pub max: Vec2,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    pub depth: f32,
    pub tint: [u8; 4],
}

impl TexturedQuad {
    /// Sprite covering the whole texture, untinted
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min,
            max,
            uv_min: Vec2::ZERO,
            uv_max: Vec2::ONE,
            depth: 0.0,
            tint: [255; 4],
        }
    }

    pub fn with_uv(mut self, uv_min: Vec2, uv_max: Vec2) -> Self {
        self.uv_min = uv_min;
        self.uv_max = uv_max;
        self
    }

    pub fn with_tint(mut self, tint: [u8; 4]) -> Self {
        self.tint = tint;
        self
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }
}

impl Batchable for TexturedQuad {
    type Vertex = SpriteVertex;

    fn vertex_count(&self) -> usize {
        4
    }

    fn index_count(&self) -> usize {
        QUAD_INDICES.len()
    }

    fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::Triangles
    }

    fn write_vertices(&self, vertices: &mut VertexIterator<'_, SpriteVertex>) {
        let positions = quad_corners(self.min, self.max);
        let uvs = quad_corners(self.uv_min, self.uv_max);
        for (position, uv) in positions.into_iter().zip(uvs) {
            vertices.push(SpriteVertex {
                position: position.extend(self.depth),
                uv,
                color: self.tint,
            });
        }
    }

    fn write_indices(&self, indices: &mut IndexIterator<'_>) {
        indices.extend_from_slice(&QUAD_INDICES);
    }
}

// ============================================================================
// PolyLine
// ============================================================================

/// Open polyline drawn as a line list
///
/// With fewer than two points it has no segments and `add_batch` records
/// nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyLine {
    pub points: Vec<Vec3>,
    pub color: [u8; 4],
}

impl PolyLine {
    pub fn new(points: Vec<Vec3>, color: [u8; 4]) -> Self {
        Self { points, color }
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}

impl Batchable for PolyLine {
    type Vertex = ColorVertex;

    fn vertex_count(&self) -> usize {
        self.points.len()
    }

    fn index_count(&self) -> usize {
        self.segment_count() * 2
    }

    fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::Lines
    }

    fn write_vertices(&self, vertices: &mut VertexIterator<'_, ColorVertex>) {
        for &position in &self.points {
            vertices.push(ColorVertex { position, color: self.color });
        }
    }

    fn write_indices(&self, indices: &mut IndexIterator<'_>) {
        for segment in 0..self.segment_count() {
            indices.push(segment as Index);
            indices.push(segment as Index + 1);
        }
    }
}

#[cfg(test)]
#[path = "primitives_tests.rs"]
mod tests;
