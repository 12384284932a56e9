/// Vertex declarations, primitive topology and the `Vertex` trait

use std::fmt;
use bytemuck::Pod;

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// Point list
    Points,
    /// Line list
    Lines,
    /// Triangle list
    Triangles,
    /// Triangle strip
    TriangleStrip,
}

impl PrimitiveTopology {
    /// Whether `index_count` indices form a complete primitive sequence
    ///
    /// Triangles need a positive multiple of 3, strips at least 3 indices,
    /// lines a positive even count and points any positive count.
    pub fn accepts_index_count(&self, index_count: usize) -> bool {
        match self {
            PrimitiveTopology::Points => index_count > 0,
            PrimitiveTopology::Lines => index_count > 0 && index_count % 2 == 0,
            PrimitiveTopology::Triangles => index_count > 0 && index_count % 3 == 0,
            PrimitiveTopology::TriangleStrip => index_count >= 3,
        }
    }

    /// Number of primitives drawn by `index_count` indices
    pub fn primitive_count(&self, index_count: u32) -> u32 {
        match self {
            PrimitiveTopology::Points => index_count,
            PrimitiveTopology::Lines => index_count / 2,
            PrimitiveTopology::Triangles => index_count / 3,
            PrimitiveTopology::TriangleStrip => index_count.saturating_sub(2),
        }
    }
}

/// Data format of a single vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,          // float (4 bytes)
    R32G32_SFLOAT,       // vec2 (8 bytes)
    R32G32B32_SFLOAT,    // vec3 (12 bytes)
    R32G32B32A32_SFLOAT, // vec4 (16 bytes)
    R32_UINT,
    R16G16_SINT,
    R16G16_UINT,
    R8G8B8A8_UINT,
    R8G8B8A8_UNORM,      // packed color (4 bytes)
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_UINT => 4,
            BufferFormat::R32G32_SFLOAT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT => 16,
            BufferFormat::R16G16_SINT | BufferFormat::R16G16_UINT => 4,
            BufferFormat::R8G8B8A8_UINT | BufferFormat::R8G8B8A8_UNORM => 4,
        }
    }
}

/// One named attribute inside a vertex declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input name
    pub name: String,
    /// Data format
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Ordered description of how the bytes of one vertex map to shader inputs
///
/// Attributes are laid out sequentially; `skip_bytes` inserts unused bytes
/// (struct padding, or the tail padding that rounds the stride up).
///
/// ```
/// use galaxy_batcher::batcher::device::{VertexDeclaration, BufferFormat};
///
/// let decl = VertexDeclaration::new()
///     .add_attribute("a_position", BufferFormat::R32G32B32_SFLOAT)
///     .skip_bytes(4);
/// assert_eq!(decl.bytes_per_vertex(), 16);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexDeclaration {
    attributes: Vec<VertexAttribute>,
    bytes_per_vertex: u32,
}

impl VertexDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute at the current end of the vertex
    pub fn add_attribute(mut self, name: &str, format: BufferFormat) -> Self {
        self.attributes.push(VertexAttribute {
            name: name.to_string(),
            format,
            offset: self.bytes_per_vertex,
        });
        self.bytes_per_vertex += format.size_bytes();
        self
    }

    /// Append `bytes` unused bytes
    pub fn skip_bytes(mut self, bytes: u32) -> Self {
        self.bytes_per_vertex += bytes;
        self
    }

    /// Pad the tail so the stride becomes a multiple of `alignment`
    pub fn padded_to(self, alignment: u32) -> Self {
        debug_assert!(alignment.is_power_of_two());
        let padded = (self.bytes_per_vertex + alignment - 1) & !(alignment - 1);
        let tail = padded - self.bytes_per_vertex;
        self.skip_bytes(tail)
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Stride in bytes between consecutive vertices
    pub fn bytes_per_vertex(&self) -> u32 {
        self.bytes_per_vertex
    }
}

/// A plain-data vertex type with a static layout description
///
/// `decl()` must describe exactly `size_of::<Self>()` bytes (declare struct
/// padding with `skip_bytes`); the layout cache appends the 16-byte stride
/// padding itself.
pub trait Vertex: Pod {
    fn decl() -> VertexDeclaration;
}

/// Device-side vertex attribute binding object
pub trait VertexAttribs: fmt::Debug + Send + Sync {
    /// The (padded) declaration this binding was created from
    fn decl(&self) -> &VertexDeclaration;
}
