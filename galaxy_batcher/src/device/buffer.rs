/// Buffer trait and buffer descriptor

use std::fmt;

/// How often the contents of a buffer are expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times
    Static,
    /// Updated occasionally
    Dynamic,
    /// Rewritten every frame (transient batch geometry)
    Stream,
}

/// Descriptor for creating a vertex or index buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Update frequency hint
    pub usage: BufferUsage,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// GPU buffer handle
///
/// Implemented by backend-specific buffer types. The buffer is destroyed
/// when the last handle is dropped.
pub trait Buffer: fmt::Debug + Send + Sync {
    /// Size of the buffer in bytes
    fn size(&self) -> u64;
}
