/// Constant buffer templates and arena-backed constant buffer handles

use std::sync::Arc;
use crate::memory::{ArenaSpan, frame_arena::align_up};

/// One named field of a constant buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantField {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

/// Layout of a constant buffer
///
/// Fields follow std140-style row packing: a field never straddles a
/// 16-byte row, and fields of 16 bytes or more start on a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantBufferTemplate {
    fields: Vec<ConstantField>,
    size: usize,
}

impl ConstantBufferTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field of `size` bytes
    pub fn add_field(mut self, name: &str, size: usize) -> Self {
        debug_assert!(self.field(name).is_none(), "duplicate constant '{}'", name);
        let mut offset = self.size;
        if size >= 16 || offset % 16 + size > 16 {
            offset = align_up(offset, 16);
        }
        self.fields.push(ConstantField {
            name: name.to_string(),
            offset,
            size,
        });
        self.size = offset + size;
        self
    }

    pub fn field(&self, name: &str) -> Option<&ConstantField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[ConstantField] {
        &self.fields
    }

    /// Unpadded size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Constant buffer living in frame arena memory
///
/// Valid until the arena is discarded at the end of the frame.
#[derive(Debug, Clone)]
pub struct ConstantBufferHandle {
    span: ArenaSpan,
    template: Arc<ConstantBufferTemplate>,
}

impl ConstantBufferHandle {
    pub(crate) fn new(span: ArenaSpan, template: Arc<ConstantBufferTemplate>) -> Self {
        Self { span, template }
    }

    pub fn span(&self) -> ArenaSpan {
        self.span
    }

    pub fn template(&self) -> &Arc<ConstantBufferTemplate> {
        &self.template
    }
}
