/// Per-frame bump allocator over fixed-size chunks
///
/// Chunks are allocated once and kept across frames; `discard()` rewinds
/// them. Allocations are returned as `ArenaSpan` handles (chunk index +
/// offset) rather than pointers, and a span is only valid until the next
/// `discard()`.

use std::sync::Arc;
use crate::memory::{ConstantBufferTemplate, ConstantBufferHandle};

/// Default chunk size (4 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Alignment of constant buffer allocations
pub const CBUFFER_ALIGNMENT: usize = 16;

/// Round `value` up to the next multiple of `align` (a power of two)
#[inline]
pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Handle to a byte range allocated from a `FrameArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaSpan {
    chunk: u32,
    offset: u32,
    len: u32,
    frame: u32,
}

impl ArenaSpan {
    pub fn chunk(&self) -> usize {
        self.chunk as usize
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Split into `[0, at)` and `[at, len)`
    pub fn split_at(&self, at: usize) -> (ArenaSpan, ArenaSpan) {
        assert!(at <= self.len(), "split point {} past span of {} bytes", at, self.len);
        let head = ArenaSpan { len: at as u32, ..*self };
        let tail = ArenaSpan {
            offset: self.offset + at as u32,
            len: self.len - at as u32,
            ..*self
        };
        (head, tail)
    }

    /// Whether two spans share at least one byte
    pub fn overlaps(&self, other: &ArenaSpan) -> bool {
        self.chunk == other.chunk
            && self.offset < other.offset + other.len
            && other.offset < self.offset + self.len
    }
}

struct Chunk {
    storage: Box<[u8]>,
    offset: usize,
}

impl Chunk {
    fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
        }
    }

    /// Offset at which `size` bytes aligned to `align` would start, if they fit
    fn fit(&self, size: usize, align: usize) -> Option<usize> {
        let base = self.storage.as_ptr() as usize;
        let start = align_up(base + self.offset, align) - base;
        (start + size <= self.storage.len()).then_some(start)
    }
}

/// Per-frame bump allocator
pub struct FrameArena {
    chunks: Vec<Chunk>,
    /// Chunk receiving allocations; earlier chunks are full for this frame
    current: usize,
    chunk_size: usize,
    frame: u32,
}

impl FrameArena {
    /// Create an empty arena; chunks are allocated lazily
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "arena chunk size must be positive");
        Self {
            chunks: Vec::new(),
            current: 0,
            chunk_size,
            frame: 0,
        }
    }

    /// Allocate `size` bytes aligned to at least `max(align, size_of::<usize>())`
    ///
    /// An allocation never spans two chunks. A new chunk is appended when no
    /// remaining chunk can hold the request.
    pub fn alloc(&mut self, size: usize, align: usize) -> ArenaSpan {
        assert!(align.is_power_of_two(), "alignment {} is not a power of two", align);
        let align = align.max(std::mem::size_of::<usize>());

        // Current chunk first, then chunks kept from earlier frames
        let mut fitted = None;
        while self.current < self.chunks.len() {
            if let Some(start) = self.chunks[self.current].fit(size, align) {
                fitted = Some((self.current, start));
                break;
            }
            if self.current + 1 == self.chunks.len() {
                break;
            }
            self.current += 1;
        }

        let (chunk_index, start) = match fitted {
            Some(found) => found,
            None => {
                // Slack for aligning inside a chunk whose base is only byte-aligned
                let capacity = self.chunk_size.max(size + align);
                assert!(capacity <= u32::MAX as usize, "arena request of {} bytes too large", size);
                self.chunks.push(Chunk::new(capacity));
                self.current = self.chunks.len() - 1;
                crate::engine_trace!("galaxy::FrameArena",
                    "Chunk #{} allocated ({} bytes)", self.current, capacity);
                let start = self.chunks[self.current]
                    .fit(size, align)
                    .unwrap_or_else(|| unreachable!("fresh chunk holds the request"));
                (self.current, start)
            }
        };

        self.chunks[chunk_index].offset = start + size;
        ArenaSpan {
            chunk: chunk_index as u32,
            offset: start as u32,
            len: size as u32,
            frame: self.frame,
        }
    }

    /// Allocate a zeroed region laid out by `template`
    pub fn alloc_cbuffer(&mut self, template: &Arc<ConstantBufferTemplate>) -> ConstantBufferHandle {
        let size = align_up(template.size(), CBUFFER_ALIGNMENT);
        let span = self.alloc(size, CBUFFER_ALIGNMENT);
        self.bytes_mut(span).fill(0);
        ConstantBufferHandle::new(span, template.clone())
    }

    /// Rewind every chunk; all spans handed out so far become invalid
    pub fn discard(&mut self) {
        for chunk in &mut self.chunks {
            chunk.offset = 0;
        }
        self.current = 0;
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn bytes(&self, span: ArenaSpan) -> &[u8] {
        debug_assert_eq!(span.frame, self.frame, "arena span used after discard()");
        let start = span.offset();
        &self.chunks[span.chunk()].storage[start..start + span.len()]
    }

    pub fn bytes_mut(&mut self, span: ArenaSpan) -> &mut [u8] {
        debug_assert_eq!(span.frame, self.frame, "arena span used after discard()");
        let start = span.offset();
        &mut self.chunks[span.chunk()].storage[start..start + span.len()]
    }

    /// Address of the first byte of `span` (for alignment checks)
    pub fn address(&self, span: ArenaSpan) -> usize {
        self.chunks[span.chunk()].storage.as_ptr() as usize + span.offset()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Write offset of chunk `index`
    pub fn chunk_offset(&self, index: usize) -> Option<usize> {
        self.chunks.get(index).map(|c| c.offset)
    }

    /// Total bytes reserved by all chunks
    pub fn capacity(&self) -> usize {
        self.chunks.iter().map(|c| c.storage.len()).sum()
    }

    /// Bytes consumed this frame, alignment padding included
    pub fn allocated_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.offset).sum()
    }

    /// Number of `discard()` calls so far
    pub fn frame(&self) -> u32 {
        self.frame
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
#[path = "frame_arena_tests.rs"]
mod tests;
