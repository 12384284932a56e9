/// Strided vertex cursor over raw arena bytes
///
/// Every vertex occupies `vertex_stride::<T>()` bytes, its size rounded up
/// to 16, so batches of different vertex types share one packing scheme.

use std::marker::PhantomData;
use std::mem::size_of;
use bytemuck::Pod;
use crate::memory::frame_arena::align_up;

/// Vertex strides are multiples of this many bytes
pub const VERTEX_STRIDE_ALIGNMENT: usize = 16;

/// Padded stride of vertex type `T`
pub const fn vertex_stride<T>() -> usize {
    align_up(size_of::<T>(), VERTEX_STRIDE_ALIGNMENT)
}

/// Typed write cursor over `len() * vertex_stride::<T>()` bytes
///
/// ```
/// use galaxy_batcher::batcher::memory::VertexIterator;
///
/// let mut bytes = vec![0u8; 2 * 16];
/// let mut cursor = VertexIterator::<[f32; 2]>::new(&mut bytes);
/// cursor.push([1.0, 2.0]);
/// cursor.push([3.0, 4.0]);
/// assert_eq!(cursor.size(), 0);
/// assert_eq!(cursor.get_absolute(1), [3.0, 4.0]);
/// ```
pub struct VertexIterator<'a, T: Pod> {
    bytes: &'a mut [u8],
    position: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pod> VertexIterator<'a, T> {
    pub const STRIDE: usize = vertex_stride::<T>();

    pub fn new(bytes: &'a mut [u8]) -> Self {
        assert!(size_of::<T>() > 0, "zero-sized vertex type");
        debug_assert_eq!(bytes.len() % Self::STRIDE, 0,
            "vertex stream of {} bytes is not a multiple of stride {}", bytes.len(), Self::STRIDE);
        Self {
            bytes,
            position: 0,
            _marker: PhantomData,
        }
    }

    /// Bytes between consecutive vertices
    pub fn stride(&self) -> usize {
        Self::STRIDE
    }

    /// Total number of vertex slots
    pub fn len(&self) -> usize {
        self.bytes.len() / Self::STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots remaining from the cursor to the end
    pub fn size(&self) -> usize {
        self.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn slot(&self, slot: usize) -> std::ops::Range<usize> {
        debug_assert!(slot < self.len(), "vertex slot {} out of {} slots", slot, self.len());
        let start = slot * Self::STRIDE;
        start..start + size_of::<T>()
    }

    /// Write `value` at the `index`-th slot after the cursor
    pub fn set(&mut self, index: usize, value: T) {
        let range = self.slot(self.position + index);
        self.bytes[range].copy_from_slice(bytemuck::bytes_of(&value));
    }

    /// Write `value` at the cursor without moving it
    pub fn write(&mut self, value: T) {
        self.set(0, value);
    }

    /// Write `value` at the cursor and move to the next slot
    pub fn push(&mut self, value: T) {
        self.write(value);
        self.position += 1;
    }

    pub fn extend_from_slice(&mut self, values: &[T]) {
        for value in values {
            self.push(*value);
        }
    }

    /// Read the `index`-th slot after the cursor
    pub fn get(&self, index: usize) -> T {
        self.get_absolute(self.position + index)
    }

    /// Read slot `slot` counted from the start of the stream
    pub fn get_absolute(&self, slot: usize) -> T {
        bytemuck::pod_read_unaligned(&self.bytes[self.slot(slot)])
    }

    /// Pre-increment: move to the next slot and return the moved cursor
    pub fn advance(&mut self) -> &mut Self {
        debug_assert!(self.position < self.len(), "vertex cursor advanced past the end");
        self.position += 1;
        self
    }

    /// Post-increment: move to the next slot and return the previous position
    pub fn step(&mut self) -> usize {
        debug_assert!(self.position < self.len(), "vertex cursor advanced past the end");
        let previous = self.position;
        self.position += 1;
        previous
    }
}
