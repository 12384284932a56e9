/// Unstrided 16-bit index cursor over raw arena bytes

use std::mem::size_of;

/// Element type of batch index streams
pub type Index = u16;

pub struct IndexIterator<'a> {
    bytes: &'a mut [u8],
    position: usize,
}

impl<'a> IndexIterator<'a> {
    pub const STRIDE: usize = size_of::<Index>();

    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len() % Self::STRIDE, 0,
            "index stream of {} bytes is not a multiple of {}", bytes.len(), Self::STRIDE);
        Self { bytes, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / Self::STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices remaining from the cursor to the end
    pub fn size(&self) -> usize {
        self.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn slot(&self, slot: usize) -> std::ops::Range<usize> {
        debug_assert!(slot < self.len(), "index slot {} out of {} slots", slot, self.len());
        let start = slot * Self::STRIDE;
        start..start + Self::STRIDE
    }

    /// Write `value` at the `index`-th slot after the cursor
    pub fn set(&mut self, index: usize, value: Index) {
        let range = self.slot(self.position + index);
        self.bytes[range].copy_from_slice(&value.to_ne_bytes());
    }

    pub fn write(&mut self, value: Index) {
        self.set(0, value);
    }

    /// Write `value` at the cursor and move to the next slot
    pub fn push(&mut self, value: Index) {
        self.write(value);
        self.position += 1;
    }

    pub fn extend_from_slice(&mut self, values: &[Index]) {
        for &value in values {
            self.push(value);
        }
    }

    pub fn get(&self, index: usize) -> Index {
        self.get_absolute(self.position + index)
    }

    pub fn get_absolute(&self, slot: usize) -> Index {
        bytemuck::pod_read_unaligned(&self.bytes[self.slot(slot)])
    }

    /// Pre-increment
    pub fn advance(&mut self) -> &mut Self {
        debug_assert!(self.position < self.len(), "index cursor advanced past the end");
        self.position += 1;
        self
    }

    /// Post-increment, returns the previous position
    pub fn step(&mut self) -> usize {
        debug_assert!(self.position < self.len(), "index cursor advanced past the end");
        let previous = self.position;
        self.position += 1;
        previous
    }
}
