/// Memory module - frame arena and typed stream cursors

pub mod frame_arena;
pub mod constants;
pub mod vertex_iterator;
pub mod index_iterator;

pub use frame_arena::{FrameArena, ArenaSpan, DEFAULT_CHUNK_SIZE, CBUFFER_ALIGNMENT};
pub use constants::*;
pub use vertex_iterator::*;
pub use index_iterator::*;
