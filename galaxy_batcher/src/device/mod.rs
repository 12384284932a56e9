/// Device module - the GPU-facing interface consumed by the batcher

pub mod render_device;
pub mod buffer;
pub mod vertex_declaration;
pub mod command;
pub mod pass;

pub use render_device::*;
pub use buffer::*;
pub use vertex_declaration::*;
pub use command::*;
pub use pass::*;

// Recording device for tests (no GPU required)
#[cfg(test)]
pub mod mock_render_device;
