/// Encoder module - per-pass recording of batches and meshes

pub mod batchable;
pub mod draw_batch;
pub mod command_encoder;
pub mod primitives;

pub use batchable::*;
pub use draw_batch::*;
pub use command_encoder::*;
pub use primitives::*;
