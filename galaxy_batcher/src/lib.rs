/*!
# Galaxy Batcher

Render command batching for the Galaxy engine.

Gameplay and UI code records draws into per-pass command encoders; at the end
of the frame the render queue uploads all transient geometry into a few GPU
buffers and issues sorted draw calls to a `RenderDevice` backend.

## Architecture

- **FrameArena**: per-frame bump allocator holding batch geometry and constants
- **VertexIterator / IndexIterator**: strided cursors writing into arena memory
- **ResourceCache**: vertex attribute bindings created once per vertex type
- **CommandEncoder**: records batches and meshes for one pass, flushes them
- **RenderQueue**: owns the passes of a frame and submits them in order

Backends implement the `RenderDevice` trait.
*/

// Internal modules
mod error;
pub mod log;
pub mod device;
pub mod memory;
pub mod resource;
pub mod encoder;
pub mod queue;

// Main batcher namespace module
pub mod batcher {
    // Error types
    pub use crate::error::{Error, Result};

    // Frame entry point
    pub use crate::queue::{RenderQueue, RenderQueueConfig, FrameStats, PassId, RenderPass};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, Log};
    }

    // Device interface implemented by backends
    pub mod device {
        pub use crate::device::*;
    }

    // Frame memory and stream cursors
    pub mod memory {
        pub use crate::memory::*;
    }

    // Cached device objects
    pub mod resource {
        pub use crate::resource::*;
    }

    // Pass recording and batch sources
    pub mod encoder {
        pub use crate::encoder::*;
    }
}

// Re-export math library at crate root
pub use glam;
