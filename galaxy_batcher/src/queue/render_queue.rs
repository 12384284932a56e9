/// Render queue - owns the frame's passes and submits them to the device
///
/// Per frame: `create_pass()` any number of times, record into the returned
/// encoders, then `submit()`. Submission walks the passes in creation order
/// (begin, flush, end) and rewinds the frame arena once at the end, whether
/// or not the frame succeeded.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use crate::device::{lock_device, BufferUsage, PassBegin, PassDesc, RenderDevice, SamplerBinding};
use crate::encoder::{CommandEncoder, FlushStats};
use crate::error::{Error, Result};
use crate::memory::{ConstantBufferHandle, ConstantBufferTemplate, FrameArena, DEFAULT_CHUNK_SIZE};
use crate::queue::{PassId, RenderPass};
use crate::resource::ResourceCache;

// ============================================================================
// Configuration and statistics
// ============================================================================

/// Render queue configuration
#[derive(Debug, Clone)]
pub struct RenderQueueConfig {
    /// Size of each frame arena chunk in bytes
    pub arena_chunk_size: usize,
    /// Largest vertex or index buffer created for a flush, in bytes
    pub max_buffer_size: u64,
    /// Usage hint for the per-flush batch buffers
    pub buffer_usage: BufferUsage,
}

impl Default for RenderQueueConfig {
    fn default() -> Self {
        Self {
            arena_chunk_size: DEFAULT_CHUNK_SIZE,
            max_buffer_size: 16 * 1024 * 1024,
            buffer_usage: BufferUsage::Stream,
        }
    }
}

/// What one submitted frame sent to the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: u32,
    pub batches: u32,
    pub meshes: u32,
    /// Number of draw calls this frame
    pub draw_calls: u32,
    pub buffer_pairs: u32,
    /// Bytes uploaded into batch buffers this frame
    pub uploaded_bytes: u64,
    pub scissor_changes: u32,
    pub vertex_bindings: u32,
    pub primitives: u32,
}

impl FrameStats {
    fn add_pass(&mut self, pass: &FlushStats) {
        self.passes += 1;
        self.batches += pass.batches;
        self.meshes += pass.meshes;
        self.draw_calls += pass.draw_calls;
        self.buffer_pairs += pass.buffer_pairs;
        self.uploaded_bytes += pass.uploaded_bytes;
        self.scissor_changes += pass.scissor_changes;
        self.vertex_bindings += pass.vertex_bindings;
        self.primitives += pass.primitives;
    }
}

// ============================================================================
// RenderQueue
// ============================================================================

pub struct RenderQueue {
    device: Arc<Mutex<dyn RenderDevice>>,
    arena: Rc<RefCell<FrameArena>>,
    cache: Rc<RefCell<ResourceCache>>,
    config: RenderQueueConfig,
    passes: Vec<RenderPass>,
    /// Frames submitted so far, failed ones included
    frame_count: u64,
}

impl RenderQueue {
    pub fn new(device: Arc<Mutex<dyn RenderDevice>>, config: RenderQueueConfig) -> Self {
        crate::engine_info!("galaxy::RenderQueue",
            "Render queue created (arena chunks of {} bytes, buffers up to {} bytes)",
            config.arena_chunk_size, config.max_buffer_size);

        Self {
            device,
            arena: Rc::new(RefCell::new(FrameArena::new(config.arena_chunk_size))),
            cache: Rc::new(RefCell::new(ResourceCache::new())),
            config,
            passes: Vec::new(),
            frame_count: 0,
        }
    }

    pub fn config(&self) -> &RenderQueueConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<Mutex<dyn RenderDevice>> {
        &self.device
    }

    /// Shared frame arena (rewound by `submit()`)
    pub fn arena(&self) -> &Rc<RefCell<FrameArena>> {
        &self.arena
    }

    /// Vertex attribute bindings kept across frames
    pub fn resource_cache(&self) -> &Rc<RefCell<ResourceCache>> {
        &self.cache
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // ===== PASSES =====

    /// Append a pass and return its encoder
    ///
    /// Passes are drawn in creation order. `constants`, when given, must have
    /// been allocated with `alloc_cbuffer()` during this frame.
    pub fn create_pass(
        &mut self,
        desc: PassDesc,
        samplers: Vec<SamplerBinding>,
        constants: Option<ConstantBufferHandle>,
    ) -> &mut CommandEncoder {
        let encoder = CommandEncoder::new(
            self.arena.clone(),
            self.cache.clone(),
            self.device.clone(),
            self.config.max_buffer_size,
            self.config.buffer_usage,
        );
        self.passes.push(RenderPass { desc, samplers, constants, encoder });

        let index = self.passes.len() - 1;
        crate::engine_trace!("galaxy::RenderQueue", "Pass {} created", index);
        &mut self.passes[index].encoder
    }

    /// Id of the most recently created pass
    pub fn last_pass_id(&self) -> Option<PassId> {
        self.passes.len().checked_sub(1).map(PassId)
    }

    pub fn pass(&self, id: PassId) -> Option<&RenderPass> {
        self.passes.get(id.0)
    }

    pub fn encoder(&mut self, id: PassId) -> Option<&mut CommandEncoder> {
        self.passes.get_mut(id.0).map(|pass| &mut pass.encoder)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    // ===== CONSTANTS =====

    /// Zeroed constant buffer in frame memory, laid out by `template`
    pub fn alloc_cbuffer(&mut self, template: &Arc<ConstantBufferTemplate>) -> ConstantBufferHandle {
        self.arena.borrow_mut().alloc_cbuffer(template)
    }

    /// Write one named field of a constant buffer
    ///
    /// `value` must be exactly the field's size.
    pub fn set_constant(&mut self, handle: &ConstantBufferHandle, name: &str, value: &[u8]) -> Result<()> {
        let field = match handle.template().field(name) {
            Some(field) => field,
            None => {
                crate::engine_error!("galaxy::RenderQueue", "Unknown constant '{}'", name);
                return Err(Error::InvalidResource(format!("unknown constant '{}'", name)));
            }
        };
        if value.len() != field.size {
            crate::engine_error!("galaxy::RenderQueue",
                "Constant '{}' is {} bytes, got {}", name, field.size, value.len());
            return Err(Error::InvalidResource(format!(
                "constant '{}' is {} bytes, got {}",
                name, field.size, value.len()
            )));
        }

        let mut arena = self.arena.borrow_mut();
        let bytes = arena.bytes_mut(handle.span());
        bytes[field.offset..field.offset + field.size].copy_from_slice(value);
        Ok(())
    }

    // ===== SUBMISSION =====

    /// Draw every pass of the frame and reset for the next one
    ///
    /// The passes are consumed even when a pass fails; the error is returned
    /// after the arena has been rewound.
    pub fn submit(&mut self) -> Result<FrameStats> {
        let passes = std::mem::take(&mut self.passes);
        let result = self.submit_passes(passes);

        self.arena.borrow_mut().discard();
        self.frame_count += 1;

        match &result {
            Ok(stats) => {
                crate::engine_debug!("galaxy::RenderQueue",
                    "Frame {} submitted: {} passes, {} draws, {} buffer pairs, {} bytes uploaded",
                    self.frame_count, stats.passes, stats.draw_calls,
                    stats.buffer_pairs, stats.uploaded_bytes);
            }
            Err(e) => {
                crate::engine_error!("galaxy::RenderQueue",
                    "Frame {} dropped: {}", self.frame_count, e);
            }
        }
        result
    }

    fn submit_passes(&self, passes: Vec<RenderPass>) -> Result<FrameStats> {
        let mut stats = FrameStats::default();

        for mut pass in passes {
            {
                let arena = self.arena.borrow();
                let constants = pass.constants.as_ref().map(|handle| arena.bytes(handle.span()));
                let mut device = lock_device(&self.device)?;
                device.begin_pass(&PassBegin {
                    desc: &pass.desc,
                    samplers: &pass.samplers,
                    constants,
                })?;
            }

            // The pass is closed even if its flush failed
            let flushed = pass.encoder.flush();
            let ended = lock_device(&self.device)?.end_pass();
            stats.add_pass(&flushed?);
            ended?;
        }

        Ok(stats)
    }
}

#[cfg(test)]
#[path = "render_queue_tests.rs"]
mod tests;
