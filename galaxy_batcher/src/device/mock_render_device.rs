/// Mock render device for unit tests (no GPU required)
///
/// Records every call so tests can check what the batcher sent to the
/// device, keeps the bytes uploaded into each buffer, and can be told to
/// fail buffer creation.

use std::sync::Arc;
use crate::device::{
    same_object, Buffer, BufferDesc, IndexType, VertexAttribs, VertexDeclaration,
    PassBegin, RenderCommand, RenderDevice, DrawCommand, ClearFlags, Rect2D,
};
use crate::error::{Error, Result};

// ============================================================================
// Mock resources
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub id: usize,
    pub size: u64,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug)]
pub struct MockVertexAttribs {
    pub id: usize,
    pub decl: VertexDeclaration,
}

impl VertexAttribs for MockVertexAttribs {
    fn decl(&self) -> &VertexDeclaration {
        &self.decl
    }
}

// ============================================================================
// Call log
// ============================================================================

#[derive(Debug, Clone)]
pub enum MockCall {
    CreateVertexBuffer { id: usize, size: u64 },
    CreateIndexBuffer { id: usize, size: u64, index_type: IndexType },
    UpdateBuffer { id: usize, offset: u64, len: usize },
    CreateVertexAttribs { id: usize, stride: u32 },
    BeginPass { viewport: Rect2D, clear: ClearFlags, samplers: usize, constants: Option<Vec<u8>> },
    EndPass,
    Execute(RenderCommand),
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockRenderDevice {
    pub calls: Vec<MockCall>,
    buffers: Vec<(Arc<dyn Buffer>, Vec<u8>)>,
    next_attribs_id: usize,
    /// Number of buffers that may still be created, `None` for unlimited
    buffer_budget: Option<usize>,
}

impl MockRenderDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            buffers: Vec::new(),
            next_attribs_id: 0,
            buffer_budget: None,
        }
    }

    /// Fail every buffer creation after `count` successful ones
    pub fn fail_after_buffers(mut self, count: usize) -> Self {
        self.buffer_budget = Some(count);
        self
    }

    fn create_buffer(&mut self, size: u64) -> Result<(usize, Arc<dyn Buffer>)> {
        if let Some(budget) = self.buffer_budget.as_mut() {
            if *budget == 0 {
                return Err(Error::OutOfMemory);
            }
            *budget -= 1;
        }
        let id = self.buffers.len();
        let buffer: Arc<dyn Buffer> = Arc::new(MockBuffer { id, size });
        self.buffers.push((buffer.clone(), vec![0u8; size as usize]));
        Ok((id, buffer))
    }

    /// Contents of a buffer created by this device
    pub fn buffer_bytes(&self, buffer: &Arc<dyn Buffer>) -> Option<&[u8]> {
        self.buffers
            .iter()
            .find(|(b, _)| same_object(b, buffer))
            .map(|(_, data)| data.as_slice())
    }

    pub fn executed(&self) -> Vec<RenderCommand> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Execute(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<DrawCommand> {
        self.executed()
            .into_iter()
            .filter_map(|cmd| match cmd {
                RenderCommand::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn vertex_buffer_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, MockCall::CreateVertexBuffer { .. })).count()
    }

    pub fn index_buffer_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, MockCall::CreateIndexBuffer { .. })).count()
    }

    pub fn attribs_created(&self) -> usize {
        self.next_attribs_id
    }
}

impl RenderDevice for MockRenderDevice {
    fn create_vertex_buffer(&mut self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        let (id, buffer) = self.create_buffer(desc.size)?;
        self.calls.push(MockCall::CreateVertexBuffer { id, size: desc.size });
        Ok(buffer)
    }

    fn create_index_buffer(&mut self, desc: &BufferDesc, index_type: IndexType) -> Result<Arc<dyn Buffer>> {
        let (id, buffer) = self.create_buffer(desc.size)?;
        self.calls.push(MockCall::CreateIndexBuffer { id, size: desc.size, index_type });
        Ok(buffer)
    }

    fn update_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, data: &[u8]) -> Result<()> {
        let (id, storage) = match self.buffers.iter_mut().enumerate().find(|(_, (b, _))| same_object(b, buffer)) {
            Some((id, (_, storage))) => (id, storage),
            None => crate::engine_bail!("galaxy::mock", "update_buffer: unknown buffer"),
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > storage.len() {
            crate::engine_bail!("galaxy::mock",
                "update_buffer: {} bytes at offset {} overflow buffer of {} bytes",
                data.len(), offset, storage.len());
        }
        storage[start..end].copy_from_slice(data);
        self.calls.push(MockCall::UpdateBuffer { id, offset, len: data.len() });
        Ok(())
    }

    fn create_vertex_attribs(&mut self, decl: &VertexDeclaration) -> Result<Arc<dyn VertexAttribs>> {
        let id = self.next_attribs_id;
        self.next_attribs_id += 1;
        self.calls.push(MockCall::CreateVertexAttribs { id, stride: decl.bytes_per_vertex() });
        Ok(Arc::new(MockVertexAttribs { id, decl: decl.clone() }))
    }

    fn begin_pass(&mut self, pass: &PassBegin<'_>) -> Result<()> {
        self.calls.push(MockCall::BeginPass {
            viewport: pass.desc.viewport,
            clear: pass.desc.clear,
            samplers: pass.samplers.len(),
            constants: pass.constants.map(|c| c.to_vec()),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        self.calls.push(MockCall::EndPass);
        Ok(())
    }

    fn execute(&mut self, command: RenderCommand) -> Result<()> {
        self.calls.push(MockCall::Execute(command));
        Ok(())
    }
}
