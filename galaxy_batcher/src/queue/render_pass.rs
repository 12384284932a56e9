/// One render pass recorded for the current frame

use crate::device::{PassDesc, SamplerBinding};
use crate::encoder::CommandEncoder;
use crate::memory::ConstantBufferHandle;

/// Position of a pass in creation order within the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub usize);

/// Pass state plus the encoder recording its draws
pub struct RenderPass {
    pub desc: PassDesc,
    pub samplers: Vec<SamplerBinding>,
    pub constants: Option<ConstantBufferHandle>,
    pub(crate) encoder: CommandEncoder,
}

impl RenderPass {
    pub fn encoder(&self) -> &CommandEncoder {
        &self.encoder
    }

    pub fn encoder_mut(&mut self) -> &mut CommandEncoder {
        &mut self.encoder
    }
}
