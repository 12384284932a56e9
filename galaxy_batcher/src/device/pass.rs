/// Render pass descriptors handed to the device when a pass begins

use std::fmt;
use std::sync::Arc;
use bitflags::bitflags;
use crate::device::Rect2D;

bitflags! {
    /// Attachments cleared when a pass begins
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 0b001;
        const DEPTH = 0b010;
        const STENCIL = 0b100;
    }
}

/// Off-screen render target
pub trait RenderTarget: fmt::Debug + Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Target, viewport and clear state of one pass
#[derive(Debug, Clone)]
pub struct PassDesc {
    /// `None` renders to the back buffer
    pub target: Option<Arc<dyn RenderTarget>>,
    pub viewport: Rect2D,
    pub clear: ClearFlags,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u8,
}

impl PassDesc {
    /// Back buffer pass with nothing cleared
    pub fn new(viewport: Rect2D) -> Self {
        Self {
            target: None,
            viewport,
            clear: ClearFlags::empty(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }

    pub fn with_target(mut self, target: Arc<dyn RenderTarget>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear |= ClearFlags::COLOR;
        self.clear_color = color;
        self
    }

    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear |= ClearFlags::DEPTH;
        self.clear_depth = depth;
        self
    }

    pub fn with_clear_stencil(mut self, stencil: u8) -> Self {
        self.clear |= ClearFlags::STENCIL;
        self.clear_stencil = stencil;
        self
    }
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Sampler state bound to a named shader slot for the whole pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub address_mode: AddressMode,
}

impl SamplerBinding {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.min_filter = filter;
        self.mag_filter = filter;
        self
    }

    pub fn with_address_mode(mut self, address_mode: AddressMode) -> Self {
        self.address_mode = address_mode;
        self
    }
}

/// Everything the device needs to begin a pass
#[derive(Debug, Clone, Copy)]
pub struct PassBegin<'a> {
    pub desc: &'a PassDesc,
    pub samplers: &'a [SamplerBinding],
    /// Packed pass constants, if the pass has a constant buffer
    pub constants: Option<&'a [u8]>,
}
