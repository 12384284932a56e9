/// Cache of device objects that live as long as the device
///
/// Vertex attribute bindings are created once per vertex type, from the
/// type's declaration padded to the stream stride, and reused by every
/// batch of that type afterwards.

use std::any::{type_name, TypeId};
use std::mem::size_of;
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::device::{RenderDevice, Vertex, VertexAttribs};
use crate::error::Result;
use crate::memory::VERTEX_STRIDE_ALIGNMENT;

pub struct ResourceCache {
    /// Keyed by vertex type identity, not by layout content
    vertex_attribs: FxHashMap<TypeId, Arc<dyn VertexAttribs>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            vertex_attribs: FxHashMap::default(),
        }
    }

    /// Attribute binding for vertex type `V`, created on first request
    ///
    /// Two distinct types get distinct bindings even when their fields are
    /// laid out identically.
    pub fn create_vertex_attribs<V: Vertex + 'static>(
        &mut self,
        device: &mut dyn RenderDevice,
    ) -> Result<Arc<dyn VertexAttribs>> {
        if let Some(attribs) = self.vertex_attribs.get(&TypeId::of::<V>()) {
            return Ok(attribs.clone());
        }

        let decl = V::decl();
        debug_assert_eq!(
            decl.bytes_per_vertex() as usize,
            size_of::<V>(),
            "declaration of {} does not cover the whole type",
            type_name::<V>()
        );
        let decl = decl.padded_to(VERTEX_STRIDE_ALIGNMENT as u32);

        let attribs = device.create_vertex_attribs(&decl)?;
        crate::engine_debug!("galaxy::ResourceCache",
            "Vertex attribs created for {} ({} attributes, stride {})",
            type_name::<V>(), decl.attributes().len(), decl.bytes_per_vertex());

        self.vertex_attribs.insert(TypeId::of::<V>(), attribs.clone());
        Ok(attribs)
    }

    /// Whether a binding for `V` is cached
    pub fn contains<V: Vertex + 'static>(&self) -> bool {
        self.vertex_attribs.contains_key(&TypeId::of::<V>())
    }

    pub fn len(&self) -> usize {
        self.vertex_attribs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_attribs.is_empty()
    }

    /// Drop every cached binding (e.g. after the device was recreated)
    pub fn clear(&mut self) {
        self.vertex_attribs.clear();
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "resource_cache_tests.rs"]
mod tests;
