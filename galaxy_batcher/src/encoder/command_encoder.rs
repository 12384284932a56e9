/// Per-pass recorder of batches and meshes
///
/// Recording is CPU only: batch geometry goes into the frame arena and the
/// records are kept in insertion order. `flush()` uploads every pending batch
/// into as few buffer pairs as the size ceiling allows, grouping the vertices
/// of each type into one region per pair, then issues one draw per record in
/// sort-key order.

use std::cell::{RefCell, RefMut};
use std::marker::PhantomData;
use std::mem::size_of;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use bytemuck::Pod;
use rdst::RadixSort;
use crate::device::{
    lock_device, same_object, Buffer, BufferDesc, BufferUsage, DrawCommand, IndexType,
    IndexedDraw, MaterialKey, PrimitiveTopology, Rect2D, RenderCommand, RenderDevice, Vertex,
    VertexAttribs, VertexBufferBinding,
};
use crate::encoder::{Batchable, BatchStorage, DrawBatch, DrawMesh};
use crate::error::{Error, Result};
use crate::memory::{
    vertex_stride, ArenaSpan, FrameArena, Index, IndexIterator, VertexIterator,
    VERTEX_STRIDE_ALIGNMENT,
};
use crate::resource::ResourceCache;

// ============================================================================
// Statistics
// ============================================================================

/// What one flush sent to the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Transient batches uploaded
    pub batches: u32,
    /// Pre-built meshes drawn
    pub meshes: u32,
    pub draw_calls: u32,
    /// Vertex/index buffer pairs created for the batches
    pub buffer_pairs: u32,
    /// Bytes written with `update_buffer`
    pub uploaded_bytes: u64,
    pub scissor_changes: u32,
    pub vertex_bindings: u32,
    /// Points, lines or triangles drawn
    pub primitives: u32,
}

// ============================================================================
// Recording
// ============================================================================

/// A record tagged with its sort key and insertion sequence
#[derive(Debug, Clone)]
struct Keyed<T> {
    sort_key: u32,
    seq: u32,
    item: T,
}

/// Draw order: sort key first, insertion sequence breaks ties
#[inline]
fn order_key(sort_key: u32, seq: u32) -> u64 {
    ((sort_key as u64) << 32) | seq as u64
}

/// Writer over the arena bytes reserved by `CommandEncoder::alloc_batch`
///
/// Holds the arena borrowed until dropped.
pub struct BatchWriter<'a, V: Pod> {
    arena: RefMut<'a, FrameArena>,
    span: ArenaSpan,
    vertex_bytes: usize,
    _vertex: PhantomData<V>,
}

impl<'a, V: Pod> BatchWriter<'a, V> {
    /// Cursors over the batch's vertices and indices
    pub fn streams(&mut self) -> (VertexIterator<'_, V>, IndexIterator<'_>) {
        let bytes = self.arena.bytes_mut(self.span);
        let (vertices, indices) = bytes.split_at_mut(self.vertex_bytes);
        (VertexIterator::new(vertices), IndexIterator::new(indices))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_bytes / vertex_stride::<V>()
    }

    pub fn index_count(&self) -> usize {
        (self.span.len() - self.vertex_bytes) / size_of::<Index>()
    }
}

/// Placement of one batch inside a buffer pair
#[derive(Debug, Clone, Copy)]
struct Placement {
    pair: usize,
    region: usize,
    /// First vertex of the batch inside its region
    base_vertex: u32,
    index_offset: u64,
}

/// Vertices of one type packed back to back inside a pair's vertex buffer
///
/// Indices are rebased onto the region start, so a region never holds more
/// vertices than 16-bit indices can address.
#[derive(Debug, Clone)]
struct VertexRegion {
    attribs: Arc<dyn VertexAttribs>,
    stride: u64,
    vertex_count: u64,
    /// Byte offset in the vertex buffer, set once the pair is planned
    offset: u64,
}

impl VertexRegion {
    fn size(&self) -> u64 {
        self.vertex_count * self.stride
    }
}

/// Accumulated size of one buffer pair
#[derive(Debug, Clone, Default)]
struct PairPlan {
    vertex_size: u64,
    index_size: u64,
    regions: Vec<VertexRegion>,
}

impl PairPlan {
    /// Region receiving `vertex_count` more vertices of `attribs`
    fn region_for(&mut self, attribs: &Arc<dyn VertexAttribs>, stride: u64, vertex_count: u64) -> usize {
        let open = self
            .regions
            .iter()
            .rposition(|region| same_object(&region.attribs, attribs));
        match open {
            Some(index) if self.regions[index].vertex_count + vertex_count <= MAX_REGION_VERTICES => index,
            _ => {
                self.regions.push(VertexRegion {
                    attribs: attribs.clone(),
                    stride,
                    vertex_count: 0,
                    offset: 0,
                });
                self.regions.len() - 1
            }
        }
    }

    /// Lay the regions out in the order they were opened
    fn assign_region_offsets(&mut self) {
        let mut offset = 0;
        for region in &mut self.regions {
            region.offset = offset;
            offset += region.size();
        }
    }
}

/// Vertices addressable by 16-bit indices
const MAX_REGION_VERTICES: u64 = Index::MAX as u64 + 1;

/// Records the draws of one pass
pub struct CommandEncoder {
    arena: Rc<RefCell<FrameArena>>,
    cache: Rc<RefCell<ResourceCache>>,
    device: Arc<Mutex<dyn RenderDevice>>,
    /// Ceiling on each buffer of a pair, in bytes
    max_buffer_size: u64,
    buffer_usage: BufferUsage,
    batches: Vec<Keyed<DrawBatch>>,
    meshes: Vec<Keyed<DrawMesh>>,
    next_seq: u32,
}

impl CommandEncoder {
    pub(crate) fn new(
        arena: Rc<RefCell<FrameArena>>,
        cache: Rc<RefCell<ResourceCache>>,
        device: Arc<Mutex<dyn RenderDevice>>,
        max_buffer_size: u64,
        buffer_usage: BufferUsage,
    ) -> Self {
        Self {
            arena,
            cache,
            device,
            max_buffer_size,
            buffer_usage,
            batches: Vec::new(),
            meshes: Vec::new(),
            next_seq: 0,
        }
    }

    fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Record a batch written by `source`
    ///
    /// Sources without indices, such as a polyline of fewer than two points,
    /// draw nothing and are skipped.
    pub fn add_batch<B: Batchable>(
        &mut self,
        sort_key: u32,
        material: MaterialKey,
        source: &B,
        scissor: Option<Rect2D>,
    ) -> Result<()> {
        if source.index_count() == 0 {
            return Ok(());
        }
        let mut writer = self.alloc_batch::<B::Vertex>(
            sort_key,
            source.vertex_count(),
            source.index_count(),
            source.topology(),
            material,
            scissor,
        )?;
        let (mut vertices, mut indices) = writer.streams();
        source.write_vertices(&mut vertices);
        source.write_indices(&mut indices);
        Ok(())
    }

    /// Reserve arena space for a batch and record it
    ///
    /// The returned writer must be filled before the pass is flushed; bytes
    /// left unwritten are uploaded as they are.
    ///
    /// # Panics
    ///
    /// If `index_count` does not form whole primitives of `topology`, if
    /// `vertex_count` is zero, or if the vertices cannot be addressed with
    /// 16-bit indices.
    pub fn alloc_batch<V: Vertex + 'static>(
        &mut self,
        sort_key: u32,
        vertex_count: usize,
        index_count: usize,
        topology: PrimitiveTopology,
        material: MaterialKey,
        scissor: Option<Rect2D>,
    ) -> Result<BatchWriter<'_, V>> {
        assert!(
            topology.accepts_index_count(index_count),
            "{:?} batch cannot be drawn with {} indices",
            topology, index_count
        );
        assert!(vertex_count > 0, "batch without vertices");
        assert!(
            vertex_count <= Index::MAX as usize + 1,
            "batch of {} vertices exceeds 16-bit indices",
            vertex_count
        );

        let attribs = {
            let mut device = lock_device(&self.device)?;
            let mut cache = self.cache.borrow_mut();
            cache.create_vertex_attribs::<V>(&mut *device)?
        };

        let vertex_bytes = vertex_count * vertex_stride::<V>();
        let index_bytes = index_count * size_of::<Index>();
        let span = self
            .arena
            .borrow_mut()
            .alloc(vertex_bytes + index_bytes, VERTEX_STRIDE_ALIGNMENT);

        let seq = self.take_seq();
        self.batches.push(Keyed {
            sort_key,
            seq,
            item: DrawBatch {
                material,
                topology,
                attribs,
                vertex_count: vertex_count as u32,
                index_count: index_count as u32,
                scissor,
                storage: BatchStorage::Pending { span, vertex_bytes, index_bytes },
            },
        });

        Ok(BatchWriter {
            arena: self.arena.borrow_mut(),
            span,
            vertex_bytes,
            _vertex: PhantomData,
        })
    }

    /// Record a draw of geometry already in device buffers
    pub fn draw_mesh(
        &mut self,
        sort_key: u32,
        material: MaterialKey,
        vertices: VertexBufferBinding,
        indexed: IndexedDraw,
        scissor: Option<Rect2D>,
    ) {
        assert!(
            indexed.topology.accepts_index_count(indexed.index_count as usize),
            "{:?} mesh cannot be drawn with {} indices",
            indexed.topology, indexed.index_count
        );
        let seq = self.take_seq();
        self.meshes.push(Keyed {
            sort_key,
            seq,
            item: DrawMesh { material, vertices, indexed, scissor },
        });
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.meshes.is_empty()
    }

    /// Recorded batches in insertion order
    pub fn batches(&self) -> impl Iterator<Item = &DrawBatch> {
        self.batches.iter().map(|keyed| &keyed.item)
    }

    /// Drop everything recorded without drawing it
    pub fn clear(&mut self) {
        self.batches.clear();
        self.meshes.clear();
        self.next_seq = 0;
    }

    // ===== FLUSH =====

    /// Upload pending batches and issue every record to the device
    ///
    /// Must run between `begin_pass` and `end_pass`. The recorded entries are
    /// dropped whether or not the flush succeeds.
    pub(crate) fn flush(&mut self) -> Result<FlushStats> {
        let result = self.flush_records();
        self.clear();
        result
    }

    fn flush_records(&mut self) -> Result<FlushStats> {
        let mut stats = FlushStats {
            batches: self.batches.len() as u32,
            meshes: self.meshes.len() as u32,
            ..Default::default()
        };
        if self.is_empty() {
            return Ok(stats);
        }

        let device_handle = self.device.clone();
        let mut device = lock_device(&device_handle)?;

        let (plans, placements) = self.plan_buffer_pairs()?;
        let pairs = self.upload_batches(&mut *device, &plans, &placements, &mut stats)?;
        stats.buffer_pairs = pairs.len() as u32;

        // Every record lands in the slot of its insertion sequence
        let mut records: Vec<Option<DrawMesh>> = vec![None; self.next_seq as usize];
        let mut order = Vec::with_capacity(records.len());

        for keyed in &self.batches {
            let mesh = to_mesh(&keyed.item, &pairs)?;
            records[keyed.seq as usize] = Some(mesh);
            order.push(order_key(keyed.sort_key, keyed.seq));
        }
        for keyed in self.meshes.drain(..) {
            records[keyed.seq as usize] = Some(keyed.item);
            order.push(order_key(keyed.sort_key, keyed.seq));
        }

        // Keys are unique, so the unstable radix sort is order preserving
        order.radix_sort_unstable();

        let mut scissor: Option<Rect2D> = None;
        let mut bound: Option<VertexBufferBinding> = None;

        for key in order {
            let Some(mesh) = records[key as u32 as usize].take() else {
                continue;
            };

            if mesh.scissor != scissor {
                device.execute(RenderCommand::SetScissor(mesh.scissor))?;
                scissor = mesh.scissor;
                stats.scissor_changes += 1;
            }

            let rebind = !bound
                .as_ref()
                .is_some_and(|binding| binding.same_binding(&mesh.vertices));
            if rebind {
                device.execute(RenderCommand::BindVertexBuffers(mesh.vertices.clone()))?;
                bound = Some(mesh.vertices);
                stats.vertex_bindings += 1;
            }

            stats.primitives += mesh.indexed.topology.primitive_count(mesh.indexed.index_count);
            device.execute(RenderCommand::Draw(DrawCommand {
                material: mesh.material,
                indexed: mesh.indexed,
            }))?;
            stats.draw_calls += 1;
        }

        crate::engine_trace!("galaxy::CommandEncoder",
            "Flushed {} batches and {} meshes: {} draws, {} buffer pairs, {} bytes uploaded",
            stats.batches, stats.meshes, stats.draw_calls, stats.buffer_pairs, stats.uploaded_bytes);

        Ok(stats)
    }

    /// Split pending batches, in insertion order, into buffer pairs
    fn plan_buffer_pairs(&self) -> Result<(Vec<PairPlan>, Vec<Placement>)> {
        let mut plans: Vec<PairPlan> = Vec::new();
        let mut placements = Vec::with_capacity(self.batches.len());

        for keyed in &self.batches {
            let (vertex_bytes, index_bytes) = match keyed.item.storage {
                BatchStorage::Pending { vertex_bytes, index_bytes, .. } => {
                    (vertex_bytes as u64, index_bytes as u64)
                }
                BatchStorage::Uploaded { .. } => {
                    return Err(Error::InvalidResource("batch uploaded twice".to_string()));
                }
            };

            if vertex_bytes > self.max_buffer_size || index_bytes > self.max_buffer_size {
                crate::engine_error!("galaxy::CommandEncoder",
                    "Batch of {} vertex bytes and {} index bytes exceeds the {} byte buffer limit",
                    vertex_bytes, index_bytes, self.max_buffer_size);
                return Err(Error::InvalidResource(format!(
                    "batch of {} vertex bytes and {} index bytes exceeds the {} byte buffer limit",
                    vertex_bytes, index_bytes, self.max_buffer_size
                )));
            }

            let spill = match plans.last() {
                Some(plan) => {
                    plan.vertex_size + vertex_bytes > self.max_buffer_size
                        || plan.index_size + index_bytes > self.max_buffer_size
                }
                None => true,
            };
            if spill {
                plans.push(PairPlan::default());
            }

            let pair = plans.len() - 1;
            let plan = &mut plans[pair];
            let vertex_count = keyed.item.vertex_count as u64;
            let stride = vertex_bytes / vertex_count;
            let region = plan.region_for(&keyed.item.attribs, stride, vertex_count);

            let base_vertex = plan.regions[region].vertex_count as u32;
            placements.push(Placement {
                pair,
                region,
                base_vertex,
                index_offset: plan.index_size,
            });
            plan.regions[region].vertex_count += vertex_count;
            plan.vertex_size += vertex_bytes;
            plan.index_size += index_bytes;
        }

        for plan in &mut plans {
            plan.assign_region_offsets();
        }
        Ok((plans, placements))
    }

    /// Create the buffer pairs and copy every batch out of the arena
    ///
    /// Index values are shifted by the batch's first vertex in its region.
    fn upload_batches(
        &mut self,
        device: &mut dyn RenderDevice,
        plans: &[PairPlan],
        placements: &[Placement],
        stats: &mut FlushStats,
    ) -> Result<Vec<(Arc<dyn Buffer>, Arc<dyn Buffer>)>> {
        let mut pairs = Vec::with_capacity(plans.len());
        for plan in plans {
            let vertex_buffer = device.create_vertex_buffer(&BufferDesc {
                size: plan.vertex_size,
                usage: self.buffer_usage,
            })?;
            let index_buffer = device.create_index_buffer(
                &BufferDesc { size: plan.index_size, usage: self.buffer_usage },
                IndexType::U16,
            )?;
            pairs.push((vertex_buffer, index_buffer));
        }

        let arena = self.arena.borrow();
        for (keyed, placement) in self.batches.iter_mut().zip(placements) {
            let BatchStorage::Pending { span, vertex_bytes, .. } = keyed.item.storage else {
                continue;
            };
            let (vertex_buffer, index_buffer) = &pairs[placement.pair];
            let region = &plans[placement.pair].regions[placement.region];
            let (vertices, indices) = arena.bytes(span).split_at(vertex_bytes);

            let vertex_offset = region.offset + placement.base_vertex as u64 * region.stride;
            device.update_buffer(vertex_buffer, vertex_offset, vertices)?;
            if placement.base_vertex == 0 {
                device.update_buffer(index_buffer, placement.index_offset, indices)?;
            } else {
                let rebased = rebase_indices(indices, placement.base_vertex)?;
                device.update_buffer(index_buffer, placement.index_offset, bytemuck::cast_slice(&rebased))?;
            }
            stats.uploaded_bytes += span.len() as u64;

            keyed.item.storage = BatchStorage::Uploaded {
                pair: placement.pair,
                region_offset: region.offset,
                base_vertex: placement.base_vertex,
                first_index: (placement.index_offset / size_of::<Index>() as u64) as u32,
            };
        }

        Ok(pairs)
    }
}

/// Shift every index by `base_vertex`
fn rebase_indices(bytes: &[u8], base_vertex: u32) -> Result<Vec<Index>> {
    let mut indices: Vec<Index> = bytemuck::pod_collect_to_vec(bytes);
    for index in &mut indices {
        let value = *index;
        match Index::try_from(u32::from(value) + base_vertex) {
            Ok(rebased) => *index = rebased,
            Err(_) => {
                crate::engine_error!("galaxy::CommandEncoder",
                    "Index {} of a batch starting at vertex {} does not fit in 16 bits",
                    value, base_vertex);
                return Err(Error::InvalidResource(format!(
                    "index {} of a batch starting at vertex {} does not fit in 16 bits",
                    value, base_vertex
                )));
            }
        }
    }
    Ok(indices)
}

/// Draw record of an uploaded batch
///
/// The binding covers the batch's whole region, so batches sharing a region
/// share a binding.
fn to_mesh(batch: &DrawBatch, pairs: &[(Arc<dyn Buffer>, Arc<dyn Buffer>)]) -> Result<DrawMesh> {
    let BatchStorage::Uploaded { pair, region_offset, first_index, .. } = batch.storage else {
        return Err(Error::InvalidResource("batch drawn before upload".to_string()));
    };
    let (vertex_buffer, index_buffer) = &pairs[pair];

    Ok(DrawMesh {
        material: batch.material,
        vertices: VertexBufferBinding::new(vertex_buffer.clone(), batch.attribs.clone())
            .with_offset(region_offset),
        indexed: IndexedDraw {
            buffer: index_buffer.clone(),
            index_type: IndexType::U16,
            index_count: batch.index_count,
            first_index,
            topology: batch.topology,
        },
        scissor: batch.scissor,
    })
}

#[cfg(test)]
#[path = "command_encoder_tests.rs"]
mod tests;
