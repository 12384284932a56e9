/// Tests for CommandEncoder
///
/// Every test records into an encoder wired to a MockRenderDevice and checks
/// the calls the flush produced.

use super::*;
use crate::device::mock_render_device::{MockBuffer, MockCall, MockRenderDevice};
use crate::device::VertexAttribs;
use crate::encoder::{ColorVertex, ColoredQuad, PolyLine, TexturedQuad};
use glam::{Vec2, Vec3};
use slotmap::SlotMap;

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    mock: Arc<Mutex<MockRenderDevice>>,
    arena: Rc<RefCell<FrameArena>>,
    encoder: CommandEncoder,
    materials: SlotMap<MaterialKey, ()>,
}

fn fixture_with(mock: MockRenderDevice, max_buffer_size: u64) -> Fixture {
    let mock = Arc::new(Mutex::new(mock));
    let device: Arc<Mutex<dyn RenderDevice>> = mock.clone();
    let arena = Rc::new(RefCell::new(FrameArena::new(64 * 1024)));
    let cache = Rc::new(RefCell::new(ResourceCache::new()));
    let encoder = CommandEncoder::new(
        arena.clone(),
        cache,
        device,
        max_buffer_size,
        BufferUsage::Stream,
    );
    Fixture { mock, arena, encoder, materials: SlotMap::with_key() }
}

fn fixture() -> Fixture {
    fixture_with(MockRenderDevice::new(), 1024 * 1024)
}

fn quad() -> ColoredQuad {
    ColoredQuad::new(Vec2::ZERO, Vec2::new(10.0, 10.0), [255, 0, 0, 255])
}

fn index_values(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}

fn bound_vertex_buffers(mock: &MockRenderDevice) -> Vec<VertexBufferBinding> {
    mock.executed()
        .into_iter()
        .filter_map(|cmd| match cmd {
            RenderCommand::BindVertexBuffers(binding) => Some(binding),
            _ => None,
        })
        .collect()
}

/// A resident mesh: 4 vertices, 6 indices
fn resident_mesh(mock: &Arc<Mutex<MockRenderDevice>>) -> (VertexBufferBinding, IndexedDraw) {
    let mut device = mock.lock().unwrap();
    let vertices = device
        .create_vertex_buffer(&BufferDesc { size: 64, usage: BufferUsage::Static })
        .unwrap();
    let indices = device
        .create_index_buffer(&BufferDesc { size: 12, usage: BufferUsage::Static }, IndexType::U16)
        .unwrap();
    let attribs = device.create_vertex_attribs(&ColorVertex::decl()).unwrap();

    let indexed = IndexedDraw {
        buffer: indices,
        index_type: IndexType::U16,
        index_count: 6,
        first_index: 0,
        topology: PrimitiveTopology::Triangles,
    };
    (VertexBufferBinding::new(vertices, attribs), indexed)
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn test_recording_does_not_touch_buffers() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();

    assert_eq!(f.encoder.batch_count(), 1);
    let mock = f.mock.lock().unwrap();
    assert_eq!(mock.vertex_buffer_count(), 0);
    assert_eq!(mock.index_buffer_count(), 0);
    assert_eq!(mock.attribs_created(), 1);
}

#[test]
fn test_batch_geometry_lands_in_arena() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();

    let batch = f.encoder.batches().next().unwrap().clone();
    let vertex_span = batch.vertex_span().unwrap();
    let index_span = batch.index_span().unwrap();
    assert_eq!(vertex_span.len(), 4 * 16);
    assert_eq!(index_span.len(), 6 * 2);

    let arena = f.arena.borrow();
    assert_eq!(index_values(arena.bytes(index_span)), vec![0, 1, 2, 2, 3, 0]);
    let first: ColorVertex = bytemuck::pod_read_unaligned(&arena.bytes(vertex_span)[..16]);
    assert_eq!(first.position, Vec3::ZERO);
    assert_eq!(first.color, [255, 0, 0, 255]);
}

#[test]
fn test_alloc_batch_accepts_whole_triangles() {
    let mut f = fixture();
    let material = f.materials.insert(());

    let mut writer = f
        .encoder
        .alloc_batch::<ColorVertex>(0, 4, 6, PrimitiveTopology::Triangles, material, None)
        .unwrap();
    assert_eq!(writer.vertex_count(), 4);
    assert_eq!(writer.index_count(), 6);

    let (mut vertices, mut indices) = writer.streams();
    assert_eq!(vertices.len(), 4);
    assert_eq!(indices.len(), 6);
    vertices.push(ColorVertex { position: Vec3::X, color: [1, 2, 3, 4] });
    indices.push(3);
}

#[test]
#[should_panic(expected = "cannot be drawn with 4 indices")]
fn test_alloc_batch_rejects_partial_triangles() {
    let mut f = fixture();
    let material = f.materials.insert(());

    let _ = f
        .encoder
        .alloc_batch::<ColorVertex>(0, 4, 4, PrimitiveTopology::Triangles, material, None);
}

#[test]
#[should_panic(expected = "cannot be drawn with 2 indices")]
fn test_alloc_batch_rejects_short_strip() {
    let mut f = fixture();
    let material = f.materials.insert(());

    let _ = f
        .encoder
        .alloc_batch::<ColorVertex>(0, 2, 2, PrimitiveTopology::TriangleStrip, material, None);
}

#[test]
fn test_clear_drops_records() {
    let mut f = fixture();
    let material = f.materials.insert(());
    let (vertices, indexed) = resident_mesh(&f.mock);

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    f.encoder.draw_mesh(0, material, vertices, indexed, None);
    assert_eq!(f.encoder.mesh_count(), 1);

    f.encoder.clear();
    assert!(f.encoder.is_empty());

    let stats = f.encoder.flush().unwrap();
    assert_eq!(stats, FlushStats::default());
    assert!(f.mock.lock().unwrap().executed().is_empty());
}

#[test]
fn test_batch_equality() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    f.encoder.add_batch(0, material, &quad(), None).unwrap();

    let batches: Vec<DrawBatch> = f.encoder.batches().cloned().collect();
    assert_eq!(batches[0], batches[0].clone());
    // same material and layout, different bytes
    assert_ne!(batches[0], batches[1]);
    assert!(Arc::ptr_eq(&batches[0].attribs, &batches[1].attribs));
}

// ============================================================================
// Flush ordering
// ============================================================================

#[test]
fn test_sort_key_order_is_stable() {
    let mut f = fixture();
    let keys = [5u32, 1, 5, 3];
    let materials: Vec<MaterialKey> = keys.iter().map(|_| f.materials.insert(())).collect();

    for (key, material) in keys.iter().zip(&materials) {
        f.encoder.add_batch(*key, *material, &quad(), None).unwrap();
    }
    let stats = f.encoder.flush().unwrap();

    let drawn: Vec<MaterialKey> = f.mock.lock().unwrap().draws().iter().map(|d| d.material).collect();
    // keys [1, 3, 5, 5], the two 5s in insertion order
    assert_eq!(drawn, vec![materials[1], materials[3], materials[0], materials[2]]);
    assert_eq!(stats.draw_calls, 4);
    assert_eq!(stats.primitives, 8);
    assert!(f.encoder.is_empty());
}

#[test]
fn test_meshes_and_batches_share_the_sequence() {
    let mut f = fixture();
    let batch_material = f.materials.insert(());
    let mesh_material = f.materials.insert(());
    let (vertices, indexed) = resident_mesh(&f.mock);

    f.encoder.draw_mesh(2, mesh_material, vertices.clone(), indexed.clone(), None);
    f.encoder.add_batch(2, batch_material, &quad(), None).unwrap();
    f.encoder.draw_mesh(1, mesh_material, vertices, indexed, None);

    f.encoder.flush().unwrap();

    let drawn: Vec<MaterialKey> = f.mock.lock().unwrap().draws().iter().map(|d| d.material).collect();
    assert_eq!(drawn, vec![mesh_material, mesh_material, batch_material]);
}

#[test]
fn test_mesh_draw_is_passed_through() {
    let mut f = fixture();
    let material = f.materials.insert(());
    let (vertices, mut indexed) = resident_mesh(&f.mock);
    indexed.first_index = 3;
    indexed.index_count = 3;

    f.encoder.draw_mesh(0, material, vertices.clone(), indexed.clone(), None);
    let stats = f.encoder.flush().unwrap();

    let mock = f.mock.lock().unwrap();
    let draws = mock.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].indexed.first_index, 3);
    assert_eq!(draws[0].indexed.index_count, 3);
    assert!(Arc::ptr_eq(&draws[0].indexed.buffer, &indexed.buffer));
    // only the two buffers made by the helper
    assert_eq!(mock.vertex_buffer_count(), 1);
    assert_eq!(stats.buffer_pairs, 0);
    assert_eq!(stats.uploaded_bytes, 0);
}

// ============================================================================
// Uploads
// ============================================================================

#[test]
fn test_single_pair_upload() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.buffer_pairs, 1);
    assert_eq!(stats.uploaded_bytes, 2 * (64 + 12));

    let mock = f.mock.lock().unwrap();
    assert!(mock.calls.iter().any(|c| matches!(c, MockCall::CreateVertexBuffer { size: 128, .. })));
    assert!(mock.calls.iter().any(|c| matches!(c,
        MockCall::CreateIndexBuffer { size: 24, index_type: IndexType::U16, .. })));

    let draws = mock.draws();
    assert_eq!(draws[0].indexed.first_index, 0);
    assert_eq!(draws[1].indexed.first_index, 6);
    assert!(Arc::ptr_eq(&draws[0].indexed.buffer, &draws[1].indexed.buffer));

    // the second quad's indices count from the start of the shared region
    let indices = mock.buffer_bytes(&draws[0].indexed.buffer).unwrap();
    assert_eq!(index_values(indices), vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);

    // one region, bound once
    assert_eq!(stats.vertex_bindings, 1);
    let bindings = bound_vertex_buffers(&mock);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].offset, 0);
}

#[test]
fn test_batches_spill_into_new_pairs() {
    // two quads (64 vertex bytes each) fill one vertex buffer
    let mut f = fixture_with(MockRenderDevice::new(), 128);
    let material = f.materials.insert(());

    for _ in 0..3 {
        f.encoder.add_batch(0, material, &quad(), None).unwrap();
    }
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.buffer_pairs, 2);
    assert_eq!(stats.vertex_bindings, 2);

    let mock = f.mock.lock().unwrap();
    assert_eq!(mock.vertex_buffer_count(), 2);
    assert_eq!(mock.index_buffer_count(), 2);

    let bindings = bound_vertex_buffers(&mock);
    assert_eq!(bindings.iter().map(|b| b.offset).collect::<Vec<_>>(), vec![0, 0]);
    assert!(!Arc::ptr_eq(&bindings[0].buffer, &bindings[1].buffer));

    let draws = mock.draws();
    assert_eq!(
        draws.iter().map(|d| d.indexed.first_index).collect::<Vec<_>>(),
        vec![0, 6, 0]
    );
    let first = mock.buffer_bytes(&draws[0].indexed.buffer).unwrap();
    assert_eq!(index_values(first), vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
    // the spilled quad starts its own region again
    let second = mock.buffer_bytes(&draws[2].indexed.buffer).unwrap();
    assert_eq!(index_values(second), vec![0, 1, 2, 2, 3, 0]);
    assert_eq!(mock.buffer_bytes(&bindings[1].buffer).map(|b| b.len()), Some(64));
}

#[test]
fn test_index_bytes_also_trigger_spill() {
    let mut f = fixture_with(MockRenderDevice::new(), 128);
    let material = f.materials.insert(());

    // 16 vertex bytes and 120 index bytes each: the indices overflow first
    for _ in 0..2 {
        let mut writer = f
            .encoder
            .alloc_batch::<ColorVertex>(0, 1, 60, PrimitiveTopology::Points, material, None)
            .unwrap();
        let (mut vertices, mut indices) = writer.streams();
        vertices.push(ColorVertex { position: Vec3::ZERO, color: [0; 4] });
        for _ in 0..60 {
            indices.push(0);
        }
    }
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.buffer_pairs, 2);
    assert_eq!(stats.primitives, 120);
    let mock = f.mock.lock().unwrap();
    assert!(mock.draws().iter().all(|d| d.indexed.first_index == 0));
}

#[test]
fn test_polyline_and_quads_share_a_pair() {
    let mut f = fixture_with(MockRenderDevice::new(), 256);
    let material = f.materials.insert(());
    let points: Vec<Vec3> = (0..9).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    let line = PolyLine::new(points, [0, 255, 0, 255]);

    f.encoder.add_batch(0, material, &line, None).unwrap();
    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    // 144 + 64 vertex bytes fit in 256, a second line does not
    f.encoder.add_batch(0, material, &line, None).unwrap();
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.buffer_pairs, 2);
    assert_eq!(stats.primitives, 8 + 2 + 8);
    let mock = f.mock.lock().unwrap();
    let draws = mock.draws();
    assert_eq!(
        draws.iter().map(|d| d.indexed.first_index).collect::<Vec<_>>(),
        vec![0, 16, 0]
    );
    // same vertex type: the quad follows the line's 9 vertices
    let indices = mock.buffer_bytes(&draws[0].indexed.buffer).unwrap();
    assert_eq!(&index_values(indices)[16..], &[9, 10, 11, 11, 12, 9]);
    assert_eq!(stats.vertex_bindings, 2);
}

#[test]
fn test_vertex_types_get_their_own_regions() {
    let mut f = fixture();
    let material = f.materials.insert(());
    let sprite = TexturedQuad::new(Vec2::ZERO, Vec2::ONE);

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    f.encoder.add_batch(1, material, &sprite, None).unwrap();
    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    let stats = f.encoder.flush().unwrap();

    // quad, quad, sprite: the quads share a binding
    assert_eq!(stats.buffer_pairs, 1);
    assert_eq!(stats.vertex_bindings, 2);

    let mock = f.mock.lock().unwrap();
    let bindings = bound_vertex_buffers(&mock);
    assert_eq!(bindings.iter().map(|b| b.offset).collect::<Vec<_>>(), vec![0, 128]);
    assert!(Arc::ptr_eq(&bindings[0].buffer, &bindings[1].buffer));
    assert_eq!(bindings[1].attribs.decl().bytes_per_vertex(), 32);

    // both quads come first in the vertex buffer, the sprite after them
    let vertex_bytes = mock.buffer_bytes(&bindings[0].buffer).unwrap();
    assert_eq!(vertex_bytes.len(), 128 + 128);
    let second_quad: ColorVertex = bytemuck::pod_read_unaligned(&vertex_bytes[64..80]);
    assert_eq!(second_quad.color, [255, 0, 0, 255]);

    // indices stay in insertion order; only the second quad is shifted
    let draws = mock.draws();
    let indices = mock.buffer_bytes(&draws[0].indexed.buffer).unwrap();
    assert_eq!(
        index_values(indices),
        vec![0, 1, 2, 2, 3, 0, 0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
    );
    assert_eq!(
        draws.iter().map(|d| d.indexed.first_index).collect::<Vec<_>>(),
        vec![0, 12, 6]
    );
}

#[test]
fn test_full_region_opens_another() {
    let mut f = fixture_with(MockRenderDevice::new(), 2 * 1024 * 1024);
    let material = f.materials.insert(());

    // 65000 + 1000 vertices cannot share 16-bit indices
    for vertex_count in [65000, 1000] {
        let mut writer = f
            .encoder
            .alloc_batch::<ColorVertex>(0, vertex_count, 3, PrimitiveTopology::Triangles, material, None)
            .unwrap();
        let (_, mut indices) = writer.streams();
        indices.extend_from_slice(&[0, 1, 2]);
    }
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.buffer_pairs, 1);
    assert_eq!(stats.vertex_bindings, 2);

    let mock = f.mock.lock().unwrap();
    let bindings = bound_vertex_buffers(&mock);
    assert_eq!(bindings.iter().map(|b| b.offset).collect::<Vec<_>>(), vec![0, 65000 * 16]);
    let draws = mock.draws();
    let indices = mock.buffer_bytes(&draws[0].indexed.buffer).unwrap();
    assert_eq!(index_values(indices), vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn test_rebased_index_overflow_is_rejected() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    {
        let mut writer = f
            .encoder
            .alloc_batch::<ColorVertex>(0, 1, 1, PrimitiveTopology::Points, material, None)
            .unwrap();
        let (_, mut indices) = writer.streams();
        // out of range for its own batch, and past 16 bits once shifted by 4
        indices.push(Index::MAX);
    }
    let result = f.encoder.flush();

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(f.encoder.is_empty());
    assert!(f.mock.lock().unwrap().draws().is_empty());
}

#[test]
fn test_sources_without_indices_are_skipped() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &PolyLine::new(Vec::new(), [255; 4]), None).unwrap();
    f.encoder.add_batch(0, material, &PolyLine::new(vec![Vec3::ONE], [255; 4]), None).unwrap();
    assert!(f.encoder.is_empty());
    assert_eq!(f.arena.borrow().allocated_bytes(), 0);

    let stats = f.encoder.flush().unwrap();
    assert_eq!(stats, FlushStats::default());
    assert!(f.mock.lock().unwrap().calls.is_empty());
}

#[test]
fn test_oversized_batch_is_rejected() {
    let mut f = fixture_with(MockRenderDevice::new(), 32);
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    let result = f.encoder.flush();

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(f.encoder.is_empty());
    assert!(f.mock.lock().unwrap().draws().is_empty());
}

#[test]
fn test_buffer_failure_aborts_flush() {
    let mut f = fixture_with(MockRenderDevice::new().fail_after_buffers(1), 1024);
    let material = f.materials.insert(());

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    let result = f.encoder.flush();

    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert!(f.encoder.is_empty());
    assert!(f.mock.lock().unwrap().executed().is_empty());
}

// ============================================================================
// State changes
// ============================================================================

#[test]
fn test_scissor_changes_are_deduplicated() {
    let mut f = fixture();
    let material = f.materials.insert(());
    let clip = Some(Rect2D::new(0, 0, 32, 32));

    f.encoder.add_batch(0, material, &quad(), None).unwrap();
    f.encoder.add_batch(1, material, &quad(), clip).unwrap();
    f.encoder.add_batch(2, material, &quad(), clip).unwrap();
    f.encoder.add_batch(3, material, &quad(), None).unwrap();
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.scissor_changes, 2);
    let scissors: Vec<Option<Rect2D>> = f
        .mock
        .lock()
        .unwrap()
        .executed()
        .into_iter()
        .filter_map(|cmd| match cmd {
            RenderCommand::SetScissor(rect) => Some(rect),
            _ => None,
        })
        .collect();
    assert_eq!(scissors, vec![clip, None]);
}

#[test]
fn test_identical_bindings_are_bound_once() {
    let mut f = fixture();
    let material = f.materials.insert(());
    let (vertices, indexed) = resident_mesh(&f.mock);

    for _ in 0..3 {
        f.encoder.draw_mesh(0, material, vertices.clone(), indexed.clone(), None);
    }
    let stats = f.encoder.flush().unwrap();

    assert_eq!(stats.vertex_bindings, 1);
    assert_eq!(stats.draw_calls, 3);

    let executed = f.mock.lock().unwrap().executed();
    assert!(matches!(executed[0], RenderCommand::BindVertexBuffers(_)));
    assert!(executed[1..].iter().all(|cmd| matches!(cmd, RenderCommand::Draw(_))));
}

#[test]
fn test_binding_identity_ignores_the_handle_type() {
    let (vertices, _) = resident_mesh(&fixture().mock);
    let concrete = Arc::new(MockBuffer { id: 99, size: 64 });
    let first: Arc<dyn Buffer> = concrete.clone();
    let second: Arc<dyn Buffer> = concrete;

    let a = VertexBufferBinding::new(first, vertices.attribs.clone());
    let b = VertexBufferBinding::new(second, vertices.attribs.clone());
    assert!(a.same_binding(&b));
    assert!(!a.same_binding(&b.clone().with_offset(16)));
    assert!(!a.same_binding(&vertices));
}

#[test]
fn test_uploaded_batch_draw_matches_record() {
    let mut f = fixture();
    let material = f.materials.insert(());

    f.encoder.add_batch(7, material, &quad(), None).unwrap();
    let attribs = f.encoder.batches().next().unwrap().attribs.clone();
    f.encoder.flush().unwrap();

    let mock = f.mock.lock().unwrap();
    let executed = mock.executed();
    assert_eq!(executed.len(), 2);
    match (&executed[0], &executed[1]) {
        (RenderCommand::BindVertexBuffers(binding), RenderCommand::Draw(draw)) => {
            assert!(Arc::ptr_eq(&binding.attribs, &attribs));
            assert_eq!(binding.attribs.decl().bytes_per_vertex(), 16);
            assert_eq!(draw.material, material);
            assert_eq!(draw.indexed.index_count, 6);
            assert_eq!(draw.indexed.topology, PrimitiveTopology::Triangles);
        }
        other => panic!("unexpected commands {:?}", other),
    }
}
