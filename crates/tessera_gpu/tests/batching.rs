//! SpriteBatch behaviour observed through the recording device

use std::sync::Arc;

use tessera_gpu::{
    ColorMask, DeviceCall, RecordingDevice, RenderDevice, ShaderSource, SpriteBatch,
    SpriteBatchConfig, StencilEffect, Texture, LOWER_HALF,
};
use tessera_paint::{Affine, Color, DrawCommand, Mesh, Point, Rect, Vertex};

fn batch_with(config: SpriteBatchConfig) -> SpriteBatch<RecordingDevice> {
    SpriteBatch::new(RecordingDevice::new(), config).unwrap()
}

fn batch() -> SpriteBatch<RecordingDevice> {
    batch_with(SpriteBatchConfig::default())
}

fn texture(batch: &mut SpriteBatch<RecordingDevice>, width: u32, height: u32) -> Texture {
    let pixels = vec![255u8; (width * height * 4) as usize];
    batch.device_mut().create_texture(width, height, &pixels).unwrap()
}

/// A ring of `n` triangles around a shared center vertex, as a triangle list
fn ring_mesh(n: u32) -> Mesh {
    let mut mesh = Mesh::new(DrawCommand::Triangles);
    mesh.vertices.push(Vertex::new(Point::ZERO, Color::WHITE));
    for i in 0..=n {
        let angle = i as f32 * 0.1;
        mesh.vertices.push(Vertex::new(
            Point::new(angle.cos() * 10.0, angle.sin() * 10.0),
            Color::WHITE,
        ));
    }
    for i in 1..=n {
        mesh.indices.extend_from_slice(&[0, i, i + 1]);
    }
    mesh
}

fn positions(vertices: &[Vertex]) -> Vec<[f32; 2]> {
    vertices.iter().map(|v| v.position).collect()
}

#[test]
fn redundant_texture_binds_are_elided() {
    let mut batch = batch();
    let a = Arc::new(texture(&mut batch, 4, 4));
    let b = Arc::new(texture(&mut batch, 4, 4));

    batch.begin();
    batch.set_texture(Some(Arc::clone(&a)));
    batch.set_texture(Some(Arc::clone(&a)));
    batch.set_texture(Some(Arc::clone(&b)));
    batch.fill(&Rect::new(0.0, 0.0, 1.0, 1.0), &Affine::IDENTITY);
    batch.end();

    let device = batch.device();
    assert_eq!(device.texture_bind_count(), 1);
    assert!(device
        .calls()
        .contains(&DeviceCall::BindTexture(Some(b.buffer()))));
    assert_eq!(device.draw_count(), 1);
}

#[test]
fn atlas_regions_share_one_draw() {
    let mut batch = batch();
    let page = texture(&mut batch, 16, 16);
    let left = Arc::new(page.sub_texture(0, 0, 8, 8));
    let right = Arc::new(page.sub_texture(8, 0, 8, 8));

    batch.begin();
    batch.set_texture(Some(left));
    batch.fill(&Rect::new(0.0, 0.0, 1.0, 1.0), &Affine::IDENTITY);
    batch.set_texture(Some(right));
    batch.fill(&Rect::new(2.0, 0.0, 1.0, 1.0), &Affine::IDENTITY);
    batch.end();

    assert_eq!(batch.stats().flushes, 1);
    assert_eq!(batch.device().draw_count(), 1);
    assert_eq!(batch.device().texture_bind_count(), 1);

    let draw = &batch.device().draws()[0];
    assert_eq!(draw.vertices.len(), 12);
    assert!(draw.vertices[..6].iter().all(|v| v.texcoord[0] <= 0.5));
    assert!(draw.vertices[6..].iter().all(|v| v.texcoord[0] >= 0.5));
}

#[test]
fn oversized_mesh_is_chunked_without_losing_triangles() {
    let config = SpriteBatchConfig::with_capacity(16, 10);
    let mut batch = batch_with(config);
    let mesh = ring_mesh(20);

    batch.begin();
    batch.draw_mesh(&mesh, &Affine::IDENTITY, false);
    batch.end();

    let per_flush = 10 - 10 % 3;
    let minimum = (mesh.indices.len() + per_flush - 1) / per_flush;
    let device = batch.device();
    assert!(device.draw_count() >= minimum);
    assert_eq!(batch.stats().chunked_meshes, 1);

    let drawn: Vec<[f32; 2]> = device
        .draws()
        .iter()
        .flat_map(|d| positions(&d.vertices))
        .collect();
    let expected: Vec<[f32; 2]> = mesh
        .indices
        .iter()
        .map(|&i| mesh.vertices[i as usize].position)
        .collect();
    assert_eq!(drawn, expected);
}

#[test]
fn small_meshes_flush_when_buffers_fill() {
    let config = SpriteBatchConfig::with_capacity(8, 12);
    let mut batch = batch_with(config);

    batch.begin();
    for i in 0..5 {
        batch.fill(&Rect::new(i as f32, 0.0, 1.0, 1.0), &Affine::IDENTITY);
    }
    batch.end();

    // Two rects fit per flush
    assert_eq!(batch.stats().flushes, 3);
    let total: usize = batch.device().draws().iter().map(|d| d.vertices.len()).sum();
    assert_eq!(total, 30);
}

#[test]
#[should_panic(expected = "cannot swap shaders")]
fn swapping_shader_inside_pass_panics() {
    let mut batch = batch();
    let shader = batch
        .device_mut()
        .compile_shader(&ShaderSource::sprite())
        .unwrap();
    batch.begin();
    batch.set_shader(shader);
}

#[test]
fn swapping_shader_between_passes_rebinds() {
    let mut batch = batch();
    let shader = batch
        .device_mut()
        .compile_shader(&ShaderSource::sprite())
        .unwrap();
    let id = shader.id;
    batch.set_shader(shader);
    batch.begin();
    batch.end();
    assert!(batch.device().calls().contains(&DeviceCall::BindShader(id)));
}

#[test]
fn stencil_effects_reach_their_draws() {
    let mut batch = batch();
    let rect = Rect::new(0.0, 0.0, 4.0, 4.0);

    batch.begin();
    batch.clear_half_stencil(true);
    batch.set_stencil_effect(StencilEffect::Stamp);
    batch.fill(&rect, &Affine::IDENTITY);
    batch.set_stencil_effect(StencilEffect::Fill);
    batch.fill(&rect, &Affine::IDENTITY);
    batch.set_stencil_effect(StencilEffect::None);
    batch.fill(&rect, &Affine::IDENTITY);
    batch.end();

    let device = batch.device();
    let draws = device.draws();
    assert_eq!(draws.len(), 3);

    assert_eq!(draws[0].stencil, StencilEffect::Stamp.state());
    assert_eq!(draws[0].color_mask, ColorMask::empty());
    assert_eq!(draws[1].stencil, StencilEffect::Fill.state());
    assert_eq!(draws[1].color_mask, ColorMask::ALL);
    assert_eq!(draws[2].stencil, None);

    // The clear lands before the stamping draw
    let calls = device.calls();
    let clear = calls
        .iter()
        .position(|c| *c == DeviceCall::ClearStencil(LOWER_HALF))
        .unwrap();
    let first_draw = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::Draw { .. }))
        .unwrap();
    assert!(clear < first_draw);
}

#[test]
fn stencil_clear_splits_pending_geometry() {
    let mut batch = batch();
    let rect = Rect::new(0.0, 0.0, 4.0, 4.0);

    batch.begin();
    batch.fill(&rect, &Affine::IDENTITY);
    batch.clear_stencil();
    batch.fill(&rect, &Affine::IDENTITY);
    batch.end();

    let device = batch.device();
    assert_eq!(device.draw_count(), 2);
    assert_eq!(device.count(|c| matches!(c, DeviceCall::ClearStencil(0xFF))), 1);
}

#[test]
fn text_runs_are_tinted_by_the_batch_color() {
    let mut batch = batch();
    let page = Arc::new(texture(&mut batch, 8, 8));

    let mut mesh = Mesh::new(DrawCommand::Triangles);
    for p in Rect::new(0.0, 0.0, 2.0, 2.0).corners() {
        let mut v = Vertex::new(p, Color::WHITE);
        v.texcoord = [0.25, 0.25];
        mesh.vertices.push(v);
    }
    mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);

    batch.begin();
    batch.set_color(Color::RED);
    batch.draw_text(
        &[tessera_gpu::GlyphRun {
            texture: Arc::clone(&page),
            mesh,
        }],
        &Affine::translate(5.0, 0.0),
    );
    batch.end();

    let draw = &batch.device().draws()[0];
    assert_eq!(draw.texture, Some(page.buffer()));
    assert!(draw
        .vertices
        .iter()
        .all(|v| v.color == Color::RED.to_packed()));
    assert_eq!(draw.vertices[0].position, [5.0, 0.0]);
}

#[test]
fn unreferenced_vertices_are_not_staged() {
    // Only the last four of the twelve vertices are drawn
    let mut mesh = Mesh::new(DrawCommand::TriangleFan);
    mesh.push_fan(&Rect::new(0.0, 0.0, 1.0, 1.0).corners(), Color::WHITE);
    mesh.push_fan(&Rect::new(2.0, 0.0, 1.0, 1.0).corners(), Color::WHITE);
    mesh.push_fan(&Rect::new(4.0, 0.0, 1.0, 1.0).corners(), Color::RED);
    mesh.indices = vec![8, 9, 10, 11];
    mesh.fans = vec![4];

    let mut batch = batch();
    batch.begin();
    batch.draw_mesh(&mesh, &Affine::IDENTITY, false);
    batch.end();

    let device = batch.device();
    assert!(device.calls().contains(&DeviceCall::LoadVertices(4)));
    assert_eq!(batch.stats().vertices, 4);
    let draws = device.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertices.len(), 6);
    assert!(draws[0].vertices.iter().all(|v| v.color == Color::RED.to_packed()));
    assert!(draws[0].vertices.iter().all(|v| v.position[0] >= 4.0));
}
