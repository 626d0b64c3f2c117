//! Recording pages and replaying them through a recording batch

use std::collections::HashSet;
use std::f32::consts::PI;
use std::sync::Arc;

use tessera_canvas::{CanvasNode, CommandType, Context, FillRule, Page, Paint, Recipe, Winding};
use tessera_gpu::{
    BlendFunc, ColorMask, DeviceCall, RecordingDevice, SpriteBatch, SpriteBatchConfig,
    StencilEffect, FULL_STENCIL,
};
use tessera_paint::{Affine, Color, DrawCommand, LineCap, Point, Rect, Scissor};
use tessera_text::{AtlasBuilder, FontAtlas, GlyphImage, GlyphSource, LineMetrics, TextAlignment};

fn batch() -> SpriteBatch<RecordingDevice> {
    SpriteBatch::new(RecordingDevice::new(), SpriteBatchConfig::default()).unwrap()
}

fn draw(node: &CanvasNode) -> SpriteBatch<RecordingDevice> {
    let mut batch = batch();
    batch.begin();
    node.draw(&mut batch, &Affine::IDENTITY, Color::WHITE);
    batch.end();
    batch
}

fn assert_near(actual: [f32; 2], expected: [f32; 2]) {
    let d = (actual[0] - expected[0]).abs().max((actual[1] - expected[1]).abs());
    assert!(d < 1e-4, "{actual:?} != {expected:?}");
}

/// Ten-point star, counter-clockwise
fn star() -> Vec<Point> {
    (0..10)
        .map(|i| {
            let r = if i % 2 == 0 { 50.0 } else { 20.0 };
            let a = PI * 0.5 + i as f32 * PI / 5.0;
            Point::new(a.cos() * r, a.sin() * r)
        })
        .collect()
}

/// Letters are 6x8 boxes advancing 8px
struct BoxSource;

impl GlyphSource for BoxSource {
    fn line_metrics(&self, _size: f32) -> LineMetrics {
        LineMetrics {
            ascent: 8.0,
            descent: 2.0,
            line_gap: 0.0,
        }
    }

    fn glyph(&mut self, ch: char, _size: f32) -> Option<GlyphImage> {
        if ch == ' ' {
            return Some(GlyphImage {
                advance: 4.0,
                ..Default::default()
            });
        }
        Some(GlyphImage {
            width: 6,
            height: 8,
            bearing_x: 0,
            bearing_y: 8,
            advance: 8.0,
            coverage: vec![255; 48],
        })
    }

    fn kerning(&self, _left: char, _right: char, _size: f32) -> f32 {
        0.0
    }
}

fn font(batch: &mut SpriteBatch<RecordingDevice>, max_page: u32) -> Arc<FontAtlas> {
    let layout = AtlasBuilder::new(10.0)
        .charset("abc ".chars())
        .max_page_size(max_page)
        .build(&mut BoxSource)
        .unwrap();
    Arc::new(layout.materialize(batch.device_mut()).unwrap())
}

#[test]
fn square_path_records_one_convex_fill() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.begin_path();
    page.move_to(Point::new(0.0, 0.0));
    page.line_to(Point::new(10.0, 0.0));
    page.line_to(Point::new(10.0, 10.0));
    page.line_to(Point::new(0.0, 10.0));
    page.close_path();
    page.set_fill_color(Color::RED);
    page.fill_paths();

    let commands = page.commands();
    assert_eq!(commands.len(), 1);
    let command = &commands[0];
    assert_eq!(command.kind, CommandType::ConvexFill);
    assert_eq!(command.mesh.command, DrawCommand::TriangleFan);
    assert_eq!(command.mesh.vertices.len(), 4);
    assert_eq!(command.mesh.indices, vec![0, 1, 2, 3]);
    assert_eq!(command.mesh.fans, vec![4]);
    assert!(command
        .mesh
        .vertices
        .iter()
        .all(|v| v.color == Color::RED.to_packed()));
    assert!(!command.has_border());

    let batch = draw(&node);
    let draws = batch.device().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertices.len(), 6);
    assert_eq!(draws[0].stencil, None);
    assert!(draws[0]
        .vertices
        .iter()
        .all(|v| v.color == Color::RED.to_packed()));
}

#[test]
fn fringe_adds_a_fading_border() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.set_fringe(2.0);
    page.set_fill_color(Color::RED);
    page.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    page.fill_paths();

    let command = &page.commands()[0];
    assert_eq!(command.border.command, DrawCommand::Triangles);
    assert_eq!(command.border.vertices.len(), 8);
    assert_eq!(command.border.indices.len(), 24);
    let faded = Color::RED.with_alpha(0.0).to_packed();
    assert_eq!(
        command.border.vertices.iter().filter(|v| v.color == faded).count(),
        4
    );
    // Near edge sits half a fringe inside the square
    assert_near(command.border.vertices[0].position, [1.0, 1.0]);

    // Body and border share the unstenciled state
    let batch = draw(&node);
    let draws = batch.device().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertices.len(), 30);
}

#[test]
fn concave_fill_stamps_then_covers_bounds() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.draw_polygon(&star());
    page.fill_paths();

    let command = &page.commands()[0];
    assert_eq!(command.kind, CommandType::ConcaveFill);
    assert_eq!(command.mesh.fans, vec![10, 14]);
    let bounds = command.mesh.bounds();
    let quad: Vec<[f32; 2]> = command.mesh.vertices[10..]
        .iter()
        .map(|v| v.position)
        .collect();
    let corners: Vec<[f32; 2]> = bounds.corners().iter().map(|c| c.to_array()).collect();
    assert_eq!(quad, corners);

    let batch = draw(&node);
    let device = batch.device();
    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].stencil, StencilEffect::Stamp.state());
    assert_eq!(draws[0].color_mask, ColorMask::empty());
    assert_eq!(draws[0].vertices.len(), 8 * 3);
    assert_eq!(draws[1].stencil, StencilEffect::Fill.state());
    assert_eq!(draws[1].vertices.len(), 6);

    let calls = device.calls();
    let clear = calls
        .iter()
        .position(|c| *c == DeviceCall::ClearStencil(FULL_STENCIL))
        .unwrap();
    let first_draw = calls
        .iter()
        .position(|c| matches!(c, DeviceCall::Draw { .. }))
        .unwrap();
    assert!(clear < first_draw);
}

#[test]
fn concave_cover_uploads_only_the_bounds_quad() {
    // 1000 spikes, counter-clockwise
    let spikes: Vec<Point> = (0..2000)
        .map(|i| {
            let r = if i % 2 == 0 { 100.0 } else { 90.0 };
            let a = i as f32 * PI / 1000.0;
            Point::new(a.cos() * r, a.sin() * r)
        })
        .collect();
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.draw_polygon(&spikes);
    page.fill_paths();
    let command = &page.commands()[0];
    assert_eq!(command.kind, CommandType::ConcaveFill);
    assert_eq!(command.mesh.vertices.len(), 2004);

    let batch = draw(&node);
    let loaded: usize = batch
        .device()
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::LoadVertices(n) => Some(*n),
            _ => None,
        })
        .sum();
    assert_eq!(loaded, 2004);
    assert_eq!(batch.stats().vertices, 2004);
    assert_eq!(batch.stats().flushes, 1);
    assert_eq!(batch.device().draws().len(), 2);
}

#[test]
fn concave_border_draws_outside_the_stamp() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.set_fringe(1.0);
    page.set_fill_rule(FillRule::EvenOdd);
    page.draw_polygon(&star());
    page.fill_paths();
    assert_eq!(page.commands()[0].kind, CommandType::EvenOddFill);

    let batch = draw(&node);
    let stencils: Vec<_> = batch.device().draws().iter().map(|d| d.stencil).collect();
    assert_eq!(
        stencils,
        vec![
            StencilEffect::StampEvenOdd.state(),
            StencilEffect::Outside.state(),
            StencilEffect::Fill.state(),
        ]
    );
}

#[test]
fn translucent_strokes_clamp_then_wipe() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.set_stroke_color(Color::BLUE.with_alpha(0.5));
    page.set_stroke_width(4.0);
    page.set_line_cap(LineCap::Round);
    page.move_to(Point::new(0.0, 0.0));
    page.line_to(Point::new(50.0, 0.0));
    page.line_to(Point::new(0.0, 10.0));
    page.stroke_paths();
    assert_eq!(page.commands()[0].kind, CommandType::Stroke);

    let batch = draw(&node);
    let draws = batch.device().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].stencil, StencilEffect::Clamp.state());
    assert_eq!(draws[1].stencil, StencilEffect::Wipe.state());
    assert_eq!(draws[1].color_mask, ColorMask::empty());
    assert_eq!(draws[0].vertices.len(), draws[1].vertices.len());
}

#[test]
fn opaque_strokes_draw_once() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.draw_circle(Point::new(0.0, 0.0), 20.0);
    page.stroke_paths();
    assert_eq!(page.commands()[0].kind, CommandType::NormalStroke);

    let batch = draw(&node);
    assert_eq!(batch.device().draw_count(), 1);
    assert_eq!(batch.device().draws()[0].stencil, None);
}

#[test]
fn stroke_fringe_rings_both_edges() {
    let mut page = Page::new();
    page.set_fringe(1.0);
    page.set_stroke_width(4.0);
    page.draw_rect(Rect::new(0.0, 0.0, 20.0, 20.0));
    page.stroke_paths();

    let border = &page.commands()[0].border;
    // Two closed ribbons over four corners
    assert_eq!(border.vertices.len(), 16);
    assert_near(border.vertices[0].position, [-2.0, -2.0]);
    assert_near(border.vertices[8].position, [2.0, 2.0]);
}

#[test]
fn saved_state_is_restored_exactly() {
    let mut page = Page::new();
    page.set_fill_color(Color::GREEN);
    page.set_stroke_width(3.0);
    page.set_fill_rule(FillRule::EvenOdd);
    page.translate(4.0, 2.0);
    page.set_scissor(Some(Scissor::new(Rect::new(0.0, 0.0, 8.0, 8.0))));
    let before: Context = page.context().clone();

    page.save_state();
    page.set_fill_color(Color::BLUE);
    page.set_stroke_width(9.0);
    page.set_fill_rule(FillRule::Mask);
    page.set_winding(Some(Winding::Cw));
    page.set_global_alpha(0.25);
    page.set_blend_func(BlendFunc::ADDITIVE);
    page.rotate(1.0);
    page.set_scissor(None);
    page.set_font_spacing(2.0);
    page.set_fill_paint(Some(Paint::linear(
        Point::ZERO,
        Point::new(1.0, 0.0),
        Color::RED,
        Color::BLUE,
    )));
    assert_ne!(*page.context(), before);

    page.restore_state();
    assert_eq!(*page.context(), before);
    assert_eq!(page.saved_states(), 0);

    // Nothing saved: back to defaults
    page.restore_state();
    assert_eq!(*page.context(), Context::default());
}

#[test]
fn factory_shapes_wind_counter_clockwise() {
    let mut page = Page::new();
    page.draw_rect(Rect::new(0.0, 0.0, 10.0, 5.0));
    page.draw_rounded_rect(Rect::new(0.0, 0.0, 10.0, 5.0), 2.0);
    page.draw_ellipse(Point::new(3.0, 3.0), 6.0, 2.0);
    page.draw_circle(Point::new(-4.0, 1.0), 3.0);
    let mut clockwise: Vec<Point> = star();
    clockwise.reverse();
    page.draw_polygon(&clockwise);

    assert_eq!(page.paths().len(), 5);
    assert_eq!(page.orientations().len(), 5);
    for (path, orientation) in page.paths().iter().zip(page.orientations()) {
        assert!(path.signed_area() > 0.0);
        assert!(orientation.is_ccw());
    }
    assert!(page.orientations()[0].is_convex());
    assert!(page.orientations()[3].is_convex());
}

#[test]
fn every_recorded_kind_has_a_recipe() {
    let mut batch = batch();
    let atlas = font(&mut batch, 1024);
    let rules = [
        FillRule::NonZero,
        FillRule::EvenOdd,
        FillRule::Stencil,
        FillRule::Clip,
        FillRule::Mask,
    ];

    let mut page = Page::new();
    page.set_font(Some(atlas));
    for rule in rules {
        page.set_fill_rule(rule);

        page.begin_path();
        page.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        page.fill_paths();

        page.begin_path();
        page.draw_polygon(&star());
        page.fill_paths();

        for alpha in [1.0, 0.5] {
            page.set_stroke_color(Color::BLACK.with_alpha(alpha));
            page.stroke_paths();
        }

        page.fill_text("ab", Point::ZERO);
    }

    let recorded: HashSet<CommandType> = page.commands().iter().map(|c| c.kind).collect();
    for kind in &recorded {
        assert!(Recipe::for_kind(*kind).is_some(), "{kind:?} has no recipe");
    }
    let concrete: HashSet<CommandType> = CommandType::ALL
        .into_iter()
        .filter(|k| Recipe::for_kind(*k).is_some())
        .collect();
    assert_eq!(recorded, concrete);
}

#[test]
fn text_records_one_command_per_page() {
    let mut batch = batch();
    let atlas = font(&mut batch, 1024);
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.set_fill_color(Color::RED);
    page.set_font_blur(1.5);
    page.set_font(Some(Arc::clone(&atlas)));
    page.fill_text("ab", Point::new(10.0, 20.0));

    let command = &page.commands()[0];
    assert_eq!(command.kind, CommandType::NormalText);
    assert_eq!(command.blur_step, 1.5);
    assert!(Arc::ptr_eq(command.texture.as_ref().unwrap(), atlas.page(0).unwrap()));
    assert_eq!(command.mesh.vertices.len(), 8);
    // Baseline at the origin: the first glyph spans y in [20, 28]
    assert_eq!(command.mesh.vertices[0].position, [10.0, 20.0]);

    batch.begin();
    node.draw(&mut batch, &Affine::IDENTITY, Color::WHITE);
    batch.end();
    let drawn = &batch.device().draws()[0];
    assert_eq!(drawn.texture, Some(atlas.page(0).unwrap().buffer()));
}

#[test]
fn text_alignment_shifts_around_the_origin() {
    let mut batch = batch();
    let atlas = font(&mut batch, 1024);
    let mut page = Page::new();
    page.set_font(Some(atlas));
    page.set_font_align(TextAlignment::Right);
    page.fill_text("ab", Point::new(100.0, 0.0));
    assert_eq!(page.commands()[0].mesh.vertices[0].position, [84.0, 0.0]);
}

#[test]
fn text_spanning_pages_splits_commands() {
    let mut batch = batch();
    let atlas = font(&mut batch, 16);
    assert_eq!(atlas.pages().len(), 2);
    let mut page = Page::new();
    page.set_font(Some(atlas));
    page.fill_text_box("abc", Rect::new(0.0, 0.0, 100.0, 20.0));
    assert_eq!(page.commands().len(), 2);
    let a = page.commands()[0].texture.clone().unwrap();
    let b = page.commands()[1].texture.clone().unwrap();
    assert!(!a.shares_backing(&b));
}

#[test]
fn text_without_font_records_nothing() {
    let mut page = Page::new();
    page.fill_text("ab", Point::ZERO);
    assert!(page.is_empty());
}

#[test]
fn gradient_paint_reaches_the_batch() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.set_fill_paint(Some(Paint::linear(
        Point::ZERO,
        Point::new(1.0, 0.0),
        Color::RED,
        Color::BLUE,
    )));
    page.draw_rect(Rect::new(0.0, 0.0, 20.0, 10.0));
    page.fill_paths();

    let command = &page.commands()[0];
    assert!(command.gradient.is_some());
    assert_eq!(command.mesh.vertices[2].gradcoord, [2.0, 1.0]);
    assert_eq!(command.color, Color::WHITE);

    let mut batch = batch();
    batch.set_color(Color::GREEN);
    batch.begin();
    node.draw(&mut batch, &Affine::IDENTITY, Color::WHITE);
    assert!(batch.gradient().is_none());
    assert!(batch.texture().is_none());
    assert!(batch.scissor().is_none());
    assert_eq!(batch.stencil_effect(), StencilEffect::None);
    assert_eq!(batch.blend_func(), BlendFunc::SOURCE_OVER);
    assert_eq!(batch.color(), Color::GREEN);
    batch.end();
    assert_eq!(batch.device().draw_count(), 1);
}

#[test]
fn clip_region_then_clipped_fill() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.set_fill_rule(FillRule::Stencil);
    page.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
    page.fill_paths();
    page.begin_path();
    page.set_fill_rule(FillRule::Clip);
    page.draw_circle(Point::new(10.0, 10.0), 5.0);
    page.fill_paths();

    let kinds: Vec<CommandType> = page.commands().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![CommandType::ConvexStencilFill, CommandType::ConvexClipFill]);

    let batch = draw(&node);
    let draws = batch.device().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].stencil, StencilEffect::Region.state());
    assert_eq!(draws[0].color_mask, ColorMask::empty());
    assert_eq!(draws[1].stencil, StencilEffect::Clip.state());
}

#[test]
fn tint_multiplies_recorded_colors() {
    let mut node = CanvasNode::new(1);
    let page = node.editor();
    page.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
    page.fill_paths();

    let mut batch = batch();
    batch.begin();
    node.draw(&mut batch, &Affine::translate(5.0, 0.0), Color::BLUE);
    batch.end();
    let draw = &batch.device().draws()[0];
    assert!(draw.vertices.iter().all(|v| v.color == Color::BLUE.to_packed()));
    assert_eq!(draw.vertices[0].position, [5.0, 0.0]);
}

#[test]
fn pages_grow_on_demand() {
    let mut node = CanvasNode::new(1);
    node.set_edit_page(3);
    assert_eq!(node.page_count(), 4);
    node.editor().draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
    node.editor().fill_paths();

    // Draw page is still the empty first page
    let batch = draw(&node);
    assert_eq!(batch.device().draw_count(), 0);

    node.set_draw_page(3);
    let batch = draw(&node);
    assert_eq!(batch.device().draw_count(), 1);

    node.clear_page(3);
    assert!(node.page(3).unwrap().is_empty());

    node.paginate(2);
    assert_eq!(node.page_count(), 2);
    assert_eq!(node.edit_page(), 1);
    assert_eq!(node.draw_page(), 1);

    node.paginate(0);
    assert_eq!(node.page_count(), 1);
    node.clear_all();
    assert!(node.page_mut(0).unwrap().is_empty());
}
