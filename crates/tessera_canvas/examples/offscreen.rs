//! Offscreen canvas demo
//!
//! Renders a page with concave fills, clipping, strokes and (optionally)
//! text into a headless wgpu target and writes it out as a PNG.
//!
//! Run with:
//! `cargo run -p tessera_canvas --example offscreen -- out.png`
//!
//! Set `TESSERA_FONT=/path/to/font.ttf` to include a line of text.

use std::f32::consts::PI;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tessera_canvas::{CanvasNode, FillRule, Page, Paint};
use tessera_gpu::{SpriteBatch, SpriteBatchConfig, WgpuDevice};
use tessera_paint::{Affine, Color, LineJoin, Point, Rect, Scissor};
use tessera_text::{AtlasBuilder, FontGlyphSource};
use tracing_subscriber::EnvFilter;

const WIDTH: u32 = 480;
const HEIGHT: u32 = 320;

fn star(center: Point, outer: f32, inner: f32) -> Vec<Point> {
    (0..10)
        .map(|i| {
            let r = if i % 2 == 0 { outer } else { inner };
            let a = PI * 0.5 + i as f32 * PI / 5.0;
            center + Point::new(a.cos(), a.sin()) * r
        })
        .collect()
}

fn record_shapes(page: &mut Page) {
    page.set_fringe(1.0);

    // Gradient-filled rounded panel
    page.set_fill_paint(Some(
        Paint::linear(
            Point::ZERO,
            Point::new(0.0, 1.0),
            Color::from_hex(0x1E2A44),
            Color::from_hex(0x3B5B92),
        )
        .with_transform(Affine::translate(20.0, 20.0)),
    ));
    page.begin_path();
    page.draw_rounded_rect(Rect::new(20.0, 20.0, 440.0, 280.0), 24.0);
    page.fill_paths();
    page.set_fill_paint(None);

    // Concave fill with a translucent outline
    page.begin_path();
    page.draw_polygon(&star(Point::new(130.0, 170.0), 90.0, 40.0));
    page.set_fill_color(Color::from_hex(0xF2C14E));
    page.fill_paths();
    page.set_stroke_color(Color::WHITE.with_alpha(0.6));
    page.set_stroke_width(6.0);
    page.set_line_joint(LineJoin::Round);
    page.stroke_paths();

    // Clip a set of circles to a diamond
    page.save_state();
    page.set_fill_rule(FillRule::Stencil);
    page.begin_path();
    page.draw_polygon(&[
        Point::new(340.0, 80.0),
        Point::new(420.0, 170.0),
        Point::new(340.0, 260.0),
        Point::new(260.0, 170.0),
    ]);
    page.fill_paths();
    page.set_fill_rule(FillRule::Clip);
    for (i, color) in [Color::RED, Color::GREEN, Color::BLUE].into_iter().enumerate() {
        page.begin_path();
        page.draw_circle(Point::new(300.0 + i as f32 * 40.0, 170.0), 50.0);
        page.set_fill_color(color.with_alpha(0.7));
        page.fill_paths();
    }
    page.restore_state();

    // Scissored stripes
    page.save_state();
    page.set_scissor(Some(Scissor::new(Rect::new(40.0, 30.0, 160.0, 30.0)).with_fringe(4.0)));
    page.set_stroke_color(Color::from_hex(0x9AD1D4));
    page.set_stroke_width(3.0);
    page.begin_path();
    for i in 0..12 {
        let x = 30.0 + i as f32 * 16.0;
        page.move_to(Point::new(x, 20.0));
        page.line_to(Point::new(x + 30.0, 70.0));
    }
    page.stroke_paths();
    page.restore_state();
}

fn record_text(page: &mut Page, device: &mut WgpuDevice) -> Result<()> {
    let Ok(path) = std::env::var("TESSERA_FONT") else {
        tracing::info!("TESSERA_FONT not set; skipping text");
        return Ok(());
    };
    let face = tessera_text::FontFace::from_file(&path, 0)
        .with_context(|| format!("loading font {path}"))?;
    let mut source = FontGlyphSource::new(face);

    // CPU phase could run on a worker; the GPU phase needs the device
    let layout = AtlasBuilder::new(24.0).build(&mut source)?;
    let atlas = Arc::new(layout.materialize(device)?);

    page.save_state();
    page.set_font(Some(atlas));
    page.set_fill_color(Color::WHITE);
    page.fill_text("Tessera canvas", Point::new(250.0, 40.0));
    page.restore_state();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tessera_gpu=info".parse()?))
        .init();

    let output = std::env::args().nth(1).unwrap_or_else(|| "offscreen.png".to_string());

    let mut device = WgpuDevice::new_headless(WIDTH, HEIGHT)?;
    let mut node = CanvasNode::new(1);
    record_shapes(node.editor());
    record_text(node.editor(), &mut device)?;

    let projection = device.screen_projection();
    let mut batch = SpriteBatch::new(device, SpriteBatchConfig::from_env())?;
    batch.set_perspective(&projection);
    batch.begin();
    node.draw(&mut batch, &Affine::IDENTITY, Color::WHITE);
    batch.end();
    let stats = batch.stats();
    tracing::info!(
        "flushes={} draw_calls={} vertices={}",
        stats.flushes,
        stats.draw_calls,
        stats.vertices
    );

    let mut device = batch.into_device();
    device.present(Color::from_hex(0x101018));
    let pixels = device.read_pixels()?;

    let image = image::RgbaImage::from_raw(WIDTH, HEIGHT, pixels)
        .context("readback size does not match the target")?;
    image.save(&output).with_context(|| format!("writing {output}"))?;
    tracing::info!("Wrote {}", output);
    Ok(())
}
