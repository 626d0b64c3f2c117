//! Glyph rasterization using swash
//!
//! Converts glyph outlines into 8-bit coverage bitmaps for the atlas.

use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::Format;

use crate::face::FontFace;
use crate::{Result, TextError};

/// Coverage bitmap of one glyph
#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    /// One coverage byte per pixel, rows top to bottom
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the left edge
    pub bearing_x: i32,
    /// Offset from the baseline up to the top edge
    pub bearing_y: i32,
    /// Horizontal advance in pixels
    pub advance: f32,
}

/// Glyph rasterizer using swash
pub struct GlyphRasterizer {
    /// Caches scaling state across glyphs
    scale_context: ScaleContext,
}

impl GlyphRasterizer {
    pub fn new() -> Self {
        Self {
            scale_context: ScaleContext::new(),
        }
    }

    /// Rasterize a glyph at the given pixel size.
    ///
    /// Glyphs without an outline (such as space) come back with an empty
    /// bitmap and a valid advance.
    pub fn rasterize(&mut self, font: &FontFace, glyph_id: u16, font_size: f32) -> Result<RasterizedGlyph> {
        let swash_font = swash::FontRef::from_index(font.data(), font.face_index() as usize)
            .ok_or(TextError::InvalidFontData)?;

        let mut scaler = self
            .scale_context
            .builder(swash_font)
            .size(font_size)
            .hint(false)
            .build();

        let metrics = swash_font.metrics(&[]);
        let scale = font_size / metrics.units_per_em.max(1) as f32;
        let advance = swash_font.glyph_metrics(&[]).advance_width(glyph_id) * scale;

        let mut render = Render::new(&[
            Source::ColorOutline(0),
            Source::ColorBitmap(StrikeWith::BestFit),
            Source::Outline,
        ]);
        render.format(Format::Alpha);

        Ok(match render.render(&mut scaler, glyph_id) {
            Some(img) => RasterizedGlyph {
                bitmap: img.data,
                width: img.placement.width,
                height: img.placement.height,
                bearing_x: img.placement.left,
                bearing_y: img.placement.top,
                advance,
            },
            None => RasterizedGlyph {
                bitmap: Vec::new(),
                width: 0,
                height: 0,
                bearing_x: 0,
                bearing_y: 0,
                advance,
            },
        })
    }
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        Self::new()
    }
}
