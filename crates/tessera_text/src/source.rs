//! Where atlas glyphs come from
//!
//! [`GlyphSource`] is the seam between the atlas builder and font handling.
//! [`FontGlyphSource`] serves real fonts; tests supply synthetic glyphs.

use crate::face::FontFace;
use crate::rasterizer::GlyphRasterizer;
use crate::Result;

/// Line metrics in pixels at one size
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineMetrics {
    /// Baseline to top (positive)
    pub ascent: f32,
    /// Baseline to bottom (positive)
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent + self.line_gap
    }

    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            ascent: self.ascent * scale,
            descent: self.descent * scale,
            line_gap: self.line_gap * scale,
        }
    }
}

/// A glyph's coverage and placement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphImage {
    pub width: u32,
    pub height: u32,
    /// Pen position to left edge
    pub bearing_x: i32,
    /// Baseline up to top edge
    pub bearing_y: i32,
    pub advance: f32,
    /// `width * height` coverage bytes, rows top to bottom
    pub coverage: Vec<u8>,
}

/// Supplies glyph images and metrics to [`crate::AtlasBuilder`]
pub trait GlyphSource {
    fn line_metrics(&self, size: f32) -> LineMetrics;

    /// `None` when the source has no glyph for `ch`
    fn glyph(&mut self, ch: char, size: f32) -> Option<GlyphImage>;

    /// Pair adjustment added to the advance of `left`
    fn kerning(&self, left: char, right: char, size: f32) -> f32;
}

/// A [`GlyphSource`] backed by a parsed font and swash
pub struct FontGlyphSource {
    face: FontFace,
    rasterizer: GlyphRasterizer,
}

impl FontGlyphSource {
    pub fn new(face: FontFace) -> Self {
        Self {
            face,
            rasterizer: GlyphRasterizer::new(),
        }
    }

    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        Ok(Self::new(FontFace::from_data(data, face_index)?))
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }
}

impl GlyphSource for FontGlyphSource {
    fn line_metrics(&self, size: f32) -> LineMetrics {
        let metrics = self.face.metrics();
        LineMetrics {
            ascent: metrics.ascender_px(size),
            descent: metrics.descender_px(size),
            line_gap: metrics.line_gap_px(size),
        }
    }

    fn glyph(&mut self, ch: char, size: f32) -> Option<GlyphImage> {
        let id = self.face.glyph_id(ch)?;
        match self.rasterizer.rasterize(&self.face, id, size) {
            Ok(glyph) => Some(GlyphImage {
                width: glyph.width,
                height: glyph.height,
                bearing_x: glyph.bearing_x,
                bearing_y: glyph.bearing_y,
                advance: glyph.advance,
                coverage: glyph.bitmap,
            }),
            Err(err) => {
                tracing::warn!("Failed to rasterize {:?}: {}", ch, err);
                None
            }
        }
    }

    fn kerning(&self, left: char, right: char, size: f32) -> f32 {
        match (self.face.glyph_id(left), self.face.glyph_id(right)) {
            (Some(a), Some(b)) => self.face.kerning(a, b, size),
            _ => 0.0,
        }
    }
}
