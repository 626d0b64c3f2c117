//! Font face loading and metrics

use std::sync::Arc;

use ttf_parser::GlyphId;

use crate::{Result, TextError};

/// Vertical metrics in font units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub units_per_em: u16,
    /// Distance from baseline to the top of the tallest glyph (positive)
    pub ascender: i16,
    /// Distance from baseline to the bottom of the lowest glyph (negative)
    pub descender: i16,
    pub line_gap: i16,
}

impl FontMetrics {
    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em.max(1) as f32
    }

    pub fn ascender_px(&self, font_size: f32) -> f32 {
        self.ascender as f32 * self.scale(font_size)
    }

    /// Descender as a positive distance below the baseline
    pub fn descender_px(&self, font_size: f32) -> f32 {
        -(self.descender as f32) * self.scale(font_size)
    }

    pub fn line_gap_px(&self, font_size: f32) -> f32 {
        self.line_gap as f32 * self.scale(font_size)
    }

    pub fn line_height_px(&self, font_size: f32) -> f32 {
        self.ascender_px(font_size) + self.descender_px(font_size) + self.line_gap_px(font_size)
    }
}

/// A parsed font face. The font data is shared, so clones are cheap.
#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    metrics: FontMetrics,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("bytes", &self.data.len())
            .field("face_index", &self.face_index)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl FontFace {
    /// Parse a TTF/OTF file (or one face of a collection)
    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, face_index).map_err(|err| {
            tracing::error!("Failed to parse font face {}: {}", face_index, err);
            TextError::FontParse(err.to_string())
        })?;
        let metrics = FontMetrics {
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
        };
        Ok(Self {
            data: Arc::new(data),
            face_index,
            metrics,
        })
    }

    /// Read and parse a font file
    pub fn from_file(path: impl AsRef<std::path::Path>, face_index: u32) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| {
            tracing::error!("Failed to read font {}: {}", path.display(), err);
            TextError::FontParse(format!("{}: {}", path.display(), err))
        })?;
        Self::from_data(data, face_index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    // Validated in from_data, so re-parsing only fails on corrupted memory
    fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.face_index).ok()
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        self.face()?.glyph_index(ch).map(|id| id.0)
    }

    /// Horizontal advance in pixels
    pub fn advance(&self, glyph_id: u16, font_size: f32) -> f32 {
        let units = self
            .face()
            .and_then(|face| face.glyph_hor_advance(GlyphId(glyph_id)))
            .unwrap_or(0);
        units as f32 * self.metrics.scale(font_size)
    }

    /// Pair kerning from the `kern` table in pixels, zero when absent
    pub fn kerning(&self, left: u16, right: u16, font_size: f32) -> f32 {
        let Some(face) = self.face() else {
            return 0.0;
        };
        let Some(kern) = face.tables().kern else {
            return 0.0;
        };
        let units = kern
            .subtables
            .into_iter()
            .filter(|st| st.horizontal && !st.variable)
            .find_map(|st| st.glyphs_kerning(GlyphId(left), GlyphId(right)))
            .unwrap_or(0);
        units as f32 * self.metrics.scale(font_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_rejected() {
        let err = FontFace::from_data(vec![0, 1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, TextError::FontParse(_)));
    }

    #[test]
    fn test_metric_scaling() {
        let metrics = FontMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 100,
        };
        assert_eq!(metrics.ascender_px(10.0), 8.0);
        assert_eq!(metrics.descender_px(10.0), 2.0);
        assert_eq!(metrics.line_height_px(10.0), 11.0);
    }
}
