//! Text layout
//!
//! Breaks text into lines against a [`FontAtlas`], aligns and anchors them,
//! and turns the result into one [`GlyphRun`] per atlas page.
//!
//! Coordinates are canvas space (y-up). With [`TextAnchor::Top`] the block
//! hangs below the origin.

use std::sync::Arc;

use smallvec::SmallVec;
use tessera_gpu::GlyphRun;
use tessera_paint::{Color, DrawCommand, Mesh, Point, Rect, Vertex};

use crate::atlas::{AtlasRegion, FontAtlas};
use crate::source::LineMetrics;

/// Horizontal alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
    /// Stretch wrapped lines to the wrap width; paragraph ends stay left
    Justify,
}

/// Which part of the block sits on the layout origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Top,
    Middle,
    /// First line's baseline
    Baseline,
    Bottom,
}

/// Extra tracking per gap that brings `natural` up to `target`.
///
/// Rounds so the result lands within one unit under the target, never over,
/// and clamps to `[-0.1 * size, 0.5 * size]`.
pub fn justify_tracking(natural: f32, target: f32, gaps: usize, size: f32) -> f32 {
    if gaps == 0 {
        return 0.0;
    }
    let t = (target - natural).floor() / gaps as f32;
    t.clamp(-0.1 * size, 0.5 * size)
}

/// Layout parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub alignment: TextAlignment,
    pub anchor: TextAnchor,
    /// Word-wrap width; `None` keeps each paragraph on one line
    pub wrap_width: Option<f32>,
    /// Extra space between glyphs in pixels
    pub tracking: f32,
    /// Line height multiplier
    pub line_spacing: f32,
    /// Pixel size; `None` uses the atlas size
    pub size: Option<f32>,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            alignment: TextAlignment::Left,
            anchor: TextAnchor::Top,
            wrap_width: None,
            tracking: 0.0,
            line_spacing: 1.0,
            size: None,
        }
    }
}

/// A glyph pen position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub x: f32,
    pub baseline: f32,
}

/// One laid-out line
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub glyphs: Vec<PlacedGlyph>,
    /// Left edge after alignment
    pub offset: f32,
    pub width: f32,
    pub baseline: f32,
    /// Last line of its paragraph
    pub paragraph_end: bool,
}

impl TextLayout {
    fn scale(&self, atlas: &FontAtlas) -> f32 {
        let size = self.size.filter(|s| *s > 0.0).unwrap_or(atlas.size());
        size / atlas.size().max(f32::EPSILON)
    }

    /// Pen advance from `ch` to `next`
    fn step(&self, atlas: &FontAtlas, scale: f32, ch: char, next: Option<char>) -> f32 {
        let advance = atlas.glyph(ch).map_or(0.0, |g| g.advance) * scale;
        match next {
            Some(next) => advance + atlas.kerning(ch, next) * scale + self.tracking,
            None => advance,
        }
    }

    /// Natural width of a run of characters
    pub fn measure(&self, atlas: &FontAtlas, chars: &[char]) -> f32 {
        let scale = self.scale(atlas);
        self.measure_scaled(atlas, scale, chars)
    }

    fn measure_scaled(&self, atlas: &FontAtlas, scale: f32, chars: &[char]) -> f32 {
        chars
            .iter()
            .enumerate()
            .map(|(i, &ch)| self.step(atlas, scale, ch, chars.get(i + 1).copied()))
            .sum()
    }

    /// Greedy word wrap of one paragraph
    fn wrap(&self, atlas: &FontAtlas, scale: f32, chars: &[char], width: f32, rows: &mut Vec<(Vec<char>, bool)>) {
        let mut line: Vec<char> = Vec::new();
        let mut started = false;
        for word in chars.split(|c| *c == ' ') {
            if !started {
                line.extend_from_slice(word);
                started = true;
                continue;
            }
            let mut candidate = line.clone();
            candidate.push(' ');
            candidate.extend_from_slice(word);
            if self.measure_scaled(atlas, scale, &candidate) <= width {
                line = candidate;
            } else {
                rows.push((std::mem::take(&mut line), false));
                line.extend_from_slice(word);
            }
        }
        rows.push((line, true));
    }

    /// Lay out `text`; `\n` starts a new paragraph
    pub fn layout(&self, atlas: &Arc<FontAtlas>, text: &str) -> TextBlock {
        let scale = self.scale(atlas);
        let metrics = atlas.line_metrics().scaled(scale);
        let line_height = metrics.height() * self.line_spacing;
        let size = atlas.size() * scale;

        let missing = text
            .chars()
            .filter(|c| !c.is_control() && !atlas.has_glyph(*c))
            .count();
        if missing > 0 {
            tracing::warn!("{} characters have no glyph in the atlas", missing);
        }

        let mut rows = Vec::new();
        for paragraph in text.split('\n') {
            let chars: Vec<char> = paragraph.chars().filter(|c| *c != '\r').collect();
            match self.wrap_width {
                Some(width) if width > 0.0 => self.wrap(atlas, scale, &chars, width, &mut rows),
                _ => rows.push((chars, true)),
            }
        }

        let naturals: Vec<f32> = rows
            .iter()
            .map(|(chars, _)| self.measure_scaled(atlas, scale, chars))
            .collect();
        let target = self
            .wrap_width
            .unwrap_or_else(|| naturals.iter().copied().fold(0.0, f32::max));

        let mut lines = Vec::with_capacity(rows.len());
        for (i, ((chars, paragraph_end), natural)) in rows.into_iter().zip(naturals).enumerate() {
            let gaps = chars.len().saturating_sub(1);
            let (offset, extra) = match self.alignment {
                TextAlignment::Left => (0.0, 0.0),
                TextAlignment::Center => ((target - natural) / 2.0, 0.0),
                TextAlignment::Right => (target - natural, 0.0),
                TextAlignment::Justify if paragraph_end || gaps == 0 => (0.0, 0.0),
                TextAlignment::Justify => {
                    let extra = justify_tracking(natural, target, gaps, size);
                    let reached = natural + extra * gaps as f32;
                    if reached < target - 1.0 || reached > target + 1e-3 {
                        tracing::warn!(
                            "Line {} justified to {:.1} of {:.1}: tracking limit reached",
                            i,
                            reached,
                            target
                        );
                    }
                    (0.0, extra)
                }
            };

            let baseline = -metrics.ascent - i as f32 * line_height;
            let mut pen = offset;
            let mut glyphs = Vec::with_capacity(chars.len());
            for (j, &ch) in chars.iter().enumerate() {
                glyphs.push(PlacedGlyph { ch, x: pen, baseline });
                let next = chars.get(j + 1).copied();
                pen += self.step(atlas, scale, ch, next);
                if next.is_some() {
                    pen += extra;
                }
            }

            lines.push(TextLine {
                glyphs,
                offset,
                width: natural + extra * gaps as f32,
                baseline,
                paragraph_end,
            });
        }

        let height = if lines.is_empty() {
            0.0
        } else {
            metrics.ascent + metrics.descent + (lines.len() - 1) as f32 * line_height
        };
        let shift = match self.anchor {
            TextAnchor::Top => 0.0,
            TextAnchor::Baseline => metrics.ascent,
            TextAnchor::Middle => height / 2.0,
            TextAnchor::Bottom => height,
        };
        for line in &mut lines {
            line.baseline += shift;
            for glyph in &mut line.glyphs {
                glyph.baseline += shift;
            }
        }

        TextBlock {
            atlas: Arc::clone(atlas),
            scale,
            metrics,
            line_height,
            height,
            top: shift,
            lines,
        }
    }
}

/// Laid-out text bound to the atlas it was measured against
#[derive(Debug, Clone)]
pub struct TextBlock {
    atlas: Arc<FontAtlas>,
    scale: f32,
    metrics: LineMetrics,
    line_height: f32,
    height: f32,
    /// y of the block's top edge
    top: f32,
    lines: Vec<TextLine>,
}

impl TextBlock {
    pub fn atlas(&self) -> &Arc<FontAtlas> {
        &self.atlas
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    pub fn line_metrics(&self) -> LineMetrics {
        self.metrics
    }

    pub fn glyph_count(&self) -> usize {
        self.lines.iter().map(|l| l.glyphs.len()).sum()
    }

    /// Widest line
    pub fn width(&self) -> f32 {
        self.lines.iter().map(|l| l.width).fold(0.0, f32::max)
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Line boxes from ascent to descent
    pub fn logical_bounds(&self) -> Rect {
        let left = self.lines.iter().map(|l| l.offset).fold(f32::INFINITY, f32::min);
        let right = self
            .lines
            .iter()
            .map(|l| l.offset + l.width)
            .fold(f32::NEG_INFINITY, f32::max);
        if !left.is_finite() || !right.is_finite() {
            return Rect::new(0.0, self.top, 0.0, 0.0);
        }
        Rect::new(left, self.top - self.height, right - left, self.height)
    }

    /// Tight bounds of the inked glyph quads, falling back to the logical
    /// bounds for text with no visible glyphs
    pub fn bounds(&self) -> Rect {
        self.quads()
            .map(|(_, quad, _)| quad)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| self.logical_bounds())
    }

    /// Quads of visible glyphs with their atlas regions
    fn quads(&self) -> impl Iterator<Item = (char, Rect, AtlasRegion)> + '_ {
        let scale = self.scale;
        self.lines.iter().flat_map(|l| &l.glyphs).filter_map(move |g| {
            let metrics = self.atlas.glyph(g.ch)?;
            let region = metrics.region?;
            let w = metrics.width * scale;
            let h = metrics.height * scale;
            let left = g.x + metrics.bearing_x * scale;
            let top = g.baseline + metrics.bearing_y * scale;
            Some((g.ch, Rect::new(left, top - h, w, h), region))
        })
    }

    /// Glyph meshes grouped by atlas page, offset by `origin`.
    ///
    /// Texture coordinates are absolute within the page texture.
    pub fn glyph_runs(&self, origin: Point, color: Color) -> Vec<GlyphRun> {
        let pages = self.atlas.pages();
        let mut meshes: SmallVec<[Option<Mesh>; 4]> = SmallVec::new();
        meshes.resize(pages.len(), None);

        for (_, quad, region) in self.quads() {
            let Some(page) = pages.get(region.page) else {
                continue;
            };
            let pw = page.width().max(1) as f32;
            let ph = page.height().max(1) as f32;
            let u0 = region.x as f32 / pw;
            let u1 = (region.x + region.width) as f32 / pw;
            let v_top = region.y as f32 / ph;
            let v_bottom = (region.y + region.height) as f32 / ph;

            let mesh = meshes[region.page].get_or_insert_with(|| Mesh::new(DrawCommand::Triangles));
            let base = mesh.vertices.len() as u32;
            let corners = quad.corners();
            let uvs = [[u0, v_bottom], [u1, v_bottom], [u1, v_top], [u0, v_top]];
            for (corner, uv) in corners.iter().zip(uvs) {
                let mut v = Vertex::new(Point::new(corner.x + origin.x, corner.y + origin.y), color);
                v.texcoord = uv;
                mesh.vertices.push(v);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        meshes
            .into_iter()
            .zip(pages)
            .filter_map(|(mesh, page)| {
                mesh.map(|mesh| GlyphRun {
                    texture: Arc::clone(page),
                    mesh,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_justify_tracking_rounds_under() {
        let t = justify_tracking(36.0, 50.5, 4, 10.0);
        assert_eq!(t, 3.5);
        let reached = 36.0 + t * 4.0;
        assert!(reached <= 50.5 && reached >= 49.5);
    }

    #[test]
    fn test_justify_tracking_is_clamped() {
        assert_eq!(justify_tracking(10.0, 100.0, 2, 10.0), 5.0);
        assert_eq!(justify_tracking(100.0, 10.0, 2, 10.0), -1.0);
        assert_eq!(justify_tracking(10.0, 100.0, 0, 10.0), 0.0);
    }
}
