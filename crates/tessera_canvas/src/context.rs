//! Authoring state for a canvas page

use std::sync::Arc;

use tessera_gpu::{BlendEquation, BlendFactor, BlendFunc};
use tessera_paint::{Affine, Color, LineCap, LineJoin, Scissor};
use tessera_text::{FontAtlas, TextAlignment};

use crate::paint::Paint;

/// How fills and strokes combine with the stencil buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FillRule {
    /// Draw where the winding number is non-zero
    #[default]
    NonZero,
    /// Draw where the winding number is odd
    EvenOdd,
    /// Write the shape into the clip region without drawing
    Stencil,
    /// Draw only inside the clip region
    Clip,
    /// Draw only outside the clip region
    Mask,
}

/// Forced orientation for committed paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winding {
    Ccw,
    Cw,
}

/// One entry of a page's state stack.
///
/// Shared values (transform, scissor, paints, font) are reference counted,
/// so saving a state is cheap and setters never reach into a saved copy.
#[derive(Debug, Clone)]
pub struct Context {
    /// Antialiasing fringe width; 0 disables borders
    pub fringe: f32,
    pub winding: Option<Winding>,
    pub fill_rule: FillRule,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub mitre_limit: f32,
    pub global_alpha: f32,
    pub blend_equation: BlendEquation,
    pub src_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub line_cap: LineCap,
    pub line_joint: LineJoin,
    pub transform: Option<Arc<Affine>>,
    pub scissor: Option<Arc<Scissor>>,
    pub stroke_paint: Option<Paint>,
    pub fill_paint: Option<Paint>,
    pub font: Option<Arc<FontAtlas>>,
    /// Pixel size; 0 uses the atlas size
    pub font_size: f32,
    pub font_blur: f32,
    pub font_spacing: f32,
    pub font_align: TextAlignment,
}

impl Default for Context {
    fn default() -> Self {
        let blend = BlendFunc::SOURCE_OVER;
        Self {
            fringe: 0.0,
            winding: None,
            fill_rule: FillRule::NonZero,
            fill_color: Color::WHITE,
            stroke_color: Color::BLACK,
            stroke_width: 1.0,
            mitre_limit: 10.0,
            global_alpha: 1.0,
            blend_equation: BlendEquation::Add,
            src_rgb: blend.src_rgb,
            src_alpha: blend.src_alpha,
            dst_rgb: blend.dst_rgb,
            dst_alpha: blend.dst_alpha,
            line_cap: LineCap::Butt,
            line_joint: LineJoin::Miter,
            transform: None,
            scissor: None,
            stroke_paint: None,
            fill_paint: None,
            font: None,
            font_size: 0.0,
            font_blur: 0.0,
            font_spacing: 0.0,
            font_align: TextAlignment::Left,
        }
    }
}

impl Context {
    /// The current transform, or identity
    pub fn transform(&self) -> Affine {
        self.transform.as_deref().copied().unwrap_or(Affine::IDENTITY)
    }

    pub fn blend_func(&self) -> BlendFunc {
        BlendFunc {
            src_rgb: self.src_rgb,
            src_alpha: self.src_alpha,
            dst_rgb: self.dst_rgb,
            dst_alpha: self.dst_alpha,
        }
    }

    /// Fill color with global alpha applied
    pub fn effective_fill(&self) -> Color {
        self.fill_color.fade(self.global_alpha)
    }

    /// Stroke color with global alpha applied
    pub fn effective_stroke(&self) -> Color {
        self.stroke_color.fade(self.global_alpha)
    }
}

// Fonts compare by identity; everything else by value.
impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        let same_font = match (&self.font, &other.font) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_font
            && self.fringe == other.fringe
            && self.winding == other.winding
            && self.fill_rule == other.fill_rule
            && self.fill_color == other.fill_color
            && self.stroke_color == other.stroke_color
            && self.stroke_width == other.stroke_width
            && self.mitre_limit == other.mitre_limit
            && self.global_alpha == other.global_alpha
            && self.blend_equation == other.blend_equation
            && self.blend_func() == other.blend_func()
            && self.line_cap == other.line_cap
            && self.line_joint == other.line_joint
            && self.transform == other.transform
            && self.scissor == other.scissor
            && self.stroke_paint == other.stroke_paint
            && self.fill_paint == other.fill_paint
            && self.font_size == other.font_size
            && self.font_blur == other.font_blur
            && self.font_spacing == other.font_spacing
            && self.font_align == other.font_align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_blend_source_over() {
        let ctx = Context::default();
        assert_eq!(ctx.blend_func(), BlendFunc::SOURCE_OVER);
        assert_eq!(ctx.transform(), Affine::IDENTITY);
        assert_eq!(ctx.fill_rule, FillRule::NonZero);
    }

    #[test]
    fn test_global_alpha_fades_colors() {
        let ctx = Context {
            global_alpha: 0.5,
            fill_color: Color::RED,
            ..Default::default()
        };
        assert_eq!(ctx.effective_fill().a, 0.5);
        assert_eq!(ctx.effective_stroke(), Color::BLACK.with_alpha(0.5));
    }
}
