//! Page: authoring state, committed paths and recorded commands
//!
//! Paths are built in a spline workspace and committed as flattened
//! [`Path2`]s in canvas space, each with its [`PathOrientation`]. Fill,
//! stroke and text calls turn the committed paths (or laid-out glyphs) into
//! [`Command`]s immediately, so later state changes never alter what was
//! already recorded.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use tessera_gpu::{BlendEquation, BlendFactor, BlendFunc};
use tessera_paint::tessellate::{fringe_ribbon, stroke_path};
use tessera_paint::{
    Affine, Color, DrawCommand, LineCap, LineJoin, Mesh, Path2, PathOrientation, Point, Rect,
    Scissor, Spline, StrokeStyle, TessellationOptions,
};
use tessera_text::{FontAtlas, TextAlignment, TextAnchor, TextBlock, TextLayout};
use tracing::{debug, warn};

use crate::command::{Command, CommandType};
use crate::context::{Context, FillRule, Winding};
use crate::paint::Paint;

/// Cubic control distance for a quarter ellipse
const KAPPA: f32 = 0.552_284_8;

/// One page of a canvas
#[derive(Debug, Clone, Default)]
pub struct Page {
    saved: Vec<Context>,
    context: Context,
    commands: Vec<Command>,
    paths: Vec<Path2>,
    orientations: Vec<PathOrientation>,
    spline: Spline,
    tessellation: TessellationOptions,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Committed paths, in canvas space
    pub fn paths(&self) -> &[Path2] {
        &self.paths
    }

    /// Orientation of each committed path, parallel to [`Page::paths`]
    pub fn orientations(&self) -> &[PathOrientation] {
        &self.orientations
    }

    /// Drop recorded commands and the path under construction.
    ///
    /// Authoring state is kept.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.paths.clear();
        self.orientations.clear();
        self.spline.reset();
    }

    // =========================================================================
    // State stack
    // =========================================================================

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Saved states below the live one
    pub fn saved_states(&self) -> usize {
        self.saved.len()
    }

    pub fn save_state(&mut self) {
        self.saved.push(self.context.clone());
    }

    /// Return to the last saved state, or to the defaults if none is saved
    pub fn restore_state(&mut self) {
        self.context = self.saved.pop().unwrap_or_default();
    }

    pub fn set_fringe(&mut self, fringe: f32) {
        self.context.fringe = fringe.max(0.0);
    }

    pub fn set_winding(&mut self, winding: Option<Winding>) {
        self.context.winding = winding;
    }

    pub fn set_fill_rule(&mut self, rule: FillRule) {
        self.context.fill_rule = rule;
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.context.fill_color = color;
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.context.stroke_color = color;
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.context.stroke_width = width.max(0.0);
    }

    pub fn set_mitre_limit(&mut self, limit: f32) {
        self.context.mitre_limit = limit;
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.context.global_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.context.blend_equation = equation;
    }

    pub fn set_blend_func(&mut self, func: BlendFunc) {
        self.set_src_blend_func(func.src_rgb, func.src_alpha);
        self.set_dst_blend_func(func.dst_rgb, func.dst_alpha);
    }

    pub fn set_src_blend_func(&mut self, rgb: BlendFactor, alpha: BlendFactor) {
        self.context.src_rgb = rgb;
        self.context.src_alpha = alpha;
    }

    pub fn set_dst_blend_func(&mut self, rgb: BlendFactor, alpha: BlendFactor) {
        self.context.dst_rgb = rgb;
        self.context.dst_alpha = alpha;
    }

    pub fn set_line_cap(&mut self, cap: LineCap) {
        self.context.line_cap = cap;
    }

    pub fn set_line_joint(&mut self, joint: LineJoin) {
        self.context.line_joint = joint;
    }

    /// Replace the transform applied to paths, text, paints and scissors
    pub fn set_transform(&mut self, transform: Option<Affine>) {
        self.context.transform = transform.filter(|t| !t.is_identity()).map(Arc::new);
    }

    /// Apply `local` before the current transform
    pub fn apply_transform(&mut self, local: &Affine) {
        let combined = local.then(&self.context.transform());
        self.set_transform(Some(combined));
    }

    pub fn translate(&mut self, tx: f32, ty: f32) {
        self.apply_transform(&Affine::translate(tx, ty));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.apply_transform(&Affine::scale(sx, sy));
    }

    pub fn rotate(&mut self, angle: f32) {
        self.apply_transform(&Affine::rotate(angle));
    }

    /// Clip later commands to `scissor`, placed under the current transform
    pub fn set_scissor(&mut self, scissor: Option<Scissor>) {
        let transform = self.context.transform();
        self.context.scissor = scissor
            .map(|s| s.with_transform(s.transform.then(&transform)))
            .map(Arc::new);
    }

    /// Narrow the current scissor by `scissor`
    pub fn intersect_scissor(&mut self, scissor: Scissor) {
        let transform = self.context.transform();
        let placed = scissor.with_transform(scissor.transform.then(&transform));
        let next = match self.context.scissor.as_deref() {
            Some(current) => current.intersect(&placed),
            None => placed,
        };
        self.context.scissor = Some(Arc::new(next));
    }

    /// Paint for fills; its transform is placed under the current transform
    pub fn set_fill_paint(&mut self, paint: Option<Paint>) {
        self.context.fill_paint = paint.map(|p| self.place_paint(p));
    }

    pub fn set_stroke_paint(&mut self, paint: Option<Paint>) {
        self.context.stroke_paint = paint.map(|p| self.place_paint(p));
    }

    fn place_paint(&self, paint: Paint) -> Paint {
        let transform = paint.transform.then(&self.context.transform());
        paint.with_transform(transform)
    }

    pub fn set_font(&mut self, font: Option<Arc<FontAtlas>>) {
        self.context.font = font;
    }

    /// Pixel size for text; 0 uses the atlas size
    pub fn set_font_size(&mut self, size: f32) {
        self.context.font_size = size.max(0.0);
    }

    pub fn set_font_blur(&mut self, blur: f32) {
        self.context.font_blur = blur.max(0.0);
    }

    pub fn set_font_spacing(&mut self, spacing: f32) {
        self.context.font_spacing = spacing;
    }

    pub fn set_font_align(&mut self, align: TextAlignment) {
        self.context.font_align = align;
    }

    /// Curve flattening tolerance in canvas units
    pub fn set_tolerance(&mut self, tolerance: f32) {
        self.tessellation.tolerance = tolerance.max(0.01);
    }

    // =========================================================================
    // Paths
    // =========================================================================

    /// Discard committed paths and start over
    pub fn begin_path(&mut self) {
        self.paths.clear();
        self.orientations.clear();
        self.spline.reset();
    }

    /// Commit the current subpath and start a new one at `p`
    pub fn move_to(&mut self, p: Point) {
        self.commit_path();
        self.spline.anchor(p);
    }

    /// Line to `p`; without an open subpath the line starts at the origin
    pub fn line_to(&mut self, p: Point) {
        self.ensure_open();
        self.spline.line_to(p);
    }

    pub fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.ensure_open();
        self.spline.quad_to(ctrl, to);
    }

    pub fn bezier_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point) {
        self.ensure_open();
        self.spline.bezier_to(ctrl1, ctrl2, to);
    }

    /// Arc of `radius` tangent to current→`corner` and `corner`→`to`
    pub fn arc_to(&mut self, corner: Point, to: Point, radius: f32) {
        self.ensure_open();
        self.spline.arc_to(corner, to, radius);
    }

    /// Circular arc, counter-clockwise for positive `sweep`.
    ///
    /// Joins the current point to the arc start with a line; without a
    /// current point the subpath starts on the arc.
    pub fn arc(&mut self, center: Point, radius: f32, start_angle: f32, sweep: f32) {
        if !self.spline.is_anchored() {
            let start = center + Point::new(start_angle.cos(), start_angle.sin()) * radius;
            self.spline.anchor(start);
        }
        self.spline.arc(center, radius, start_angle, sweep);
    }

    pub fn close_path(&mut self) {
        if self.spline.is_anchored() {
            self.spline.close();
        }
        self.commit_path();
    }

    /// Anchor at the origin when no subpath is open
    fn ensure_open(&mut self) {
        if !self.spline.is_anchored() {
            self.spline.anchor(Point::ZERO);
        }
    }

    /// Flatten the open subpath into the committed list
    fn commit_path(&mut self) {
        if !self.spline.is_anchored() || self.spline.is_empty() {
            self.spline.reset();
            return;
        }
        let mut path = self.spline.flatten(self.tessellation.tolerance);
        self.spline.reset();
        if path.len() < 2 {
            return;
        }

        path.transform(&self.context.transform());
        if let Some(winding) = self.context.winding {
            let area = path.signed_area();
            let ccw = area > 0.0;
            if area != 0.0 && ccw != (winding == Winding::Ccw) {
                path.reverse();
            }
        }
        self.orientations.push(path.orientation());
        self.paths.push(path);
    }

    // =========================================================================
    // Shape factories (counter-clockwise in y-up space)
    // =========================================================================

    pub fn draw_rect(&mut self, rect: Rect) {
        let [a, b, c, d] = rect.corners();
        self.move_to(a);
        self.line_to(b);
        self.line_to(c);
        self.line_to(d);
        self.close_path();
    }

    /// Rectangle with circular corners; the radius is clamped to fit
    pub fn draw_rounded_rect(&mut self, rect: Rect, radius: f32) {
        let r = radius.min(rect.width() * 0.5).min(rect.height() * 0.5);
        if r <= 0.0 {
            self.draw_rect(rect);
            return;
        }
        let (min, max) = (rect.min(), rect.max());
        self.move_to(Point::new(min.x + r, min.y));
        self.line_to(Point::new(max.x - r, min.y));
        self.arc(Point::new(max.x - r, min.y + r), r, -FRAC_PI_2, FRAC_PI_2);
        self.arc(Point::new(max.x - r, max.y - r), r, 0.0, FRAC_PI_2);
        self.arc(Point::new(min.x + r, max.y - r), r, FRAC_PI_2, FRAC_PI_2);
        self.arc(Point::new(min.x + r, min.y + r), r, PI, FRAC_PI_2);
        self.close_path();
    }

    pub fn draw_ellipse(&mut self, center: Point, rx: f32, ry: f32) {
        let (cx, cy) = (center.x, center.y);
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);
        self.move_to(Point::new(cx + rx, cy));
        self.bezier_to(
            Point::new(cx + rx, cy + ky),
            Point::new(cx + kx, cy + ry),
            Point::new(cx, cy + ry),
        );
        self.bezier_to(
            Point::new(cx - kx, cy + ry),
            Point::new(cx - rx, cy + ky),
            Point::new(cx - rx, cy),
        );
        self.bezier_to(
            Point::new(cx - rx, cy - ky),
            Point::new(cx - kx, cy - ry),
            Point::new(cx, cy - ry),
        );
        self.bezier_to(
            Point::new(cx + kx, cy - ry),
            Point::new(cx + rx, cy - ky),
            Point::new(cx + rx, cy),
        );
        self.close_path();
    }

    pub fn draw_circle(&mut self, center: Point, radius: f32) {
        self.draw_ellipse(center, radius, radius);
    }

    /// Closed polygon through `points`, reordered counter-clockwise
    pub fn draw_polygon(&mut self, points: &[Point]) {
        if points.len() < 2 {
            return;
        }
        let clockwise = Path2::polygon(points.to_vec()).signed_area() < 0.0;
        let mut ordered: Vec<Point> = points.to_vec();
        if clockwise {
            ordered.reverse();
        }
        self.move_to(ordered[0]);
        for p in &ordered[1..] {
            self.line_to(*p);
        }
        self.close_path();
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    /// Record a fill of the committed paths
    pub fn fill_paths(&mut self) {
        self.commit_path();
        let ctx = &self.context;

        let filled: Vec<(&Path2, PathOrientation)> = self
            .paths
            .iter()
            .zip(self.orientations.iter().copied())
            .filter(|(path, orientation)| {
                path.len() >= 3 && *orientation != PathOrientation::Colinear
            })
            .collect();
        if filled.is_empty() {
            return;
        }

        let paint = ctx.fill_paint.as_ref();
        let color = match paint {
            Some(_) => Color::WHITE.fade(ctx.global_alpha),
            None => ctx.effective_fill(),
        };

        let convex = filled.len() == 1 && filled[0].1.is_convex();
        let kind = match (convex, ctx.fill_rule) {
            (true, FillRule::NonZero | FillRule::EvenOdd) => CommandType::ConvexFill,
            (true, FillRule::Stencil) => CommandType::ConvexStencilFill,
            (true, FillRule::Clip) => CommandType::ConvexClipFill,
            (true, FillRule::Mask) => CommandType::ConvexMaskFill,
            (false, FillRule::NonZero) => CommandType::ConcaveFill,
            (false, FillRule::EvenOdd) => CommandType::EvenOddFill,
            (false, FillRule::Stencil) => CommandType::StencilFill,
            (false, FillRule::Clip) => CommandType::ClipFill,
            (false, FillRule::Mask) => CommandType::MaskFill,
        };

        let mut mesh = Mesh::new(DrawCommand::TriangleFan);
        let mut bounds: Option<Rect> = None;
        for (path, _) in &filled {
            mesh.push_fan(&path.points, color);
            let b = path.bounds();
            bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
        }
        let bounds = bounds.unwrap_or_default();
        if !convex {
            mesh.push_fan(&bounds.corners(), color);
        }

        let mut command = Command::new(kind, mesh, ctx, color);
        if ctx.fringe > 0.0 && ctx.fill_rule != FillRule::Stencil {
            let half = ctx.fringe * 0.5;
            let faded = color.with_alpha(0.0);
            for (path, orientation) in &filled {
                let side = if orientation.is_cw() { -1.0 } else { 1.0 };
                command.border.append(&fringe_ribbon(
                    &path.points,
                    true,
                    side,
                    -half,
                    half,
                    color,
                    faded,
                ));
            }
        }

        if let Some(paint) = paint {
            paint.apply(&mut command.mesh, bounds);
            paint.apply(&mut command.border, bounds);
            command.gradient = paint.as_gradient().cloned();
            command.texture = paint.as_texture().cloned();
        }

        debug!(
            "Recorded {:?}: {} paths, {} vertices",
            kind,
            filled.len(),
            command.mesh.vertices.len()
        );
        self.commands.push(command);
    }

    /// Record a stroke of the committed paths
    pub fn stroke_paths(&mut self) {
        self.commit_path();
        if self.paths.is_empty() {
            return;
        }
        let ctx = &self.context;

        let paint = ctx.stroke_paint.as_ref();
        let color = match paint {
            Some(_) => Color::WHITE.fade(ctx.global_alpha),
            None => ctx.effective_stroke(),
        };

        // Widths are authored in local units
        let scale = ctx.transform().determinant().abs().sqrt();
        let width = ctx.stroke_width * scale;
        let style = StrokeStyle {
            width,
            join: ctx.line_joint,
            cap: ctx.line_cap,
            miter_limit: ctx.mitre_limit,
        };

        let mut mesh = Mesh::new(DrawCommand::Triangles);
        for path in &self.paths {
            mesh.append(&stroke_path(path, &style, color, &self.tessellation));
        }
        if mesh.is_empty() {
            return;
        }

        let kind = match ctx.fill_rule {
            FillRule::NonZero | FillRule::EvenOdd => {
                if paint.is_none() && color.is_opaque() {
                    CommandType::NormalStroke
                } else {
                    CommandType::Stroke
                }
            }
            FillRule::Stencil => CommandType::StencilStroke,
            FillRule::Clip => CommandType::ClipStroke,
            FillRule::Mask => CommandType::MaskStroke,
        };

        let bounds = mesh.bounds();
        let mut command = Command::new(kind, mesh, ctx, color);
        if ctx.fringe > 0.0 && ctx.fill_rule != FillRule::Stencil {
            let half = width * 0.5;
            let faded = color.with_alpha(0.0);
            for (path, orientation) in self.paths.iter().zip(&self.orientations) {
                let side = if orientation.is_cw() { -1.0 } else { 1.0 };
                for dir in [1.0, -1.0] {
                    command.border.append(&fringe_ribbon(
                        &path.points,
                        path.closed,
                        side,
                        dir * half,
                        dir * (half + ctx.fringe),
                        color,
                        faded,
                    ));
                }
            }
        }

        if let Some(paint) = paint {
            paint.apply(&mut command.mesh, bounds);
            paint.apply(&mut command.border, bounds);
            command.gradient = paint.as_gradient().cloned();
            command.texture = paint.as_texture().cloned();
        }

        debug!(
            "Recorded {:?}: {} paths, {} vertices",
            kind,
            self.paths.len(),
            command.mesh.vertices.len()
        );
        self.commands.push(command);
    }

    /// Record `text` on one line with its first baseline at `origin`.
    ///
    /// The font alignment places the line relative to `origin`. Paints do
    /// not apply to text.
    pub fn fill_text(&mut self, text: &str, origin: Point) {
        let Some(font) = self.font_for(text) else {
            return;
        };
        let block = self.text_layout(TextAnchor::Baseline, None).layout(&font, text);
        let shift = match self.context.font_align {
            TextAlignment::Center => -block.width() * 0.5,
            TextAlignment::Right => -block.width(),
            TextAlignment::Left | TextAlignment::Justify => 0.0,
        };
        self.push_text(&block, Point::new(origin.x + shift, origin.y));
    }

    /// Record `text` wrapped to `rect`, hanging from its top edge
    pub fn fill_text_box(&mut self, text: &str, rect: Rect) {
        let Some(font) = self.font_for(text) else {
            return;
        };
        let block = self
            .text_layout(TextAnchor::Top, Some(rect.width()))
            .layout(&font, text);
        self.push_text(&block, Point::new(rect.x(), rect.max().y));
    }

    fn font_for(&self, text: &str) -> Option<Arc<FontAtlas>> {
        if text.is_empty() {
            return None;
        }
        let font = self.context.font.clone();
        if font.is_none() {
            warn!("Text drawn without a font: {:?}", text);
        }
        font
    }

    fn text_layout(&self, anchor: TextAnchor, wrap_width: Option<f32>) -> TextLayout {
        let ctx = &self.context;
        TextLayout {
            alignment: ctx.font_align,
            anchor,
            wrap_width,
            tracking: ctx.font_spacing,
            line_spacing: 1.0,
            size: (ctx.font_size > 0.0).then_some(ctx.font_size),
        }
    }

    /// One command per atlas page the block touches
    fn push_text(&mut self, block: &TextBlock, origin: Point) {
        let ctx = &self.context;
        let color = ctx.effective_fill();
        let kind = match ctx.fill_rule {
            FillRule::NonZero | FillRule::EvenOdd => CommandType::NormalText,
            FillRule::Stencil => CommandType::StencilText,
            FillRule::Clip => CommandType::ClipText,
            FillRule::Mask => CommandType::MaskText,
        };
        let transform = ctx.transform();

        for run in block.glyph_runs(origin, color) {
            let mut mesh = run.mesh;
            mesh.transform(&transform);
            let mut command = Command::new(kind, mesh, ctx, color);
            command.texture = Some(run.texture);
            command.blur_step = ctx.font_blur;
            self.commands.push(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_to_commits_previous_subpath() {
        let mut page = Page::new();
        page.move_to(Point::new(0.0, 0.0));
        page.line_to(Point::new(5.0, 0.0));
        page.move_to(Point::new(10.0, 10.0));
        page.line_to(Point::new(20.0, 10.0));
        page.stroke_paths();
        assert_eq!(page.paths().len(), 2);
        assert_eq!(page.orientations().len(), 2);
        assert!(page
            .orientations()
            .iter()
            .all(|o| *o == PathOrientation::Colinear));
    }

    #[test]
    fn test_bare_move_commits_nothing() {
        let mut page = Page::new();
        page.move_to(Point::new(1.0, 1.0));
        page.move_to(Point::new(2.0, 2.0));
        page.close_path();
        assert!(page.paths().is_empty());
    }

    #[test]
    fn test_line_without_move_starts_at_origin() {
        let mut page = Page::new();
        page.line_to(Point::new(10.0, 0.0));
        page.line_to(Point::new(10.0, 10.0));
        page.line_to(Point::new(0.0, 10.0));
        page.close_path();
        assert_eq!(
            page.paths()[0].points,
            vec![
                Point::ZERO,
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ]
        );
    }

    #[test]
    fn test_curves_without_move_start_at_origin() {
        let mut page = Page::new();
        page.bezier_to(
            Point::new(5.0, 5.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 0.0),
        );
        page.stroke_paths();
        let points = &page.paths()[0].points;
        assert_eq!(points[0], Point::ZERO);
        assert_eq!(*points.last().unwrap(), Point::new(10.0, 0.0));

        page.begin_path();
        page.quad_to(Point::new(5.0, 5.0), Point::new(10.0, 0.0));
        page.stroke_paths();
        let points = &page.paths()[0].points;
        assert_eq!(points[0], Point::ZERO);
        assert_eq!(*points.last().unwrap(), Point::new(10.0, 0.0));
    }

    #[test]
    fn test_arc_to_without_move_keeps_the_first_edge() {
        let mut page = Page::new();
        page.arc_to(Point::new(10.0, 0.0), Point::new(10.0, 10.0), 2.0);
        page.stroke_paths();
        let points = &page.paths()[0].points;
        assert_eq!(points[0], Point::ZERO);
        let end = points[points.len() - 1];
        assert!((end.x - 10.0).abs() < 1e-3 && (end.y - 2.0).abs() < 1e-3, "{end:?}");
    }

    #[test]
    fn test_winding_override_reverses_paths() {
        let mut page = Page::new();
        page.set_winding(Some(Winding::Cw));
        page.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        assert!(page.orientations()[0].is_cw());
        assert!(page.paths()[0].signed_area() < 0.0);
    }

    #[test]
    fn test_transform_applies_at_commit() {
        let mut page = Page::new();
        page.translate(10.0, 0.0);
        page.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        page.set_transform(None);
        assert_eq!(page.paths()[0].bounds(), Rect::new(10.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_begin_path_clears_paths_not_commands() {
        let mut page = Page::new();
        page.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        page.fill_paths();
        page.begin_path();
        assert!(page.paths().is_empty());
        assert_eq!(page.commands().len(), 1);
    }

    #[test]
    fn test_scissor_is_snapshot_on_set() {
        let mut page = Page::new();
        page.translate(5.0, 5.0);
        page.set_scissor(Some(Scissor::new(Rect::new(0.0, 0.0, 10.0, 10.0))));
        page.set_transform(None);
        let scissor = page.context().scissor.clone().unwrap();
        assert_eq!(scissor.transform, Affine::translate(5.0, 5.0));
    }
}
