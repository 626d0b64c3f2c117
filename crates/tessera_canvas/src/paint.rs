//! Gradient and pattern paints
//!
//! Paint space is scaled so the shorter side of the painted mesh's bounds
//! spans one unit. A linear gradient from `(0, 0)` to `(1, 0)` therefore
//! runs across a square shape at the origin regardless of its pixel size.
//! `transform` maps paint space into canvas space.

use std::sync::Arc;

use tessera_gpu::Texture;
use tessera_paint::{Affine, Color, Gradient, Mesh, Point, Rect};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintKind {
    Gradient(Arc<Gradient>),
    /// Repeating image; texture rows run top-down, so paint y is flipped
    Pattern(Arc<Texture>),
}

/// A fill or stroke source other than a flat color
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub kind: PaintKind,
    pub transform: Affine,
}

impl Paint {
    pub fn gradient(gradient: Gradient) -> Self {
        Self {
            kind: PaintKind::Gradient(Arc::new(gradient)),
            transform: Affine::IDENTITY,
        }
    }

    pub fn linear(start: Point, end: Point, inner: Color, outer: Color) -> Self {
        Self::gradient(Gradient::linear(start, end, inner, outer))
    }

    pub fn radial(center: Point, inner_radius: f32, outer_radius: f32, inner: Color, outer: Color) -> Self {
        Self::gradient(Gradient::radial(center, inner_radius, outer_radius, inner, outer))
    }

    pub fn boxed(rect: Rect, radius: f32, feather: f32, inner: Color, outer: Color) -> Self {
        Self::gradient(Gradient::boxed(rect, radius, feather, inner, outer))
    }

    pub fn pattern(texture: Arc<Texture>) -> Self {
        Self {
            kind: PaintKind::Pattern(texture),
            transform: Affine::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn as_gradient(&self) -> Option<&Arc<Gradient>> {
        match &self.kind {
            PaintKind::Gradient(g) => Some(g),
            PaintKind::Pattern(_) => None,
        }
    }

    pub fn as_texture(&self) -> Option<&Arc<Texture>> {
        match &self.kind {
            PaintKind::Pattern(t) => Some(t),
            PaintKind::Gradient(_) => None,
        }
    }

    /// Write paint coordinates into `mesh`, measured against `bounds`
    pub fn apply(&self, mesh: &mut Mesh, bounds: Rect) {
        let inverse = self.transform.inverse().unwrap_or(Affine::IDENTITY);
        let extent = bounds.width().min(bounds.height());
        let scale = if extent > f32::EPSILON { 1.0 / extent } else { 1.0 };

        for v in &mut mesh.vertices {
            let local = inverse.transform_point(v.point()) * scale;
            match self.kind {
                PaintKind::Gradient(_) => v.gradcoord = local.to_array(),
                PaintKind::Pattern(_) => v.texcoord = [local.x, 1.0 - local.y],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_gpu::TextureId;
    use tessera_paint::DrawCommand;

    fn square(size: f32) -> Mesh {
        let mut mesh = Mesh::new(DrawCommand::TriangleFan);
        mesh.push_fan(&Rect::new(0.0, 0.0, size, size).corners(), Color::WHITE);
        mesh
    }

    #[test]
    fn test_gradient_coords_normalize_by_short_side() {
        let mut mesh = square(50.0);
        let paint = Paint::linear(Point::ZERO, Point::new(1.0, 0.0), Color::RED, Color::BLUE);
        let bounds = mesh.bounds();
        paint.apply(&mut mesh, bounds);
        assert_eq!(mesh.vertices[2].gradcoord, [1.0, 1.0]);
        assert_eq!(mesh.vertices[0].texcoord, [0.0, 0.0]);
    }

    #[test]
    fn test_pattern_flips_y() {
        let mut mesh = square(10.0);
        let paint = Paint::pattern(Arc::new(Texture::new(TextureId(1), 4, 4)))
            .with_transform(Affine::scale(2.0, 2.0));
        let bounds = mesh.bounds();
        paint.apply(&mut mesh, bounds);
        // (10, 10) -> paint (5, 5) -> scaled (0.5, 0.5)
        assert_eq!(mesh.vertices[2].texcoord, [0.5, 0.5]);
        // (0, 0) -> bottom of the image
        assert_eq!(mesh.vertices[0].texcoord, [0.0, 1.0]);
    }
}
