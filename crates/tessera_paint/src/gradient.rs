//! Gradient fills and scissor regions
//!
//! Both follow the nanovg model: a transform into a local space where the
//! shape is described by a half extent, a corner radius and a feather. The
//! shader evaluates a rounded-rect distance in that space.

use crate::color::Color;
use crate::geometry::{Affine, Point, Rect, Size};

/// Distance used to make linear gradients behave as an infinite box
const LARGE: f32 = 1e5;

/// A two-color gradient
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gradient {
    /// Maps gradient space to shape space
    pub transform: Affine,
    pub inner: Color,
    pub outer: Color,
    /// Half extent of the gradient box
    pub extent: Size,
    pub radius: f32,
    pub feather: f32,
}

impl Gradient {
    /// Linear gradient from `start` (inner color) to `end` (outer color)
    pub fn linear(start: Point, end: Point, inner: Color, outer: Color) -> Self {
        let delta = end - start;
        let d = delta.length();
        let dir = if d > 1e-4 {
            delta * (1.0 / d)
        } else {
            Point::new(0.0, 1.0)
        };
        Self {
            transform: Affine::new(
                dir.y,
                -dir.x,
                dir.x,
                dir.y,
                start.x - dir.x * LARGE,
                start.y - dir.y * LARGE,
            ),
            inner,
            outer,
            extent: Size::new(LARGE, LARGE + d * 0.5),
            radius: 0.0,
            feather: d.max(1e-4),
        }
    }

    /// Radial gradient between two radii around `center`
    pub fn radial(center: Point, inner_radius: f32, outer_radius: f32, inner: Color, outer: Color) -> Self {
        let r = (inner_radius + outer_radius) * 0.5;
        let f = outer_radius - inner_radius;
        Self {
            transform: Affine::translate(center.x, center.y),
            inner,
            outer,
            extent: Size::new(r, r),
            radius: r,
            feather: f.max(1e-4),
        }
    }

    /// Box gradient, used for drop shadows and soft rounded rects
    pub fn boxed(rect: Rect, radius: f32, feather: f32, inner: Color, outer: Color) -> Self {
        let c = rect.center();
        Self {
            transform: Affine::translate(c.x, c.y),
            inner,
            outer,
            extent: Size::new(rect.width() * 0.5, rect.height() * 0.5),
            radius,
            feather: feather.max(1e-4),
        }
    }

    /// Compose an additional transform after the gradient's own
    pub fn transformed(&self, t: &Affine) -> Self {
        Self {
            transform: self.transform.then(t),
            ..*self
        }
    }

    /// Shape space to gradient space, padded for the uniform block
    pub fn inverse_columns(&self) -> [[f32; 4]; 3] {
        self.transform
            .inverse()
            .unwrap_or(Affine::IDENTITY)
            .to_padded_columns()
    }

    /// `[extent.x, extent.y, radius, feather]`
    pub fn params(&self) -> [f32; 4] {
        [self.extent.width, self.extent.height, self.radius, self.feather]
    }

    /// Color at a point in shape space, as the shader computes it
    pub fn sample(&self, p: Point) -> Color {
        let local = self
            .transform
            .inverse()
            .unwrap_or(Affine::IDENTITY)
            .transform_point(p);
        let d = rounded_rect_distance(local, self.extent, self.radius);
        let t = ((d + self.feather * 0.5) / self.feather).clamp(0.0, 1.0);
        Color::new(
            self.inner.r + (self.outer.r - self.inner.r) * t,
            self.inner.g + (self.outer.g - self.inner.g) * t,
            self.inner.b + (self.outer.b - self.inner.b) * t,
            self.inner.a + (self.outer.a - self.inner.a) * t,
        )
    }
}

fn rounded_rect_distance(p: Point, extent: Size, radius: f32) -> f32 {
    let ext = Point::new(extent.width - radius, extent.height - radius);
    let d = Point::new(p.x.abs() - ext.x, p.y.abs() - ext.y);
    let outside = Point::new(d.x.max(0.0), d.y.max(0.0)).length();
    d.x.max(d.y).min(0.0) + outside - radius
}

/// A rectangular clip region under a transform, with a soft edge
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scissor {
    /// Maps scissor space to world space
    pub transform: Affine,
    pub bounds: Rect,
    /// Width of the soft edge in pixels; zero for a hard edge
    pub fringe: f32,
}

impl Scissor {
    pub fn new(bounds: Rect) -> Self {
        Self {
            transform: Affine::IDENTITY,
            bounds,
            fringe: 0.0,
        }
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_fringe(mut self, fringe: f32) -> Self {
        self.fringe = fringe;
        self
    }

    /// Intersect with another scissor, expressed in this scissor's space.
    ///
    /// The other region is approximated by its bounding box in our space.
    pub fn intersect(&self, other: &Scissor) -> Scissor {
        let Some(to_local) = self.transform.inverse() else {
            return *self;
        };
        let corners: Vec<Point> = other
            .bounds
            .corners()
            .iter()
            .map(|c| to_local.transform_point(other.transform.transform_point(*c)))
            .collect();
        let other_local = Rect::from_points(&corners).unwrap_or_default();
        Scissor {
            bounds: self.bounds.intersect(&other_local),
            ..*self
        }
    }

    /// World space to centered scissor space, padded for the uniform block
    pub fn inverse_columns(&self) -> [[f32; 4]; 3] {
        let c = self.bounds.center();
        Affine::translate(c.x, c.y)
            .then(&self.transform)
            .inverse()
            .unwrap_or(Affine::IDENTITY)
            .to_padded_columns()
    }

    /// `[half_width, half_height, edge_scale_x, edge_scale_y]`
    pub fn params(&self) -> [f32; 4] {
        let [a, b, c, d, _, _] = self.transform.m;
        let sx = (a * a + c * c).sqrt();
        let sy = (b * b + d * d).sqrt();
        let (ex, ey) = if self.fringe > 0.0 {
            (sx / self.fringe, sy / self.fringe)
        } else {
            (LARGE, LARGE)
        };
        [self.bounds.width() * 0.5, self.bounds.height() * 0.5, ex, ey]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_endpoints() {
        let g = Gradient::linear(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Color::BLACK,
            Color::WHITE,
        );
        assert!(g.sample(Point::new(-10.0, 0.0)).r < 0.01);
        assert!(g.sample(Point::new(110.0, 0.0)).r > 0.99);
        let mid = g.sample(Point::new(50.0, 0.0)).r;
        assert!((mid - 0.5).abs() < 0.02, "mid = {mid}");
    }

    #[test]
    fn test_radial_inside_is_inner() {
        let g = Gradient::radial(Point::new(5.0, 5.0), 2.0, 4.0, Color::RED, Color::BLUE);
        assert_eq!(g.sample(Point::new(5.0, 5.0)), Color::RED);
        assert_eq!(g.sample(Point::new(50.0, 5.0)), Color::BLUE);
    }

    #[test]
    fn test_scissor_intersect() {
        let a = Scissor::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = Scissor::new(Rect::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(a.intersect(&b).bounds, Rect::new(5.0, 5.0, 5.0, 5.0));
    }
}
