//! Points, sizes, rectangles and transforms

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Points double as vectors.
pub type Vec2 = Point;

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product
    pub fn cross(self, other: Point) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Point) -> f32 {
        (other - self).length()
    }

    /// Unit vector, or zero for a degenerate input
    pub fn normalize(self) -> Point {
        let len = self.length();
        if len > f32::EPSILON {
            Point::new(self.x / len, self.y / len)
        } else {
            Point::ZERO
        }
    }

    /// Rotate 90 degrees clockwise in y-up space.
    ///
    /// For a counter-clockwise polygon this is the outward edge normal.
    pub fn perp_cw(self) -> Point {
        Point::new(self.y, -self.x)
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        self + (other - self) * t
    }

    pub fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Point::new(p[0], p[1])
    }
}

/// A 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle, origin at the minimum corner
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_min_max(min: Point, max: Point) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// Smallest rect containing all points, or `None` for an empty input
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (mut min, mut max) = (first, first);
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self::from_min_max(min, max))
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn min(&self) -> Point {
        self.origin
    }

    pub fn max(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width,
            self.origin.y + self.size.height,
        )
    }

    pub fn center(&self) -> Point {
        self.origin.lerp(self.max(), 0.5)
    }

    pub fn contains(&self, p: Point) -> bool {
        let max = self.max();
        p.x >= self.origin.x && p.x <= max.x && p.y >= self.origin.y && p.y <= max.y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let (a, b) = (self.max(), other.max());
        Rect::from_min_max(
            Point::new(self.origin.x.min(other.origin.x), self.origin.y.min(other.origin.y)),
            Point::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }

    /// Overlap of two rects; empty (zero size) when disjoint
    pub fn intersect(&self, other: &Rect) -> Rect {
        let (a, b) = (self.max(), other.max());
        let min = Point::new(self.origin.x.max(other.origin.x), self.origin.y.max(other.origin.y));
        let max = Point::new(a.x.min(b.x).max(min.x), a.y.min(b.y).max(min.y));
        Rect::from_min_max(min, max)
    }

    /// Corners in counter-clockwise order (y-up), starting at the minimum
    pub fn corners(&self) -> [Point; 4] {
        let max = self.max();
        [
            self.origin,
            Point::new(max.x, self.origin.y),
            max,
            Point::new(self.origin.x, max.y),
        ]
    }
}

/// A 2D affine transform `[a, b, c, d, e, f]`.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub m: [f32; 6],
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        m: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self {
            m: [a, b, c, d, e, f],
        }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation in radians (y-up)
    pub fn rotate(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    /// Apply `self` first, then `next`
    pub fn then(&self, next: &Affine) -> Affine {
        let [a0, b0, c0, d0, e0, f0] = self.m;
        let [a1, b1, c1, d1, e1, f1] = next.m;
        Affine::new(
            a1 * a0 + c1 * b0,
            b1 * a0 + d1 * b0,
            a1 * c0 + c1 * d0,
            b1 * c0 + d1 * d0,
            a1 * e0 + c1 * f0 + e1,
            b1 * e0 + d1 * f0 + f1,
        )
    }

    /// Apply `pre` first, then `self`
    pub fn pre(&self, pre: &Affine) -> Affine {
        pre.then(self)
    }

    pub fn determinant(&self) -> f32 {
        self.m[0] * self.m[3] - self.m[2] * self.m[1]
    }

    /// Inverse transform, `None` if singular
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        let [a, b, c, d, e, f] = self.m;
        Some(Affine::new(
            d * inv,
            -b * inv,
            -c * inv,
            a * inv,
            (c * f - d * e) * inv,
            (b * e - a * f) * inv,
        ))
    }

    pub fn transform_point(&self, p: Point) -> Point {
        let [a, b, c, d, e, f] = self.m;
        Point::new(a * p.x + c * p.y + e, b * p.x + d * p.y + f)
    }

    /// Transform a direction, ignoring translation
    pub fn transform_vector(&self, v: Vec2) -> Vec2 {
        let [a, b, c, d, _, _] = self.m;
        Point::new(a * v.x + c * v.y, b * v.x + d * v.y)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Column-major 3x3 with each column padded to four floats (WGSL `mat3x3` layout)
    pub fn to_padded_columns(&self) -> [[f32; 4]; 3] {
        let [a, b, c, d, e, f] = self.m;
        [[a, b, 0.0, 0.0], [c, d, 0.0, 0.0], [e, f, 1.0, 0.0]]
    }
}

/// A 4x4 column-major matrix, used for the batch projection
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub m: [f32; 16],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Orthographic projection mapping the given box to clip space (z passes through)
    pub fn ortho(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        let w = right - left;
        let h = top - bottom;
        let mut m = Self::IDENTITY.m;
        m[0] = 2.0 / w;
        m[5] = 2.0 / h;
        m[12] = -(right + left) / w;
        m[13] = -(top + bottom) / h;
        Self { m }
    }

    /// Projection for a canvas of the given pixel size, y-up with origin bottom left
    pub fn screen(width: f32, height: f32) -> Self {
        Self::ortho(0.0, width, 0.0, height)
    }

    pub fn from_affine(t: &Affine) -> Self {
        let [a, b, c, d, e, f] = t.m;
        let mut m = Self::IDENTITY.m;
        m[0] = a;
        m[1] = b;
        m[4] = c;
        m[5] = d;
        m[12] = e;
        m[13] = f;
        Self { m }
    }

    /// `self * rhs` (rhs applied first)
    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4)
                    .map(|k| self.m[k * 4 + row] * rhs.m[col * 4 + k])
                    .sum();
            }
        }
        Mat4 { m: out }
    }

    pub fn transform_point(&self, p: Point) -> Point {
        let m = &self.m;
        Point::new(
            m[0] * p.x + m[4] * p.y + m[12],
            m[1] * p.x + m[5] * p.y + m[13],
        )
    }

    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let m = &self.m;
        [
            [m[0], m[1], m[2], m[3]],
            [m[4], m[5], m[6], m[7]],
            [m[8], m[9], m[10], m[11]],
            [m[12], m[13], m[14], m[15]],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-4 && (a.y - b.y).abs() < 1e-4
    }

    #[test]
    fn test_affine_then_order() {
        let t = Affine::scale(2.0, 2.0).then(&Affine::translate(10.0, 0.0));
        assert!(approx(t.transform_point(Point::new(1.0, 1.0)), Point::new(12.0, 2.0)));
    }

    #[test]
    fn test_affine_inverse() {
        let t = Affine::rotate(0.7)
            .then(&Affine::scale(3.0, 0.5))
            .then(&Affine::translate(-4.0, 9.0));
        let inv = t.inverse().unwrap();
        let p = Point::new(5.0, -2.0);
        assert!(approx(inv.transform_point(t.transform_point(p)), p));
        assert!(Affine::scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_screen_projection() {
        let proj = Mat4::screen(200.0, 100.0);
        assert!(approx(proj.transform_point(Point::new(0.0, 0.0)), Point::new(-1.0, -1.0)));
        assert!(approx(proj.transform_point(Point::new(200.0, 100.0)), Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_mat4_from_affine_matches_affine() {
        let t = Affine::rotate(1.1).then(&Affine::translate(3.0, 4.0));
        let m = Mat4::from_affine(&t);
        let p = Point::new(2.0, 7.0);
        assert!(approx(m.transform_point(p), t.transform_point(p)));
        assert!(approx(
            Mat4::IDENTITY.mul(&m).transform_point(p),
            t.transform_point(p)
        ));
    }

    #[test]
    fn test_rect_intersect_disjoint_is_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 5.0, 5.0);
        let r = a.intersect(&b);
        assert_eq!(r.width(), 0.0);
        assert_eq!(r.height(), 0.0);
    }
}
