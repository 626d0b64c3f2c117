//! Flattened paths and orientation classification

use crate::geometry::{Affine, Point, Rect};

/// Points closer than this are treated as the same vertex
pub const POINT_EPSILON: f32 = 1e-4;

/// Winding and convexity of a flattened path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathOrientation {
    /// Degenerate: fewer than three points or zero area
    Colinear,
    CcwConvex,
    CcwConcave,
    CwConvex,
    CwConcave,
}

impl PathOrientation {
    pub fn is_convex(self) -> bool {
        matches!(self, Self::CcwConvex | Self::CwConvex)
    }

    pub fn is_ccw(self) -> bool {
        matches!(self, Self::CcwConvex | Self::CcwConcave)
    }

    pub fn is_cw(self) -> bool {
        matches!(self, Self::CwConvex | Self::CwConcave)
    }
}

/// A polyline produced by spline flattening
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path2 {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Path2 {
    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Closed polygon from a point list
    pub fn polygon(points: Vec<Point>) -> Self {
        Self::new(points, true)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shoelace area; positive for counter-clockwise paths in y-up space
    pub fn signed_area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0f32;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            sum += a.cross(b);
        }
        sum * 0.5
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_points(&self.points).unwrap_or_default()
    }

    pub fn transform(&mut self, t: &Affine) {
        for p in &mut self.points {
            *p = t.transform_point(*p);
        }
    }

    /// Classify winding direction and convexity.
    ///
    /// A path is convex when every non-degenerate turn agrees with the winding
    /// and the turning angles sum to a single revolution. Star polygons turn
    /// the same way at every vertex but revolve twice, so they are concave.
    pub fn orientation(&self) -> PathOrientation {
        let area = self.signed_area();
        let mut points: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if points.last().map_or(true, |q| q.distance(*p) > POINT_EPSILON) {
                points.push(*p);
            }
        }
        while points.len() > 1 && points[0].distance(points[points.len() - 1]) <= POINT_EPSILON {
            points.pop();
        }
        let n = points.len();
        if n < 3 || area.abs() <= f32::EPSILON {
            return PathOrientation::Colinear;
        }
        let ccw = area > 0.0;

        let mut convex = true;
        let mut turning = 0.0f32;
        for i in 0..n {
            let prev = points[(i + n - 1) % n];
            let curr = points[i];
            let next = points[(i + 1) % n];
            let e0 = curr - prev;
            let e1 = next - curr;
            let cross = e0.cross(e1);
            turning += cross.atan2(e0.dot(e1));
            if cross.abs() <= 1e-6 {
                continue;
            }
            if (cross > 0.0) != ccw {
                convex = false;
            }
        }
        if turning.abs() > std::f32::consts::TAU + 1e-2 {
            convex = false;
        }

        match (ccw, convex) {
            (true, true) => PathOrientation::CcwConvex,
            (true, false) => PathOrientation::CcwConcave,
            (false, true) => PathOrientation::CwConvex,
            (false, false) => PathOrientation::CwConcave,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Path2 {
        Path2::polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ])
    }

    #[test]
    fn test_square_is_ccw_convex() {
        let path = square();
        assert_eq!(path.signed_area(), 100.0);
        assert_eq!(path.orientation(), PathOrientation::CcwConvex);
    }

    #[test]
    fn test_reverse_flips_winding() {
        let mut path = square();
        path.reverse();
        assert_eq!(path.signed_area(), -100.0);
        assert_eq!(path.orientation(), PathOrientation::CwConvex);
    }

    #[test]
    fn test_notched_polygon_is_concave() {
        let path = Path2::polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 3.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        assert_eq!(path.orientation(), PathOrientation::CcwConcave);
    }

    #[test]
    fn test_pentagram_is_concave() {
        let mut points = Vec::new();
        for i in 0..5 {
            let angle = std::f32::consts::FRAC_PI_2 + i as f32 * 4.0 * std::f32::consts::PI / 5.0;
            points.push(Point::new(angle.cos() * 10.0, angle.sin() * 10.0));
        }
        let path = Path2::polygon(points);
        assert!(!path.orientation().is_convex());
    }

    #[test]
    fn test_colinear() {
        let path = Path2::polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
        ]);
        assert_eq!(path.orientation(), PathOrientation::Colinear);
        assert_eq!(Path2::default().orientation(), PathOrientation::Colinear);
    }
}
