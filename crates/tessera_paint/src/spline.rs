//! Spline workspace and flattening
//!
//! A [`Spline`] is one subpath under construction: an anchor point followed
//! by line, quadratic and cubic segments. Arcs are converted to quadratic
//! segments as they are added. [`Spline::flatten`] turns the spline into a
//! [`Path2`] using lyon's flattening iterator.

use lyon::geom::Arc;
use lyon::math::{point, vector, Angle};
use lyon::path::iterator::PathIterator;
use lyon::path::PathEvent;
use smallvec::SmallVec;

use crate::geometry::Point;
use crate::path::{Path2, POINT_EPSILON};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Segment {
    Line(Point),
    Quad { ctrl: Point, to: Point },
    Cubic { ctrl1: Point, ctrl2: Point, to: Point },
}

/// A subpath being authored
#[derive(Clone, Debug, Default)]
pub struct Spline {
    start: Option<Point>,
    current: Point,
    segments: SmallVec<[Segment; 16]>,
    closed: bool,
}

impl Spline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything and anchor a new subpath at `p`
    pub fn anchor(&mut self, p: Point) {
        self.start = Some(p);
        self.current = p;
        self.segments.clear();
        self.closed = false;
    }

    /// Discard everything, leaving no anchor
    pub fn reset(&mut self) {
        self.start = None;
        self.current = Point::ZERO;
        self.segments.clear();
        self.closed = false;
    }

    /// True once an anchor has been set
    pub fn is_anchored(&self) -> bool {
        self.start.is_some()
    }

    /// True if no segment has been added after the anchor
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn current_point(&self) -> Point {
        self.current
    }

    pub fn start_point(&self) -> Option<Point> {
        self.start
    }

    pub fn close(&mut self) {
        self.closed = true;
        if let Some(start) = self.start {
            self.current = start;
        }
    }

    pub fn line_to(&mut self, to: Point) {
        self.segments.push(Segment::Line(to));
        self.current = to;
    }

    pub fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.segments.push(Segment::Quad { ctrl, to });
        self.current = to;
    }

    pub fn bezier_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point) {
        self.segments.push(Segment::Cubic { ctrl1, ctrl2, to });
        self.current = to;
    }

    /// Circular arc around `center`, counter-clockwise for positive `sweep`.
    ///
    /// A line joins the current point to the start of the arc.
    pub fn arc(&mut self, center: Point, radius: f32, start_angle: f32, sweep: f32) {
        let arc = Arc {
            center: point(center.x, center.y),
            radii: vector(radius, radius),
            start_angle: Angle::radians(start_angle),
            sweep_angle: Angle::radians(sweep),
            x_rotation: Angle::radians(0.0),
        };
        let from = arc.from();
        self.line_to(Point::new(from.x, from.y));
        let mut quads = SmallVec::<[Segment; 8]>::new();
        arc.for_each_quadratic_bezier(&mut |q| {
            quads.push(Segment::Quad {
                ctrl: Point::new(q.ctrl.x, q.ctrl.y),
                to: Point::new(q.to.x, q.to.y),
            });
        });
        for q in quads {
            if let Segment::Quad { ctrl, to } = q {
                self.quad_to(ctrl, to);
            }
        }
    }

    /// Arc of `radius` tangent to the lines current→`corner` and `corner`→`to`.
    ///
    /// Degenerate input (zero radius, coincident or colinear points) becomes a
    /// straight line to `corner`.
    pub fn arc_to(&mut self, corner: Point, to: Point, radius: f32) {
        let d0 = (self.current - corner).normalize();
        let d1 = (to - corner).normalize();
        if radius <= f32::EPSILON
            || d0 == Point::ZERO
            || d1 == Point::ZERO
            || d0.cross(d1).abs() < 1e-5
        {
            self.line_to(corner);
            return;
        }

        let half = d0.dot(d1).clamp(-1.0, 1.0).acos() * 0.5;
        let tangent_dist = radius / half.tan();
        let t0 = corner + d0 * tangent_dist;
        let t1 = corner + d1 * tangent_dist;
        let center = corner + (d0 + d1).normalize() * (radius / half.sin());

        let a0 = (t0.y - center.y).atan2(t0.x - center.x);
        let a1 = (t1.y - center.y).atan2(t1.x - center.x);
        let mut sweep = a1 - a0;
        if sweep > std::f32::consts::PI {
            sweep -= std::f32::consts::TAU;
        } else if sweep < -std::f32::consts::PI {
            sweep += std::f32::consts::TAU;
        }
        self.arc(center, radius, a0, sweep);
    }

    fn to_lyon(&self) -> Option<lyon::path::Path> {
        let start = self.start?;
        let mut builder = lyon::path::Path::builder();
        builder.begin(point(start.x, start.y));
        for seg in &self.segments {
            match *seg {
                Segment::Line(p) => {
                    builder.line_to(point(p.x, p.y));
                }
                Segment::Quad { ctrl, to } => {
                    builder.quadratic_bezier_to(point(ctrl.x, ctrl.y), point(to.x, to.y));
                }
                Segment::Cubic { ctrl1, ctrl2, to } => {
                    builder.cubic_bezier_to(
                        point(ctrl1.x, ctrl1.y),
                        point(ctrl2.x, ctrl2.y),
                        point(to.x, to.y),
                    );
                }
            }
        }
        builder.end(self.closed);
        Some(builder.build())
    }

    /// Flatten into a polyline within `tolerance` of the curves
    pub fn flatten(&self, tolerance: f32) -> Path2 {
        let Some(path) = self.to_lyon() else {
            return Path2::default();
        };
        let mut points = Vec::with_capacity(self.segments.len() + 1);
        for event in path.iter().flattened(tolerance) {
            match event {
                PathEvent::Begin { at } => points.push(Point::new(at.x, at.y)),
                PathEvent::Line { to, .. } => points.push(Point::new(to.x, to.y)),
                _ => {}
            }
        }
        points.dedup_by(|a, b| a.distance(*b) <= POINT_EPSILON);
        if self.closed
            && points.len() > 1
            && points[0].distance(points[points.len() - 1]) <= POINT_EPSILON
        {
            points.pop();
        }
        Path2::new(points, self.closed)
    }
}
