//! Path tessellation
//!
//! Converts flattened paths into meshes. Fills and strokes go through lyon;
//! antialiasing fringes and outlines are generated directly.

use lyon::lyon_tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, StrokeOptions,
    StrokeTessellator, StrokeVertex, VertexBuffers,
};
use lyon::math::point;

use crate::color::Color;
use crate::geometry::Point;
use crate::mesh::{DrawCommand, Mesh, Vertex};
use crate::path::Path2;

/// Longest miter extension of a fringe vertex, as a multiple of the offset
const FRINGE_MITER_LIMIT: f32 = 4.0;

/// Shared tessellation parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TessellationOptions {
    /// Maximum distance between a curve and its flattened approximation
    pub tolerance: f32,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self { tolerance: 0.25 }
    }
}

/// Shape at the ends of an open stroke
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Shape where two stroke segments meet
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Stroke extrusion parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub join: LineJoin,
    pub cap: LineCap,
    pub miter_limit: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            join: LineJoin::Miter,
            cap: LineCap::Butt,
            miter_limit: 10.0,
        }
    }
}

fn to_lyon(path: &Path2) -> Option<lyon::path::Path> {
    let (first, rest) = path.points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut builder = lyon::path::Path::builder();
    builder.begin(point(first.x, first.y));
    for p in rest {
        builder.line_to(point(p.x, p.y));
    }
    builder.end(path.closed);
    Some(builder.build())
}

fn geometry_to_mesh(geometry: VertexBuffers<Vertex, u32>) -> Mesh {
    Mesh {
        command: DrawCommand::Triangles,
        vertices: geometry.vertices,
        indices: geometry.indices,
        fans: Vec::new(),
    }
}

/// Triangulate the interior of a path (non-zero rule)
pub fn fill_path(path: &Path2, color: Color, options: &TessellationOptions) -> Mesh {
    let Some(lyon_path) = to_lyon(path) else {
        return Mesh::new(DrawCommand::Triangles);
    };

    let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    let fill_options = FillOptions::default()
        .with_tolerance(options.tolerance)
        .with_fill_rule(FillRule::NonZero);

    let result = tessellator.tessellate_path(
        &lyon_path,
        &fill_options,
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
            Vertex::new(Point::from(vertex.position().to_array()), color)
        }),
    );

    if let Err(err) = result {
        tracing::warn!("Path fill tessellation failed: {:?}", err);
        return Mesh::new(DrawCommand::Triangles);
    }

    geometry_to_mesh(geometry)
}

/// Extrude a path into a triangulated stroke ribbon
pub fn stroke_path(
    path: &Path2,
    style: &StrokeStyle,
    color: Color,
    options: &TessellationOptions,
) -> Mesh {
    let Some(lyon_path) = to_lyon(path) else {
        return Mesh::new(DrawCommand::Triangles);
    };

    let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
    let mut tessellator = StrokeTessellator::new();

    let stroke_options = StrokeOptions::default()
        .with_tolerance(options.tolerance)
        .with_line_width(style.width)
        .with_line_cap(match style.cap {
            LineCap::Butt => lyon::lyon_tessellation::LineCap::Butt,
            LineCap::Round => lyon::lyon_tessellation::LineCap::Round,
            LineCap::Square => lyon::lyon_tessellation::LineCap::Square,
        })
        .with_line_join(match style.join {
            LineJoin::Miter => lyon::lyon_tessellation::LineJoin::Miter,
            LineJoin::Round => lyon::lyon_tessellation::LineJoin::Round,
            LineJoin::Bevel => lyon::lyon_tessellation::LineJoin::Bevel,
        })
        .with_miter_limit(style.miter_limit.max(StrokeOptions::MINIMUM_MITER_LIMIT));

    let result = tessellator.tessellate_path(
        &lyon_path,
        &stroke_options,
        &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| {
            Vertex::new(Point::from(vertex.position().to_array()), color)
        }),
    );

    if let Err(err) = result {
        tracing::warn!("Path stroke tessellation failed: {:?}", err);
        return Mesh::new(DrawCommand::Triangles);
    }

    geometry_to_mesh(geometry)
}

/// Line-list mesh tracing the path
pub fn outline_path(points: &[Point], closed: bool, color: Color) -> Mesh {
    let mut mesh = Mesh::with_capacity(DrawCommand::Lines, points.len(), points.len() * 2);
    if points.len() < 2 {
        return mesh;
    }
    mesh.vertices
        .extend(points.iter().map(|p| Vertex::new(*p, color)));
    let n = points.len() as u32;
    for i in 0..n - 1 {
        mesh.indices.extend_from_slice(&[i, i + 1]);
    }
    if closed && n > 2 {
        mesh.indices.extend_from_slice(&[n - 1, 0]);
    }
    mesh
}

/// Drop consecutive duplicates (and a closing duplicate of the first point)
fn dedup_points(points: &[Point], closed: bool) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |q| q.distance(*p) > 1e-5) {
            out.push(*p);
        }
    }
    if closed && out.len() > 1 && out[0].distance(out[out.len() - 1]) <= 1e-5 {
        out.pop();
    }
    out
}

/// Offset direction at each vertex: the mitered average of the adjacent
/// clockwise edge normals, which point outward for counter-clockwise paths.
fn vertex_normals(points: &[Point], closed: bool) -> Vec<Point> {
    let n = points.len();
    let edge_normal = |a: Point, b: Point| (b - a).normalize().perp_cw();
    (0..n)
        .map(|i| {
            let before = if i > 0 {
                Some(edge_normal(points[i - 1], points[i]))
            } else if closed {
                Some(edge_normal(points[n - 1], points[0]))
            } else {
                None
            };
            let after = if i + 1 < n {
                Some(edge_normal(points[i], points[i + 1]))
            } else if closed {
                Some(edge_normal(points[n - 1], points[0]))
            } else {
                None
            };
            match (before, after) {
                (Some(n0), Some(n1)) => {
                    let m = (n0 + n1).normalize();
                    let cos = m.dot(n0).max(1.0 / FRINGE_MITER_LIMIT);
                    if m == Point::ZERO {
                        n0
                    } else {
                        m * (1.0 / cos)
                    }
                }
                (Some(n0), None) => n0,
                (None, Some(n1)) => n1,
                (None, None) => Point::ZERO,
            }
        })
        .collect()
}

/// Build an antialiasing ribbon along a path.
///
/// The ribbon spans from offset `near` (colored `near_color`) to offset `far`
/// (colored `far_color`) along the vertex normals scaled by `side`. With
/// `side = 1.0` positive offsets point outward for counter-clockwise paths.
pub fn fringe_ribbon(
    points: &[Point],
    closed: bool,
    side: f32,
    near: f32,
    far: f32,
    near_color: Color,
    far_color: Color,
) -> Mesh {
    let points = dedup_points(points, closed);
    let n = points.len();
    let mut mesh = Mesh::with_capacity(DrawCommand::Triangles, n * 2, n * 6);
    if n < 2 {
        return mesh;
    }

    let normals = vertex_normals(&points, closed);
    for (p, normal) in points.iter().zip(&normals) {
        let dir = *normal * side;
        mesh.vertices.push(Vertex::new(*p + dir * near, near_color));
        mesh.vertices.push(Vertex::new(*p + dir * far, far_color));
    }

    let segments = if closed { n } else { n - 1 };
    for i in 0..segments {
        let j = (i + 1) % n;
        let (ni, fi) = (2 * i as u32, 2 * i as u32 + 1);
        let (nj, fj) = (2 * j as u32, 2 * j as u32 + 1);
        mesh.indices.extend_from_slice(&[ni, fi, fj, ni, fj, nj]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn square() -> Path2 {
        Path2::polygon(Rect::new(0.0, 0.0, 100.0, 100.0).corners().to_vec())
    }

    #[test]
    fn test_fill_square() {
        let mesh = fill_path(&square(), Color::RED, &TessellationOptions::default());
        assert!(!mesh.is_empty());
        assert_eq!(mesh.indices.len(), 6);
        mesh.validate();
        assert!(mesh.vertices.iter().all(|v| v.color == Color::RED.to_packed()));
    }

    #[test]
    fn test_stroke_open_line() {
        let path = Path2::new(vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)], false);
        let style = StrokeStyle {
            width: 3.0,
            ..Default::default()
        };
        let mesh = stroke_path(&path, &style, Color::BLACK, &TessellationOptions::default());
        assert!(!mesh.is_empty());
        mesh.validate();
    }

    #[test]
    fn test_degenerate_paths_are_empty() {
        let single = Path2::new(vec![Point::new(1.0, 1.0)], false);
        let opts = TessellationOptions::default();
        assert!(fill_path(&single, Color::RED, &opts).is_empty());
        assert!(stroke_path(&single, &StrokeStyle::default(), Color::RED, &opts).is_empty());
    }

    #[test]
    fn test_fringe_ribbon_offsets_outward() {
        let path = square();
        let mesh = fringe_ribbon(
            &path.points,
            true,
            1.0,
            -0.5,
            0.5,
            Color::RED,
            Color::RED.with_alpha(0.0),
        );
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 24);
        mesh.validate();

        // Outer vertex of the bottom-left corner is pushed out diagonally.
        let outer = mesh.vertices[1].point();
        assert!(outer.x < 0.0 && outer.y < 0.0);
        assert_eq!(Color::from_packed(mesh.vertices[1].color).a, 0.0);
        let inner = mesh.vertices[0].point();
        assert!(inner.x > 0.0 && inner.y > 0.0);
    }

    #[test]
    fn test_outline_closes_loop() {
        let mesh = outline_path(&square().points, true, Color::WHITE);
        assert_eq!(mesh.command, DrawCommand::Lines);
        assert_eq!(mesh.indices, vec![0, 1, 1, 2, 2, 3, 3, 0]);
    }
}
