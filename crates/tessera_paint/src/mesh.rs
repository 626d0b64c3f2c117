//! Meshes and the batch vertex layout

use crate::color::Color;
use crate::geometry::{Affine, Point, Rect};

/// A vertex as stored in the batch buffers.
///
/// Memory layout (matches the sprite shader's vertex input):
/// - `position`: `vec2<f32>` (8 bytes)
/// - `color`: `unorm8x4` packed RGBA (4 bytes)
/// - `texcoord`: `vec2<f32>` (8 bytes)
/// - `gradcoord`: `vec2<f32>` (8 bytes)
/// Total: 28 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: u32,
    pub texcoord: [f32; 2],
    pub gradcoord: [f32; 2],
}

impl Vertex {
    pub fn new(position: Point, color: Color) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_packed(),
            texcoord: [0.0; 2],
            gradcoord: [0.0; 2],
        }
    }

    pub fn point(&self) -> Point {
        Point::from(self.position)
    }
}

/// Primitive topology of a mesh
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawCommand {
    #[default]
    Triangles,
    Lines,
    /// One or more fans; see [`Mesh::fans`]
    TriangleFan,
}

impl DrawCommand {
    /// Number of indices per primitive
    pub fn chunk_size(self) -> usize {
        match self {
            DrawCommand::Triangles => 3,
            DrawCommand::Lines => 2,
            DrawCommand::TriangleFan => 1,
        }
    }
}

/// Vertices plus indices with a topology.
///
/// Indices only reference vertices already in the mesh, so a mesh can be
/// sliced at any primitive boundary. For [`DrawCommand::TriangleFan`] the
/// `fans` list holds the exclusive end offset of each fan in `indices`; the
/// first index of every fan is its pivot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub command: DrawCommand,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub fans: Vec<u32>,
}

impl Mesh {
    pub fn new(command: DrawCommand) -> Self {
        Self {
            command,
            ..Default::default()
        }
    }

    pub fn with_capacity(command: DrawCommand, vertices: usize, indices: usize) -> Self {
        Self {
            command,
            vertices: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
            fans: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.fans.clear();
    }

    /// Append a fan over `points`, pivoting on the first
    pub fn push_fan(&mut self, points: &[Point], color: Color) {
        debug_assert_eq!(self.command, DrawCommand::TriangleFan);
        let base = self.vertices.len() as u32;
        for (i, p) in points.iter().enumerate() {
            self.vertices.push(Vertex::new(*p, color));
            self.indices.push(base + i as u32);
        }
        self.fans.push(self.indices.len() as u32);
    }

    /// Append another mesh of the same topology, rebasing its indices
    pub fn append(&mut self, other: &Mesh) {
        assert_eq!(
            self.command, other.command,
            "cannot append meshes of different topology"
        );
        let base = self.vertices.len() as u32;
        let offset = self.indices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        self.fans.extend(other.fans.iter().map(|f| f + offset));
    }

    pub fn transform(&mut self, t: &Affine) {
        for v in &mut self.vertices {
            v.position = t.transform_point(v.point()).to_array();
        }
    }

    pub fn set_color(&mut self, color: Color) {
        let packed = color.to_packed();
        for v in &mut self.vertices {
            v.color = packed;
        }
    }

    pub fn bounds(&self) -> Rect {
        let points: Vec<Point> = self.vertices.iter().map(Vertex::point).collect();
        Rect::from_points(&points).unwrap_or_default()
    }

    /// Index ranges of each fan
    pub fn fan_ranges(&self) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
        let starts = std::iter::once(0).chain(self.fans.iter().map(|&f| f as usize));
        starts
            .zip(self.fans.iter().map(|&f| f as usize))
            .map(|(s, e)| s..e)
    }

    /// Split off the last fan: `(everything before, last fan)`.
    ///
    /// Each half keeps only the vertices its own indices reference.
    pub fn split_last_fan(&self) -> (Mesh, Mesh) {
        let Some(&end) = self.fans.last() else {
            return (self.clone(), Mesh::new(self.command));
        };
        debug_assert_eq!(end as usize, self.indices.len());
        let start = if self.fans.len() > 1 {
            self.fans[self.fans.len() - 2]
        } else {
            0
        };
        let head = self.select(
            &self.indices[..start as usize],
            self.fans[..self.fans.len() - 1].to_vec(),
        );
        let tail = self.select(&self.indices[start as usize..], vec![end - start]);
        (head, tail)
    }

    /// True if every vertex is referenced by some index
    pub fn is_compact(&self) -> bool {
        let mut used = vec![false; self.vertices.len()];
        let mut count = 0;
        for &i in &self.indices {
            if let Some(seen) = used.get_mut(i as usize) {
                if !*seen {
                    *seen = true;
                    count += 1;
                }
            }
        }
        count == self.vertices.len()
    }

    /// Copy holding only referenced vertices, in first-use order
    pub fn compacted(&self) -> Mesh {
        self.select(&self.indices, self.fans.clone())
    }

    fn select(&self, indices: &[u32], fans: Vec<u32>) -> Mesh {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut vertices = Vec::new();
        let indices = indices
            .iter()
            .map(|&i| {
                let slot = &mut remap[i as usize];
                if *slot == u32::MAX {
                    *slot = vertices.len() as u32;
                    vertices.push(self.vertices[i as usize]);
                }
                *slot
            })
            .collect();
        Mesh {
            command: self.command,
            vertices,
            indices,
            fans,
        }
    }

    /// Expand fans into a triangle list; other topologies are returned as-is
    pub fn to_triangles(&self) -> Mesh {
        if self.command != DrawCommand::TriangleFan {
            return self.clone();
        }
        let mut out = Mesh::with_capacity(
            DrawCommand::Triangles,
            self.vertices.len(),
            self.indices.len().saturating_sub(2 * self.fans.len()) * 3,
        );
        out.vertices.extend_from_slice(&self.vertices);
        for range in self.fan_ranges() {
            let fan = &self.indices[range];
            if fan.len() < 3 {
                continue;
            }
            let pivot = fan[0];
            for pair in fan[1..].windows(2) {
                out.indices.extend_from_slice(&[pivot, pair[0], pair[1]]);
            }
        }
        out
    }

    /// Assert the topology invariants.
    ///
    /// # Panics
    ///
    /// Panics if the index count does not match the topology stride, an index
    /// is out of range, or the fan list does not cover the indices.
    pub fn validate(&self) {
        let chunk = self.command.chunk_size();
        assert!(
            self.indices.len() % chunk == 0,
            "mesh has {} indices, not a multiple of {} for {:?}",
            self.indices.len(),
            chunk,
            self.command
        );
        let count = self.vertices.len() as u32;
        assert!(
            self.indices.iter().all(|&i| i < count),
            "mesh index out of range"
        );
        if self.command == DrawCommand::TriangleFan {
            assert!(
                self.fans.windows(2).all(|w| w[0] <= w[1])
                    && self.fans.last().copied().unwrap_or(0) as usize == self.indices.len(),
                "fan terminators do not cover the index list"
            );
        }
    }
}

/// A triangulated polygon
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Poly {
    pub points: Vec<Point>,
    /// Triangle list over `points`
    pub indices: Vec<u32>,
}

impl Poly {
    pub fn new(points: Vec<Point>, indices: Vec<u32>) -> Self {
        Self { points, indices }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            points: rect.corners().to_vec(),
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_points(&self.points).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> [Point; 4] {
        Rect::new(0.0, 0.0, 10.0, 10.0).corners()
    }

    #[test]
    fn test_vertex_layout_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 28);
    }

    #[test]
    fn test_single_fan() {
        let mut mesh = Mesh::new(DrawCommand::TriangleFan);
        mesh.push_fan(&quad(), Color::RED);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3]);
        assert_eq!(mesh.fans, vec![4]);
        mesh.validate();

        let tris = mesh.to_triangles();
        assert_eq!(tris.command, DrawCommand::Triangles);
        assert_eq!(tris.indices, vec![0, 1, 2, 0, 2, 3]);
        tris.validate();
    }

    #[test]
    fn test_append_rebases_fans() {
        let mut a = Mesh::new(DrawCommand::TriangleFan);
        a.push_fan(&quad(), Color::RED);
        let mut b = Mesh::new(DrawCommand::TriangleFan);
        b.push_fan(&quad()[..3], Color::BLUE);
        a.append(&b);
        assert_eq!(a.indices, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(a.fans, vec![4, 7]);
        assert_eq!(a.to_triangles().indices.len(), 9);
    }

    #[test]
    fn test_split_last_fan() {
        let mut mesh = Mesh::new(DrawCommand::TriangleFan);
        mesh.push_fan(&quad(), Color::RED);
        mesh.push_fan(&quad(), Color::RED);
        let bounds = [
            Point::new(-1.0, -1.0),
            Point::new(2.0, -1.0),
            Point::new(2.0, 2.0),
            Point::new(-1.0, 2.0),
        ];
        mesh.push_fan(&bounds, Color::BLUE);
        let (head, tail) = mesh.split_last_fan();
        assert_eq!(head.vertices.len(), 8);
        assert_eq!(head.indices, (0..8).collect::<Vec<u32>>());
        assert_eq!(head.fans, vec![4, 8]);
        assert_eq!(tail.vertices.len(), 4);
        assert_eq!(tail.indices, vec![0, 1, 2, 3]);
        assert_eq!(tail.fans, vec![4]);
        assert_eq!(tail.vertices[0].position, [-1.0, -1.0]);
        assert!(head.is_compact() && tail.is_compact());
        tail.validate();
    }

    #[test]
    fn test_compacted_drops_unreferenced_vertices() {
        let mut mesh = Mesh::new(DrawCommand::Triangles);
        mesh.vertices = quad().iter().map(|p| Vertex::new(*p, Color::RED)).collect();
        mesh.indices = vec![3, 1, 2];
        assert!(!mesh.is_compact());
        let compact = mesh.compacted();
        assert_eq!(compact.indices, vec![0, 1, 2]);
        assert_eq!(compact.vertices[0], mesh.vertices[3]);
        assert_eq!(compact.vertices.len(), 3);
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn test_validate_rejects_partial_triangle() {
        let mut mesh = Mesh::new(DrawCommand::Triangles);
        mesh.vertices = vec![Vertex::default(); 3];
        mesh.indices = vec![0, 1];
        mesh.validate();
    }
}
