//! Shapes the batch can fill or outline

use tessera_paint::tessellate::{fill_path, outline_path};
use tessera_paint::{Color, DrawCommand, Mesh, Path2, Poly, Rect, TessellationOptions, Vertex};

/// Geometry that [`crate::SpriteBatch::fill`] and [`crate::SpriteBatch::outline`] accept
pub trait BatchShape {
    /// Triangle-list interior
    fn fill_mesh(&self, color: Color) -> Mesh;

    /// Line-list boundary
    fn outline_mesh(&self, color: Color) -> Mesh;

    /// Bounds used to derive texture and gradient coordinates
    fn local_bounds(&self) -> Rect;
}

impl BatchShape for Rect {
    fn fill_mesh(&self, color: Color) -> Mesh {
        let mut mesh = Mesh::with_capacity(DrawCommand::Triangles, 4, 6);
        mesh.vertices
            .extend(self.corners().iter().map(|p| Vertex::new(*p, color)));
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        mesh
    }

    fn outline_mesh(&self, color: Color) -> Mesh {
        outline_path(&self.corners(), true, color)
    }

    fn local_bounds(&self) -> Rect {
        *self
    }
}

impl BatchShape for Poly {
    fn fill_mesh(&self, color: Color) -> Mesh {
        Mesh {
            command: DrawCommand::Triangles,
            vertices: self.points.iter().map(|p| Vertex::new(*p, color)).collect(),
            indices: self.indices.clone(),
            fans: Vec::new(),
        }
    }

    fn outline_mesh(&self, color: Color) -> Mesh {
        outline_path(&self.points, true, color)
    }

    fn local_bounds(&self) -> Rect {
        self.bounds()
    }
}

impl BatchShape for Path2 {
    fn fill_mesh(&self, color: Color) -> Mesh {
        fill_path(self, color, &TessellationOptions::default())
    }

    fn outline_mesh(&self, color: Color) -> Mesh {
        outline_path(&self.points, self.closed, color)
    }

    fn local_bounds(&self) -> Rect {
        self.bounds()
    }
}

/// Set texture and gradient coordinates from each vertex's position in `bounds`.
///
/// Texture coordinates flip y to the top-left texture origin; gradient
/// coordinates stay in canvas orientation.
pub fn apply_shape_coords(mesh: &mut Mesh, bounds: Rect) {
    let w = if bounds.width().abs() > f32::EPSILON { bounds.width() } else { 1.0 };
    let h = if bounds.height().abs() > f32::EPSILON { bounds.height() } else { 1.0 };
    for v in &mut mesh.vertices {
        let fx = (v.position[0] - bounds.x()) / w;
        let fy = (v.position[1] - bounds.y()) / h;
        v.texcoord = [fx, 1.0 - fy];
        v.gradcoord = [fx, fy];
    }
}
