//! Tessera paint primitives
//!
//! Value types and CPU-side geometry shared by the batcher and the canvas.
//!
//! # Contents
//!
//! - Colors with packed RGBA conversion
//! - Points, rects, affine transforms and projection matrices
//! - Flattened paths with orientation classification
//! - Meshes (triangles, lines, triangle fans) and the batch vertex layout
//! - Gradients and scissors in the nanovg style
//! - Spline flattening and lyon-backed fill/stroke tessellation
//!
//! Canvas space is y-up. Texture space has its origin at the top left.

pub mod color;
pub mod geometry;
pub mod gradient;
pub mod mesh;
pub mod path;
pub mod spline;
pub mod tessellate;

pub use color::Color;
pub use geometry::{Affine, Mat4, Point, Rect, Size, Vec2};
pub use gradient::{Gradient, Scissor};
pub use mesh::{DrawCommand, Mesh, Poly, Vertex};
pub use path::{Path2, PathOrientation};
pub use spline::Spline;
pub use tessellate::{LineCap, LineJoin, StrokeStyle, TessellationOptions};
