//! Tessera canvas
//!
//! Retained vector drawing on top of [`tessera_gpu::SpriteBatch`].
//!
//! A [`CanvasNode`] owns a list of [`Page`]s. Authoring calls (paths, shape
//! factories, fills, strokes, text) go to the edit page, where each drawing
//! call is tessellated right away into a [`Command`]. Drawing replays the
//! draw page's commands through the compositor, which picks the stencil
//! passes each command needs.
//!
//! ```ignore
//! let mut node = CanvasNode::new(1);
//! let page = node.editor();
//! page.begin_path();
//! page.draw_circle(Point::new(50.0, 50.0), 40.0);
//! page.set_fill_color(Color::RED);
//! page.fill_paths();
//!
//! batch.begin();
//! node.draw(&mut batch, &Affine::IDENTITY, Color::WHITE);
//! batch.end();
//! ```

pub mod command;
pub mod compositor;
pub mod context;
pub mod node;
pub mod page;
pub mod paint;

pub use command::{Command, CommandType};
pub use compositor::{draw_command, Cover, Recipe};
pub use context::{Context, FillRule, Winding};
pub use node::CanvasNode;
pub use page::Page;
pub use paint::{Paint, PaintKind};
