//! Recorded canvas draws

use std::sync::Arc;

use tessera_gpu::{BlendEquation, BlendFactor, BlendFunc, Texture};
use tessera_paint::{Color, DrawCommand, Gradient, Mesh, Scissor};

use crate::context::Context;

/// What a command draws and how it interacts with the stencil buffer.
///
/// `None`, `Fill` and `Text` are generic intents; recording always narrows
/// them to one of the concrete kinds below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    None,
    Fill,
    Text,

    // Single convex path, one pass
    ConvexFill,
    ConvexStencilFill,
    ConvexClipFill,
    ConvexMaskFill,

    // Stamp then cover with the bounds quad
    ConcaveFill,
    EvenOddFill,
    StencilFill,
    ClipFill,
    MaskFill,

    NormalStroke,
    /// Translucent stroke, clamped so overlaps blend once
    Stroke,
    StencilStroke,
    ClipStroke,
    MaskStroke,

    NormalText,
    StencilText,
    ClipText,
    MaskText,
}

impl CommandType {
    pub const ALL: [CommandType; 21] = [
        CommandType::None,
        CommandType::Fill,
        CommandType::Text,
        CommandType::ConvexFill,
        CommandType::ConvexStencilFill,
        CommandType::ConvexClipFill,
        CommandType::ConvexMaskFill,
        CommandType::ConcaveFill,
        CommandType::EvenOddFill,
        CommandType::StencilFill,
        CommandType::ClipFill,
        CommandType::MaskFill,
        CommandType::NormalStroke,
        CommandType::Stroke,
        CommandType::StencilStroke,
        CommandType::ClipStroke,
        CommandType::MaskStroke,
        CommandType::NormalText,
        CommandType::StencilText,
        CommandType::ClipText,
        CommandType::MaskText,
    ];

    pub fn is_fill(self) -> bool {
        matches!(
            self,
            CommandType::Fill
                | CommandType::ConvexFill
                | CommandType::ConvexStencilFill
                | CommandType::ConvexClipFill
                | CommandType::ConvexMaskFill
                | CommandType::ConcaveFill
                | CommandType::EvenOddFill
                | CommandType::StencilFill
                | CommandType::ClipFill
                | CommandType::MaskFill
        )
    }

    pub fn is_stroke(self) -> bool {
        matches!(
            self,
            CommandType::NormalStroke
                | CommandType::Stroke
                | CommandType::StencilStroke
                | CommandType::ClipStroke
                | CommandType::MaskStroke
        )
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            CommandType::Text
                | CommandType::NormalText
                | CommandType::StencilText
                | CommandType::ClipText
                | CommandType::MaskText
        )
    }
}

/// One resolved drawable unit on a page
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandType,
    pub mesh: Mesh,
    /// Antialiasing fringe; empty when the fringe width is zero
    pub border: Mesh,
    pub gradient: Option<Arc<Gradient>>,
    pub texture: Option<Arc<Texture>>,
    pub scissor: Option<Arc<Scissor>>,
    pub blur_step: f32,
    pub blend_equation: BlendEquation,
    pub src_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub dst_alpha: BlendFactor,
    /// Color baked into the mesh vertices
    pub color: Color,
}

impl Command {
    /// A command carrying the blend and scissor state of `ctx`
    pub(crate) fn new(kind: CommandType, mesh: Mesh, ctx: &Context, color: Color) -> Self {
        Self {
            kind,
            mesh,
            border: Mesh::new(DrawCommand::Triangles),
            gradient: None,
            texture: None,
            scissor: ctx.scissor.clone(),
            blur_step: 0.0,
            blend_equation: ctx.blend_equation,
            src_rgb: ctx.src_rgb,
            src_alpha: ctx.src_alpha,
            dst_rgb: ctx.dst_rgb,
            dst_alpha: ctx.dst_alpha,
            color,
        }
    }

    pub fn blend_func(&self) -> BlendFunc {
        BlendFunc {
            src_rgb: self.src_rgb,
            src_alpha: self.src_alpha,
            dst_rgb: self.dst_rgb,
            dst_alpha: self.dst_alpha,
        }
    }

    pub fn has_border(&self) -> bool {
        !self.border.is_empty()
    }
}
