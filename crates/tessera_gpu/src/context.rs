//! Draw contexts and dirty-bit tracking

use std::sync::Arc;

use tessera_paint::{DrawCommand, Mat4};

use crate::blend::{BlendEquation, BlendFunc};
use crate::device::Texture;
use crate::stencil::StencilEffect;

bitflags::bitflags! {
    /// Shader features active for a draw, sent as the `u_type` uniform
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DrawType: u32 {
        const TEXTURE = 1;
        const GRADIENT = 1 << 1;
        const SCISSOR = 1 << 2;
        const BLUR = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Fields of a [`DrawContext`] that differ from the context before it
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Dirty: u32 {
        const BLEND_EQUATION = 1;
        const BLEND_FUNC = 1 << 1;
        const DRAW_TYPE = 1 << 2;
        const DEPTH = 1 << 3;
        const PERSPECTIVE = 1 << 4;
        const TEXTURE = 1 << 5;
        const UNIFORM_BLOCK = 1 << 6;
        const BLUR = 1 << 7;
        const STENCIL_CLEAR = 1 << 8;
        const STENCIL_EFFECT = 1 << 9;
        const COMMAND = 1 << 10;
        const ALL = Self::BLEND_EQUATION.bits()
            | Self::BLEND_FUNC.bits()
            | Self::DRAW_TYPE.bits()
            | Self::DEPTH.bits()
            | Self::PERSPECTIVE.bits()
            | Self::TEXTURE.bits()
            | Self::UNIFORM_BLOCK.bits()
            | Self::BLUR.bits()
            | Self::STENCIL_CLEAR.bits()
            | Self::STENCIL_EFFECT.bits()
            | Self::COMMAND.bits();
    }
}

/// Pipeline state for one contiguous index range of a flush.
///
/// The batch mutates the current context freely and pushes a copy into its
/// history whenever a setter changes state while indices are pending.
#[derive(Clone, Debug)]
pub struct DrawContext {
    /// First index of the range
    pub first: usize,
    /// One past the last index of the range
    pub last: usize,
    pub draw_type: DrawType,
    pub command: DrawCommand,
    pub blend_equation: BlendEquation,
    pub blend_func: BlendFunc,
    /// Stencil bits to clear before drawing the range
    pub cleared: u8,
    pub stencil: StencilEffect,
    pub perspective: Arc<Mat4>,
    pub texture: Option<Arc<Texture>>,
    pub depth: f32,
    pub blur: f32,
    /// Uniform block read by the range, if any
    pub blockptr: Option<usize>,
    pub dirty: Dirty,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            first: 0,
            last: 0,
            draw_type: DrawType::empty(),
            command: DrawCommand::Triangles,
            blend_equation: BlendEquation::Add,
            blend_func: BlendFunc::SOURCE_OVER,
            cleared: 0,
            stencil: StencilEffect::None,
            perspective: Arc::new(Mat4::IDENTITY),
            texture: None,
            depth: 0.0,
            blur: 0.0,
            blockptr: None,
            dirty: Dirty::ALL,
        }
    }
}

impl DrawContext {
    /// Number of indices covered
    pub fn count(&self) -> usize {
        self.last.saturating_sub(self.first)
    }

    /// A copy that starts where this context ends, with nothing dirty
    pub fn successor(&self) -> DrawContext {
        DrawContext {
            first: self.last,
            last: self.last,
            cleared: 0,
            dirty: Dirty::empty(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_starts_clean() {
        let mut ctx = DrawContext {
            first: 3,
            last: 12,
            cleared: 0xFF,
            ..Default::default()
        };
        ctx.depth = 2.0;
        let next = ctx.successor();
        assert_eq!((next.first, next.last), (12, 12));
        assert_eq!(next.count(), 0);
        assert!(next.dirty.is_empty());
        assert_eq!(next.cleared, 0);
        assert_eq!(next.depth, 2.0);
    }

    #[test]
    fn test_all_covers_every_bit() {
        assert_eq!(Dirty::ALL, Dirty::all());
    }
}
