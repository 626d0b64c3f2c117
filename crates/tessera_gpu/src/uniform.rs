//! Gradient/scissor uniform blocks

use tessera_paint::{Affine, Gradient, Scissor};

/// One gradient plus one scissor, as read by the sprite shader.
///
/// Memory layout (WGSL uniform rules, 16-byte aligned):
/// - `grad_matrix`: `mat3x4<f32>` shape space to gradient space (48 bytes)
/// - `grad_inner`, `grad_outer`: `vec4<f32>` colors (32 bytes)
/// - `grad_params`: `[extent.x, extent.y, radius, feather]` (16 bytes)
/// - `scissor_matrix`: `mat3x4<f32>` world space to scissor space (48 bytes)
/// - `scissor_params`: `[half_w, half_h, scale_x, scale_y]` (16 bytes)
/// Total: 160 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformBlock {
    pub grad_matrix: [[f32; 4]; 3],
    pub grad_inner: [f32; 4],
    pub grad_outer: [f32; 4],
    pub grad_params: [f32; 4],
    pub scissor_matrix: [[f32; 4]; 3],
    pub scissor_params: [f32; 4],
}

impl Default for UniformBlock {
    fn default() -> Self {
        let identity = Affine::IDENTITY.to_padded_columns();
        Self {
            grad_matrix: identity,
            grad_inner: [1.0; 4],
            grad_outer: [1.0; 4],
            grad_params: [0.0, 0.0, 0.0, 1.0],
            scissor_matrix: identity,
            // Half extents of -1 disable the scissor test in the shader
            scissor_params: [-1.0, -1.0, 1.0, 1.0],
        }
    }
}

impl UniformBlock {
    pub fn compose(gradient: Option<&Gradient>, scissor: Option<&Scissor>) -> Self {
        let mut block = Self::default();
        if let Some(g) = gradient {
            block.grad_matrix = g.inverse_columns();
            block.grad_inner = g.inner.to_array();
            block.grad_outer = g.outer.to_array();
            block.grad_params = g.params();
        }
        if let Some(s) = scissor {
            block.scissor_matrix = s.inverse_columns();
            block.scissor_params = s.params();
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_paint::{Color, Point, Rect};

    #[test]
    fn test_block_size() {
        assert_eq!(std::mem::size_of::<UniformBlock>(), 160);
    }

    #[test]
    fn test_compose() {
        let g = Gradient::radial(Point::ZERO, 1.0, 2.0, Color::RED, Color::BLUE);
        let s = Scissor::new(Rect::new(0.0, 0.0, 20.0, 10.0));
        let block = UniformBlock::compose(Some(&g), Some(&s));
        assert_eq!(block.grad_inner, Color::RED.to_array());
        assert_eq!(block.scissor_params[0], 10.0);
        assert_eq!(block.scissor_params[1], 5.0);

        let plain = UniformBlock::compose(None, None);
        assert_eq!(plain, UniformBlock::default());
    }
}
