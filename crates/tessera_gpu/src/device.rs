//! GPU binding layer
//!
//! [`RenderDevice`] is the immediate-mode surface the batcher drives: bind a
//! shader, set named uniforms, load vertex/index/uniform-block data, change
//! blend and stencil state, and issue indexed draws. Resource handles
//! ([`Texture`], [`Shader`]) are plain values so the batch and canvas can be
//! exercised against [`crate::RecordingDevice`] as well as [`crate::WgpuDevice`].

use std::borrow::Cow;
use std::sync::Arc;

use tessera_paint::{DrawCommand, Mat4, Vertex};

use crate::blend::{BlendEquation, BlendFunc, ColorMask};
use crate::error::Result;
use crate::stencil::StencilState;
use crate::uniform::UniformBlock;

/// Identity of a GPU texture object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// The GPU object behind one or more [`Texture`] regions
#[derive(Debug, PartialEq, Eq)]
pub struct TextureBacking {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

/// A bindable texture region.
///
/// Sub-textures share their parent's backing, so two regions of one atlas
/// page compare equal under [`Texture::buffer`] and can be batched together.
#[derive(Clone, Debug)]
pub struct Texture {
    backing: Arc<TextureBacking>,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.backing.id == other.backing.id
            && (self.x, self.y, self.width, self.height)
                == (other.x, other.y, other.width, other.height)
    }
}

impl Texture {
    /// A texture covering the whole backing
    pub fn new(id: TextureId, width: u32, height: u32) -> Self {
        Self {
            backing: Arc::new(TextureBacking { id, width, height }),
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// A region of the backing in pixels (top-left origin), clamped to its size
    pub fn sub_texture(&self, x: u32, y: u32, width: u32, height: u32) -> Texture {
        let bw = self.backing.width;
        let bh = self.backing.height;
        let x = x.min(bw);
        let y = y.min(bh);
        Texture {
            backing: Arc::clone(&self.backing),
            x,
            y,
            width: width.min(bw - x),
            height: height.min(bh - y),
        }
    }

    /// Identity of the underlying GPU object, used for bind dedup
    pub fn buffer(&self) -> TextureId {
        self.backing.id
    }

    pub fn backing(&self) -> &TextureBacking {
        &self.backing
    }

    pub fn shares_backing(&self, other: &Texture) -> bool {
        self.backing.id == other.backing.id
    }

    /// Region width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Region height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn min_s(&self) -> f32 {
        self.x as f32 / self.backing.width.max(1) as f32
    }

    pub fn max_s(&self) -> f32 {
        (self.x + self.width) as f32 / self.backing.width.max(1) as f32
    }

    pub fn min_t(&self) -> f32 {
        self.y as f32 / self.backing.height.max(1) as f32
    }

    pub fn max_t(&self) -> f32 {
        (self.y + self.height) as f32 / self.backing.height.max(1) as f32
    }

    pub fn is_sub_texture(&self) -> bool {
        self.width != self.backing.width || self.height != self.backing.height
    }
}

/// Identity of a compiled shader program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u64);

/// Type of a named uniform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Mat4,
}

/// A named uniform exposed by a shader
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformDescriptor {
    pub name: Cow<'static, str>,
    pub kind: UniformKind,
}

impl UniformDescriptor {
    pub const fn new(name: &'static str, kind: UniformKind) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kind,
        }
    }
}

/// A uniform value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

/// Program source plus the uniforms it declares
#[derive(Clone, Debug)]
pub struct ShaderSource {
    pub label: Cow<'static, str>,
    pub wgsl: Cow<'static, str>,
    pub uniforms: Vec<UniformDescriptor>,
}

/// A compiled, bindable shader program
#[derive(Clone, Debug, PartialEq)]
pub struct Shader {
    pub id: ShaderId,
    pub label: String,
    pub uniforms: Vec<UniformDescriptor>,
}

impl Shader {
    /// Slot of a named uniform, or `-1` if the program does not declare it
    pub fn uniform_location(&self, name: &str) -> i32 {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .map_or(-1, |i| i as i32)
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniform_location(name) >= 0
    }
}

/// Immediate-mode GPU binding layer driven by the batch.
///
/// State calls take effect for every following draw until changed. Resource
/// creation reports failure through [`Result`]; setters never fail.
pub trait RenderDevice {
    /// Create an RGBA8 texture. `pixels` holds `width * height * 4` bytes.
    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<Texture>;

    fn compile_shader(&mut self, source: &ShaderSource) -> Result<Shader>;

    fn bind_shader(&mut self, shader: &Shader);

    fn unbind_shader(&mut self);

    /// Set a named uniform on the bound shader; `false` if it has no such uniform
    fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool;

    fn enable_blending(&mut self, enabled: bool);

    fn set_cull(&mut self, enabled: bool);

    fn set_blend_equation(&mut self, equation: BlendEquation);

    fn set_blend_func(&mut self, func: BlendFunc);

    fn set_color_mask(&mut self, mask: ColorMask);

    fn set_stencil_test(&mut self, enabled: bool);

    fn set_stencil_state(&mut self, state: &StencilState);

    /// Zero the stencil bits selected by `mask` over the whole target
    fn clear_stencil(&mut self, mask: u8);

    /// Bind a texture, or the default white texture for `None`
    fn bind_texture(&mut self, texture: Option<&Texture>);

    /// Replace the vertex buffer contents
    fn load_vertices(&mut self, vertices: &[Vertex]);

    /// Replace the index buffer contents
    fn load_indices(&mut self, indices: &[u32]);

    /// Replace the uniform-block buffer contents
    fn load_blocks(&mut self, blocks: &[UniformBlock]);

    /// Select which loaded uniform block following draws read
    fn activate_block(&mut self, index: usize);

    /// Draw `count` indices starting at `first`
    fn draw(&mut self, command: DrawCommand, count: u32, first: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_texture_region() {
        let page = Texture::new(TextureId(7), 256, 128);
        let glyph = page.sub_texture(64, 32, 64, 32);
        assert!(glyph.shares_backing(&page));
        assert_eq!(glyph.buffer(), TextureId(7));
        assert_eq!(glyph.min_s(), 0.25);
        assert_eq!(glyph.max_s(), 0.5);
        assert_eq!(glyph.min_t(), 0.25);
        assert_eq!(glyph.max_t(), 0.5);
        assert!(glyph.is_sub_texture());
        assert_ne!(glyph, page);
    }

    #[test]
    fn test_sub_texture_clamps() {
        let page = Texture::new(TextureId(1), 16, 16);
        let region = page.sub_texture(12, 12, 10, 10);
        assert_eq!((region.width(), region.height()), (4, 4));
    }

    #[test]
    fn test_uniform_location_sentinel() {
        let shader = Shader {
            id: ShaderId(1),
            label: "test".into(),
            uniforms: vec![UniformDescriptor::new("u_depth", UniformKind::Float)],
        };
        assert_eq!(shader.uniform_location("u_depth"), 0);
        assert_eq!(shader.uniform_location("u_missing"), -1);
    }
}
