//! In-memory render device
//!
//! [`RecordingDevice`] implements [`RenderDevice`] without a GPU. Every call
//! is appended to a log as a [`DeviceCall`], and draws are resolved against
//! the loaded buffers so tests can check exactly which primitives reached
//! the device.

use tessera_paint::{DrawCommand, Vertex};

use crate::blend::{BlendEquation, BlendFunc, ColorMask};
use crate::device::{
    RenderDevice, Shader, ShaderId, ShaderSource, Texture, TextureId, UniformValue,
};
use crate::error::{GpuError, Result};
use crate::stencil::StencilState;
use crate::uniform::UniformBlock;

/// One recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CreateTexture { id: TextureId, width: u32, height: u32 },
    CompileShader(ShaderId),
    BindShader(ShaderId),
    UnbindShader,
    SetUniform { name: String, value: UniformValue, found: bool },
    EnableBlending(bool),
    SetCull(bool),
    SetBlendEquation(BlendEquation),
    SetBlendFunc(BlendFunc),
    SetColorMask(ColorMask),
    SetStencilTest(bool),
    SetStencilState(StencilState),
    ClearStencil(u8),
    BindTexture(Option<TextureId>),
    LoadVertices(usize),
    LoadIndices(usize),
    LoadBlocks(usize),
    ActivateBlock(usize),
    Draw { command: DrawCommand, count: u32, first: u32 },
}

/// A draw resolved against the buffers loaded when it was issued
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedDraw {
    pub command: DrawCommand,
    /// Vertices in index order
    pub vertices: Vec<Vertex>,
    /// Texture bound at draw time
    pub texture: Option<TextureId>,
    /// Stencil test enabled at draw time
    pub stencil: Option<StencilState>,
    pub color_mask: ColorMask,
}

/// A [`RenderDevice`] that records calls instead of rendering
#[derive(Debug)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    next_id: u64,
    shader: Option<Shader>,
    fail_shaders: bool,

    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    blocks: Vec<UniformBlock>,
    texture: Option<TextureId>,
    stencil_test: bool,
    stencil_state: Option<StencilState>,
    color_mask: ColorMask,
    draws: Vec<ResolvedDraw>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 1,
            shader: None,
            fail_shaders: false,
            vertices: Vec::new(),
            indices: Vec::new(),
            blocks: Vec::new(),
            texture: None,
            stencil_test: false,
            stencil_state: None,
            color_mask: ColorMask::ALL,
            draws: Vec::new(),
        }
    }

    /// A device whose shader compilation always fails
    pub fn with_shader_failure() -> Self {
        Self {
            fail_shaders: true,
            ..Self::new()
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }

    pub fn draws(&self) -> &[ResolvedDraw] {
        &self.draws
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    pub fn texture_bind_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::BindTexture(_)))
            .count()
    }

    /// Number of calls matching a predicate
    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn last_vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn last_indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn last_blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }
}

impl RenderDevice for RecordingDevice {
    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<Texture> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(GpuError::InvalidTexture(format!(
                "{}x{} texture needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        let id = TextureId(self.next_id());
        self.calls.push(DeviceCall::CreateTexture { id, width, height });
        Ok(Texture::new(id, width, height))
    }

    fn compile_shader(&mut self, source: &ShaderSource) -> Result<Shader> {
        if self.fail_shaders {
            return Err(GpuError::ShaderCompile {
                label: source.label.to_string(),
                message: "compilation disabled on this device".to_string(),
            });
        }
        let id = ShaderId(self.next_id());
        self.calls.push(DeviceCall::CompileShader(id));
        Ok(Shader {
            id,
            label: source.label.to_string(),
            uniforms: source.uniforms.clone(),
        })
    }

    fn bind_shader(&mut self, shader: &Shader) {
        self.shader = Some(shader.clone());
        self.calls.push(DeviceCall::BindShader(shader.id));
    }

    fn unbind_shader(&mut self) {
        self.shader = None;
        self.calls.push(DeviceCall::UnbindShader);
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        let found = self
            .shader
            .as_ref()
            .is_some_and(|s| s.has_uniform(name));
        self.calls.push(DeviceCall::SetUniform {
            name: name.to_string(),
            value,
            found,
        });
        found
    }

    fn enable_blending(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::EnableBlending(enabled));
    }

    fn set_cull(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::SetCull(enabled));
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.calls.push(DeviceCall::SetBlendEquation(equation));
    }

    fn set_blend_func(&mut self, func: BlendFunc) {
        self.calls.push(DeviceCall::SetBlendFunc(func));
    }

    fn set_color_mask(&mut self, mask: ColorMask) {
        self.color_mask = mask;
        self.calls.push(DeviceCall::SetColorMask(mask));
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.stencil_test = enabled;
        self.calls.push(DeviceCall::SetStencilTest(enabled));
    }

    fn set_stencil_state(&mut self, state: &StencilState) {
        self.stencil_state = Some(*state);
        self.calls.push(DeviceCall::SetStencilState(*state));
    }

    fn clear_stencil(&mut self, mask: u8) {
        self.calls.push(DeviceCall::ClearStencil(mask));
    }

    fn bind_texture(&mut self, texture: Option<&Texture>) {
        self.texture = texture.map(Texture::buffer);
        self.calls.push(DeviceCall::BindTexture(self.texture));
    }

    fn load_vertices(&mut self, vertices: &[Vertex]) {
        self.vertices = vertices.to_vec();
        self.calls.push(DeviceCall::LoadVertices(vertices.len()));
    }

    fn load_indices(&mut self, indices: &[u32]) {
        self.indices = indices.to_vec();
        self.calls.push(DeviceCall::LoadIndices(indices.len()));
    }

    fn load_blocks(&mut self, blocks: &[UniformBlock]) {
        self.blocks = blocks.to_vec();
        self.calls.push(DeviceCall::LoadBlocks(blocks.len()));
    }

    fn activate_block(&mut self, index: usize) {
        debug_assert!(index < self.blocks.len(), "block {index} was never loaded");
        self.calls.push(DeviceCall::ActivateBlock(index));
    }

    fn draw(&mut self, command: DrawCommand, count: u32, first: u32) {
        let range = first as usize..(first + count) as usize;
        let vertices = self.indices[range]
            .iter()
            .map(|&i| self.vertices[i as usize])
            .collect();
        self.draws.push(ResolvedDraw {
            command,
            vertices,
            texture: self.texture,
            stencil: self.stencil_test.then_some(self.stencil_state).flatten(),
            color_mask: self.color_mask,
        });
        self.calls.push(DeviceCall::Draw {
            command,
            count,
            first,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{UniformDescriptor, UniformKind};

    #[test]
    fn test_set_uniform_reports_missing_names() {
        let mut device = RecordingDevice::new();
        let shader = device
            .compile_shader(&ShaderSource {
                label: "test".into(),
                wgsl: "".into(),
                uniforms: vec![UniformDescriptor::new("u_depth", UniformKind::Float)],
            })
            .unwrap();
        device.bind_shader(&shader);
        assert!(device.set_uniform("u_depth", UniformValue::Float(1.0)));
        assert!(!device.set_uniform("u_missing", UniformValue::Float(1.0)));
    }

    #[test]
    fn test_texture_size_is_validated() {
        let mut device = RecordingDevice::new();
        assert!(device.create_texture(2, 2, &[0; 16]).is_ok());
        assert!(matches!(
            device.create_texture(2, 2, &[0; 4]),
            Err(GpuError::InvalidTexture(_))
        ));
    }

    #[test]
    fn test_shader_failure() {
        let mut device = RecordingDevice::with_shader_failure();
        assert!(device.compile_shader(&ShaderSource::sprite()).is_err());
    }
}
