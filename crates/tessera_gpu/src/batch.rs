//! Deferred sprite/mesh batcher
//!
//! [`SpriteBatch`] accumulates transformed vertices into fixed-capacity
//! staging buffers and defers every pipeline change. A setter that changes
//! state while vertices are pending snapshots the current [`DrawContext`]
//! into a history list; [`SpriteBatch::flush`] then uploads the buffers once
//! and replays the history, issuing only the calls each context's dirty mask
//! names followed by one draw for its index range.
//!
//! Shapes too large for the staging buffers are split into bounded chunks
//! along primitive boundaries, duplicating shared vertices where a chunk
//! boundary cuts through them.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tessera_paint::{Affine, Color, DrawCommand, Gradient, Mat4, Mesh, Scissor, Vertex};

use crate::blend::{BlendEquation, BlendFactor, BlendFunc, ColorMask};
use crate::buffer::FixedBuffer;
use crate::config::{log_batch_config, SpriteBatchConfig};
use crate::context::{Dirty, DrawContext, DrawType};
use crate::device::{RenderDevice, Shader, ShaderSource, Texture, UniformValue};
use crate::error::Result;
use crate::shape::{apply_shape_coords, BatchShape};
use crate::stencil::{StencilEffect, LOWER_HALF, UPPER_HALF};
use crate::uniform::UniformBlock;

/// Glyph quads that all sample one atlas page.
///
/// Texture coordinates in `mesh` are absolute within `texture`.
#[derive(Clone, Debug)]
pub struct GlyphRun {
    pub texture: Arc<Texture>,
    pub mesh: Mesh,
}

/// Counters for one `begin`/`end` pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub flushes: usize,
    pub draw_calls: usize,
    /// Device state calls issued during replay
    pub state_changes: usize,
    pub vertices: usize,
    pub indices: usize,
    /// Meshes that had to be split across flushes
    pub chunked_meshes: usize,
}

/// Deferred draw-call batcher over a [`RenderDevice`]
pub struct SpriteBatch<D: RenderDevice> {
    device: D,
    config: SpriteBatchConfig,
    shader: Shader,

    vertices: FixedBuffer<Vertex>,
    indices: FixedBuffer<u32>,
    blocks: FixedBuffer<UniformBlock>,

    context: DrawContext,
    history: Vec<DrawContext>,

    color: Color,
    gradient: Option<Arc<Gradient>>,
    scissor: Option<Arc<Scissor>>,

    /// Vertices are pending under the current context
    inflight: bool,
    /// Between `begin` and `end`
    active: bool,
    stats: BatchStats,
}

impl<D: RenderDevice> SpriteBatch<D> {
    /// Create a batch with the default sprite shader
    pub fn new(device: D, config: SpriteBatchConfig) -> Result<Self> {
        Self::with_shader(device, config, &ShaderSource::sprite())
    }

    /// Create a batch with a custom shader program
    pub fn with_shader(mut device: D, config: SpriteBatchConfig, source: &ShaderSource) -> Result<Self> {
        config.validate();
        let shader = device.compile_shader(source).map_err(|err| {
            tracing::error!("Failed to compile batch shader '{}': {}", source.label, err);
            err
        })?;
        log_batch_config(&config);

        Ok(Self {
            device,
            config,
            shader,
            vertices: FixedBuffer::new(config.vertex_capacity),
            indices: FixedBuffer::new(config.index_capacity),
            blocks: FixedBuffer::new(config.block_capacity),
            context: DrawContext::default(),
            history: Vec::new(),
            color: Color::WHITE,
            gradient: None,
            scissor: None,
            inflight: false,
            active: false,
            stats: BatchStats::default(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn config(&self) -> &SpriteBatchConfig {
        &self.config
    }

    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_inflight(&self) -> bool {
        self.inflight
    }

    /// The live context
    pub fn context(&self) -> &DrawContext {
        &self.context
    }

    /// Contexts recorded since the last flush
    pub fn history(&self) -> &[DrawContext] {
        &self.history
    }

    /// Swap the shader program.
    ///
    /// # Panics
    ///
    /// Panics while a pass is active: the staged vertex layout belongs to the
    /// bound program.
    pub fn set_shader(&mut self, shader: Shader) {
        assert!(!self.active, "cannot swap shaders between begin() and end()");
        self.shader = shader;
    }

    // =========================================================================
    // Pass lifecycle
    // =========================================================================

    pub fn begin(&mut self) {
        assert!(!self.active, "begin() called twice without end()");
        self.active = true;

        self.device.enable_blending(true);
        self.device.set_cull(false);
        self.device.bind_shader(&self.shader);

        self.vertices.reset();
        self.indices.reset();
        self.blocks.reset();
        self.history.clear();

        self.context.first = 0;
        self.context.last = 0;
        self.context.blockptr = None;
        self.context.cleared = 0;
        self.context.dirty = Dirty::ALL;
        self.inflight = false;
        self.write_block();

        self.stats = BatchStats::default();
    }

    pub fn end(&mut self) {
        assert!(self.active, "end() called without begin()");
        self.flush();
        self.device.set_stencil_test(false);
        self.device.set_color_mask(ColorMask::ALL);
        self.device.unbind_shader();
        self.active = false;
        tracing::debug!(
            "sprite batch pass: flushes={}, draw_calls={}, state_changes={}, vertices={}, indices={}, chunked={}",
            self.stats.flushes,
            self.stats.draw_calls,
            self.stats.state_changes,
            self.stats.vertices,
            self.stats.indices,
            self.stats.chunked_meshes
        );
    }

    /// Submit everything pending. A no-op when no indices are staged.
    pub fn flush(&mut self) {
        if self.indices.is_empty() {
            return;
        }

        self.context.last = self.indices.len();
        self.history.push(self.context.clone());

        self.device.load_vertices(self.vertices.as_slice());
        self.device.load_indices(self.indices.as_slice());
        if !self.blocks.is_empty() {
            self.device.load_blocks(self.blocks.as_slice());
        }

        let history = std::mem::take(&mut self.history);
        for ctx in &history {
            self.replay(ctx);
        }
        self.history = history;
        self.history.clear();

        self.stats.flushes += 1;
        self.stats.vertices += self.vertices.len();
        self.stats.indices += self.indices.len();

        self.vertices.reset();
        self.indices.reset();
        self.blocks.reset();
        self.context.first = 0;
        self.context.last = 0;
        self.context.blockptr = None;
        self.context.cleared = 0;
        self.context.dirty = Dirty::empty();
        self.inflight = false;
        self.write_block();
    }

    /// Issue the calls one historical context needs, then its draw
    fn replay(&mut self, ctx: &DrawContext) {
        let dirty = ctx.dirty;
        let mut changes = 0;

        if dirty.contains(Dirty::BLEND_EQUATION) {
            self.device.set_blend_equation(ctx.blend_equation);
            changes += 1;
        }
        if dirty.contains(Dirty::BLEND_FUNC) {
            self.device.set_blend_func(ctx.blend_func);
            changes += 1;
        }
        if dirty.contains(Dirty::DRAW_TYPE) {
            self.device
                .set_uniform("u_type", UniformValue::Int(ctx.draw_type.bits() as i32));
            changes += 1;
        }
        if dirty.contains(Dirty::DEPTH) {
            self.device.set_uniform("u_depth", UniformValue::Float(ctx.depth));
            changes += 1;
        }
        if dirty.contains(Dirty::PERSPECTIVE) {
            self.device
                .set_uniform("u_perspective", UniformValue::Mat4(*ctx.perspective));
            changes += 1;
        }
        if dirty.contains(Dirty::TEXTURE) {
            self.device.bind_texture(ctx.texture.as_deref());
            changes += 1;
        }
        if dirty.contains(Dirty::UNIFORM_BLOCK) {
            if let Some(block) = ctx.blockptr {
                self.device.activate_block(block);
                changes += 1;
            }
        }
        if dirty.contains(Dirty::BLUR) {
            self.device.set_uniform("u_blur", UniformValue::Float(ctx.blur));
            changes += 1;
        }
        if dirty.contains(Dirty::STENCIL_CLEAR) && ctx.cleared != 0 {
            self.device.clear_stencil(ctx.cleared);
            changes += 1;
        }
        if dirty.contains(Dirty::STENCIL_EFFECT) {
            ctx.stencil.apply(&mut self.device);
            changes += 1;
        }

        tracing::trace!(
            "replay context [{}..{}) dirty={:?} changes={}",
            ctx.first,
            ctx.last,
            dirty,
            changes
        );
        self.stats.state_changes += changes;

        if ctx.count() > 0 {
            self.device
                .draw(ctx.command, ctx.count() as u32, ctx.first as u32);
            self.stats.draw_calls += 1;
        }
    }

    // =========================================================================
    // State setters
    // =========================================================================

    /// Snapshot the live context if vertices are pending under it
    fn record(&mut self) {
        if !self.inflight {
            return;
        }
        self.context.last = self.indices.len();
        let next = self.context.successor();
        self.history.push(std::mem::replace(&mut self.context, next));
        self.inflight = false;
    }

    fn set_draw_type_flag(&mut self, flag: DrawType, on: bool) {
        let mut draw_type = self.context.draw_type;
        draw_type.set(flag, on);
        if draw_type != self.context.draw_type {
            self.context.draw_type = draw_type;
            self.context.dirty |= Dirty::DRAW_TYPE;
        }
    }

    /// Stage a uniform block for the active gradient and scissor
    fn write_block(&mut self) {
        if self.gradient.is_none() && self.scissor.is_none() {
            self.context.blockptr = None;
            return;
        }
        if self.blocks.is_full() {
            if self.indices.is_empty() {
                self.blocks.reset();
            } else {
                // flush() rewrites block 0 for the active state
                self.flush();
                return;
            }
        }
        let block = UniformBlock::compose(self.gradient.as_deref(), self.scissor.as_deref());
        let slot = self.blocks.push(block);
        self.context.blockptr = Some(slot);
        self.context.dirty |= Dirty::UNIFORM_BLOCK;
    }

    /// Tint applied by `fill`, `outline` and tinted mesh draws
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Bind a texture for following draws.
    ///
    /// Switching between regions of one backing only changes the texture
    /// coordinate remap; it neither splits the batch nor rebinds.
    pub fn set_texture(&mut self, texture: Option<Arc<Texture>>) {
        match (self.context.texture.as_deref(), texture.as_deref()) {
            (None, None) => return,
            (Some(current), Some(next)) if current.shares_backing(next) => {
                if current != next {
                    self.context.texture = texture;
                }
                return;
            }
            _ => {}
        }
        self.record();
        let textured = texture.is_some();
        self.context.texture = texture;
        self.context.dirty |= Dirty::TEXTURE;
        self.set_draw_type_flag(DrawType::TEXTURE, textured);
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.context.texture.as_ref()
    }

    /// Install a gradient. The value is copied, so later edits to the
    /// caller's gradient do not reach recorded draws.
    pub fn set_gradient(&mut self, gradient: Option<&Gradient>) {
        if self.gradient.as_deref() == gradient {
            return;
        }
        self.record();
        self.gradient = gradient.map(|g| Arc::new(*g));
        self.set_draw_type_flag(DrawType::GRADIENT, gradient.is_some());
        self.write_block();
    }

    pub fn gradient(&self) -> Option<&Arc<Gradient>> {
        self.gradient.as_ref()
    }

    /// Install a scissor. The value is copied like [`SpriteBatch::set_gradient`].
    pub fn set_scissor(&mut self, scissor: Option<&Scissor>) {
        if self.scissor.as_deref() == scissor {
            return;
        }
        self.record();
        self.scissor = scissor.map(|s| Arc::new(*s));
        self.set_draw_type_flag(DrawType::SCISSOR, scissor.is_some());
        self.write_block();
    }

    pub fn scissor(&self) -> Option<&Arc<Scissor>> {
        self.scissor.as_ref()
    }

    pub fn set_blend_equation(&mut self, equation: BlendEquation) {
        if self.context.blend_equation == equation {
            return;
        }
        self.record();
        self.context.blend_equation = equation;
        self.context.dirty |= Dirty::BLEND_EQUATION;
    }

    pub fn set_blend_func(&mut self, func: BlendFunc) {
        if self.context.blend_func == func {
            return;
        }
        self.record();
        self.context.blend_func = func;
        self.context.dirty |= Dirty::BLEND_FUNC;
    }

    pub fn set_src_blend_func(&mut self, rgb: BlendFactor, alpha: BlendFactor) {
        self.set_blend_func(BlendFunc {
            src_rgb: rgb,
            src_alpha: alpha,
            ..self.context.blend_func
        });
    }

    pub fn set_dst_blend_func(&mut self, rgb: BlendFactor, alpha: BlendFactor) {
        self.set_blend_func(BlendFunc {
            dst_rgb: rgb,
            dst_alpha: alpha,
            ..self.context.blend_func
        });
    }

    pub fn blend_func(&self) -> BlendFunc {
        self.context.blend_func
    }

    pub fn set_command(&mut self, command: DrawCommand) {
        if self.context.command == command {
            return;
        }
        self.record();
        self.context.command = command;
        self.context.dirty |= Dirty::COMMAND;
    }

    pub fn set_depth(&mut self, depth: f32) {
        if self.context.depth == depth {
            return;
        }
        self.record();
        self.context.depth = depth;
        self.context.dirty |= Dirty::DEPTH;
    }

    /// Box blur radius in texels; zero disables blurring
    pub fn set_blur(&mut self, blur: f32) {
        if self.context.blur == blur {
            return;
        }
        self.record();
        self.context.blur = blur;
        self.context.dirty |= Dirty::BLUR;
        self.set_draw_type_flag(DrawType::BLUR, blur > 0.0);
    }

    pub fn set_stencil_effect(&mut self, effect: StencilEffect) {
        if self.context.stencil == effect {
            return;
        }
        self.record();
        self.context.stencil = effect;
        self.context.dirty |= Dirty::STENCIL_EFFECT;
    }

    pub fn stencil_effect(&self) -> StencilEffect {
        self.context.stencil
    }

    pub fn set_perspective(&mut self, perspective: &Mat4) {
        if *self.context.perspective == *perspective {
            return;
        }
        self.record();
        self.context.perspective = Arc::new(*perspective);
        self.context.dirty |= Dirty::PERSPECTIVE;
    }

    /// Clear the whole stencil buffer before the next draw
    pub fn clear_stencil(&mut self) {
        self.clear_stencil_bits(LOWER_HALF | UPPER_HALF);
    }

    /// Clear one half of the stencil buffer: the shape scratch bits
    /// (`lower`) or the clip-region bits
    pub fn clear_half_stencil(&mut self, lower: bool) {
        self.clear_stencil_bits(if lower { LOWER_HALF } else { UPPER_HALF });
    }

    fn clear_stencil_bits(&mut self, mask: u8) {
        if !self.inflight && self.context.cleared & mask == mask {
            return;
        }
        self.record();
        self.context.cleared |= mask;
        self.context.dirty |= Dirty::STENCIL_CLEAR;
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Fill a shape with the batch color
    pub fn fill<S: BatchShape + ?Sized>(&mut self, shape: &S, transform: &Affine) {
        let mut mesh = shape.fill_mesh(self.color);
        apply_shape_coords(&mut mesh, shape.local_bounds());
        self.prepare(&mesh, transform, false);
    }

    /// Trace a shape's boundary with lines in the batch color
    pub fn outline<S: BatchShape + ?Sized>(&mut self, shape: &S, transform: &Affine) {
        let mut mesh = shape.outline_mesh(self.color);
        apply_shape_coords(&mut mesh, shape.local_bounds());
        self.prepare(&mesh, transform, false);
    }

    /// Draw a caller-built mesh; `tint` multiplies vertex colors by the batch color
    pub fn draw_mesh(&mut self, mesh: &Mesh, transform: &Affine, tint: bool) {
        self.prepare(mesh, transform, tint);
    }

    /// Draw laid-out glyph runs, binding each run's atlas page
    pub fn draw_text(&mut self, runs: &[GlyphRun], transform: &Affine) {
        for run in runs {
            self.set_texture(Some(Arc::clone(&run.texture)));
            self.prepare(&run.mesh, transform, true);
        }
    }

    /// Stage a mesh, flushing or chunking when it does not fit
    fn prepare(&mut self, mesh: &Mesh, transform: &Affine, tint: bool) {
        assert!(self.active, "draw outside begin()/end()");

        let expanded;
        let mesh = if mesh.command == DrawCommand::TriangleFan {
            expanded = mesh.to_triangles();
            &expanded
        } else {
            mesh
        };
        let stride = mesh.command.chunk_size();
        assert!(
            mesh.indices.len() % stride == 0,
            "mesh has {} indices, not a multiple of {} for {:?}",
            mesh.indices.len(),
            stride,
            mesh.command
        );
        if mesh.is_empty() {
            return;
        }
        let compact;
        let mesh = if mesh.is_compact() {
            mesh
        } else {
            compact = mesh.compacted();
            &compact
        };

        self.set_command(mesh.command);

        let (vcount, icount) = (mesh.vertices.len(), mesh.indices.len());
        if vcount > self.vertices.capacity() || icount > self.indices.capacity() {
            self.chunkify(mesh, transform, tint);
            return;
        }
        if vcount > self.vertices.remaining() || icount > self.indices.remaining() {
            self.flush();
        }

        let base = self.vertices.len() as u32;
        for v in &mesh.vertices {
            let out = self.convert(v, transform, tint);
            self.vertices.push(out);
        }
        for &i in &mesh.indices {
            self.indices.push(base + i);
        }
        self.context.last = self.indices.len();
        self.inflight = true;
    }

    /// Stream an oversized mesh one primitive at a time.
    ///
    /// Vertices are shared within a chunk through a remap table that is
    /// cleared at every flush, so no index refers across a flush boundary.
    fn chunkify(&mut self, mesh: &Mesh, transform: &Affine, tint: bool) {
        let stride = mesh.command.chunk_size();
        let mut remap: FxHashMap<u32, u32> = FxHashMap::default();
        self.stats.chunked_meshes += 1;

        for primitive in mesh.indices.chunks_exact(stride) {
            let fresh = primitive.iter().filter(|i| !remap.contains_key(i)).count();
            if fresh > self.vertices.remaining() || stride > self.indices.remaining() {
                self.flush();
                remap.clear();
            }
            for &index in primitive {
                let slot = match remap.get(&index) {
                    Some(&slot) => slot,
                    None => {
                        let out = self.convert(&mesh.vertices[index as usize], transform, tint);
                        let slot = self.vertices.push(out) as u32;
                        remap.insert(index, slot);
                        slot
                    }
                };
                self.indices.push(slot);
            }
            self.context.last = self.indices.len();
            self.inflight = true;
        }
    }

    /// Transform, tint and remap one vertex into the staging layout
    fn convert(&self, v: &Vertex, transform: &Affine, tint: bool) -> Vertex {
        let mut out = *v;
        out.position = transform.transform_point(v.point()).to_array();
        if tint {
            out.color = Color::from_packed(v.color).modulate(self.color).to_packed();
        }
        if let Some(texture) = &self.context.texture {
            let [s, t] = v.texcoord;
            out.texcoord = [
                texture.min_s() + (texture.max_s() - texture.min_s()) * s,
                texture.min_t() + (texture.max_t() - texture.min_t()) * t,
            ];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCall, RecordingDevice};
    use tessera_paint::Rect;

    fn batch() -> SpriteBatch<RecordingDevice> {
        SpriteBatch::new(RecordingDevice::new(), SpriteBatchConfig::default()).unwrap()
    }

    #[test]
    fn test_flush_without_vertices_is_noop() {
        let mut batch = batch();
        batch.begin();
        batch.device_mut().clear_calls();
        batch.flush();
        assert!(batch.device().calls().is_empty());
        batch.end();
        assert_eq!(batch.device().draw_count(), 0);
    }

    #[test]
    fn test_setters_without_pending_vertices_do_not_record() {
        let mut batch = batch();
        batch.begin();
        batch.set_depth(1.0);
        batch.set_blur(2.0);
        batch.set_stencil_effect(StencilEffect::Stamp);
        assert!(batch.history().is_empty());

        batch.fill(&Rect::new(0.0, 0.0, 1.0, 1.0), &Affine::IDENTITY);
        batch.set_depth(1.0);
        assert!(batch.history().is_empty());
        batch.set_depth(2.0);
        assert_eq!(batch.history().len(), 1);
        assert!(batch.context().dirty.contains(Dirty::DEPTH));
        batch.end();
    }

    #[test]
    fn test_gradient_is_snapshotted() {
        let mut batch = batch();
        batch.begin();
        let mut gradient = Gradient::radial(tessera_paint::Point::ZERO, 1.0, 2.0, Color::RED, Color::BLUE);
        batch.set_gradient(Some(&gradient));
        gradient.inner = Color::GREEN;
        assert_eq!(batch.gradient().map(|g| g.inner), Some(Color::RED));
        assert!(batch.context().draw_type.contains(DrawType::GRADIENT));
        assert_eq!(batch.context().blockptr, Some(0));
        batch.end();
    }

    #[test]
    fn test_block_chunking_flushes() {
        let config = SpriteBatchConfig {
            block_capacity: 2,
            ..Default::default()
        };
        let mut batch = SpriteBatch::new(RecordingDevice::new(), config).unwrap();
        batch.begin();
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);
        for i in 0..3 {
            let s = Scissor::new(Rect::new(0.0, 0.0, 10.0 + i as f32, 10.0));
            batch.set_scissor(Some(&s));
            batch.fill(&rect, &Affine::IDENTITY);
        }
        batch.end();
        assert_eq!(batch.stats().flushes, 2);
        assert_eq!(batch.device().draw_count(), 3);
    }

    #[test]
    fn test_clear_stencil_is_replayed_before_effect() {
        let mut batch = batch();
        batch.begin();
        batch.clear_stencil();
        batch.set_stencil_effect(StencilEffect::Stamp);
        batch.fill(&Rect::new(0.0, 0.0, 1.0, 1.0), &Affine::IDENTITY);
        batch.end();

        let calls = batch.device().calls();
        let clear = calls
            .iter()
            .position(|c| matches!(c, DeviceCall::ClearStencil(0xFF)))
            .unwrap();
        let effect = calls
            .iter()
            .position(|c| matches!(c, DeviceCall::SetStencilState(_)))
            .unwrap();
        assert!(clear < effect);
    }

    #[test]
    fn test_tint_modulates_vertex_color() {
        let mut batch = batch();
        batch.begin();
        batch.set_color(Color::new(1.0, 0.0, 0.0, 1.0));
        let mut mesh = Rect::new(0.0, 0.0, 1.0, 1.0).fill_mesh(Color::WHITE);
        mesh.set_color(Color::new(1.0, 1.0, 1.0, 0.5));
        batch.draw_mesh(&mesh, &Affine::IDENTITY, true);
        batch.end();
        let vertex = batch.device().last_vertices()[0];
        assert_eq!(Color::from_packed(vertex.color).to_rgba8(), [255, 0, 0, 128]);
    }
}
