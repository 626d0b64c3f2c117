//! Headless wgpu backend
//!
//! [`WgpuDevice`] emulates the immediate-mode [`RenderDevice`] surface on
//! top of wgpu. State calls update a shadow state; each draw snapshots that
//! state into a frame op. [`WgpuDevice::present`] uploads the whole frame and
//! encodes it as one render pass over an offscreen RGBA target with a
//! `Stencil8` attachment.
//!
//! Pipelines are created on demand and cached by shader, blend state, color
//! mask, stencil state and topology. Per-draw uniforms and uniform blocks
//! live in 256-byte slots addressed with dynamic offsets.

use std::borrow::Cow;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use tessera_paint::{Color, DrawCommand, Mat4, Vertex};
use wgpu::util::DeviceExt;

use crate::blend::{BlendEquation, BlendFactor, BlendFunc, ColorMask};
use crate::device::{
    RenderDevice, Shader, ShaderId, ShaderSource, Texture, TextureId, UniformValue,
};
use crate::error::{GpuError, Result};
use crate::shaders::STENCIL_CLEAR_SHADER;
use crate::stencil::{CompareFunction, StencilOp, StencilState};
use crate::uniform::UniformBlock;

const fn align256(v: u64) -> u64 {
    (v + 255) & !255
}

const UNIFORM_STRIDE: u64 = align256(std::mem::size_of::<DrawUniforms>() as u64);
const BLOCK_STRIDE: u64 = align256(std::mem::size_of::<UniformBlock>() as u64);
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x2,
    1 => Unorm8x4,
    2 => Float32x2,
    3 => Float32x2,
];

/// Per-draw uniforms, matching `DrawUniforms` in the sprite shader
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct DrawUniforms {
    perspective: [[f32; 4]; 4],
    draw_type: u32,
    depth: f32,
    blur: f32,
    _pad: f32,
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            perspective: Mat4::IDENTITY.to_cols_array_2d(),
            draw_type: 0,
            depth: 0.0,
            blur: 0.0,
            _pad: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: ShaderId,
    blend: Option<(BlendEquation, BlendFunc)>,
    color_mask: ColorMask,
    /// Stencil state with the reference zeroed; the reference is dynamic
    stencil: Option<StencilState>,
    topology: DrawCommand,
}

#[derive(Debug)]
enum FrameOp {
    Draw {
        key: PipelineKey,
        texture: TextureId,
        uniform_offset: u32,
        block_offset: u32,
        stencil_reference: u8,
        first: u32,
        count: u32,
        base_vertex: i32,
    },
    ClearStencil {
        mask: u8,
    },
}

/// Geometry and uniform data staged for the next `present`
struct Frame {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    uniforms: Vec<u8>,
    blocks: Vec<u8>,
    ops: Vec<FrameOp>,
    vertex_base: u32,
    index_base: u32,
    block_base: usize,
    last_uniform: Option<(DrawUniforms, u32)>,
}

impl Frame {
    fn new() -> Self {
        let mut frame = Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            uniforms: Vec::new(),
            blocks: Vec::new(),
            ops: Vec::new(),
            vertex_base: 0,
            index_base: 0,
            block_base: 0,
            last_uniform: None,
        };
        // Slot 0 is a neutral block for draws that never activate one
        frame.push_block(&UniformBlock::default());
        frame
    }

    fn push_block(&mut self, block: &UniformBlock) -> usize {
        let slot = self.blocks.len() / BLOCK_STRIDE as usize;
        self.blocks.extend_from_slice(bytemuck::bytes_of(block));
        self.blocks.resize((slot + 1) * BLOCK_STRIDE as usize, 0);
        slot
    }

    /// Offset of a uniform slot holding `uniforms`, reusing the last one if equal
    fn uniform_offset(&mut self, uniforms: &DrawUniforms) -> u32 {
        if let Some((last, offset)) = self.last_uniform {
            if last == *uniforms {
                return offset;
            }
        }
        let offset = self.uniforms.len() as u32;
        self.uniforms.extend_from_slice(bytemuck::bytes_of(uniforms));
        self.uniforms.resize(offset as usize + UNIFORM_STRIDE as usize, 0);
        self.last_uniform = Some((*uniforms, offset));
        offset
    }
}

/// Shadow of the immediate-mode state
#[derive(Clone, Debug)]
struct ImmediateState {
    shader: Option<Shader>,
    blending: bool,
    blend_equation: BlendEquation,
    blend_func: BlendFunc,
    color_mask: ColorMask,
    stencil_test: bool,
    stencil: Option<StencilState>,
    texture: Option<TextureId>,
    uniforms: DrawUniforms,
    block: usize,
}

impl Default for ImmediateState {
    fn default() -> Self {
        Self {
            shader: None,
            blending: false,
            blend_equation: BlendEquation::Add,
            blend_func: BlendFunc::SOURCE_OVER,
            color_mask: ColorMask::ALL,
            stencil_test: false,
            stencil: None,
            texture: None,
            uniforms: DrawUniforms::default(),
            block: 0,
        }
    }
}

struct TextureEntry {
    // Kept alive for the bind group
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct Layouts {
    draw: wgpu::BindGroupLayout,
    block: wgpu::BindGroupLayout,
    texture: wgpu::BindGroupLayout,
}

/// Offscreen wgpu implementation of [`RenderDevice`]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,

    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    stencil_view: wgpu::TextureView,

    layouts: Layouts,
    pipeline_layout: wgpu::PipelineLayout,
    clear_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    clear_module: wgpu::ShaderModule,

    modules: FxHashMap<ShaderId, wgpu::ShaderModule>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    clear_pipelines: FxHashMap<u8, wgpu::RenderPipeline>,
    textures: FxHashMap<TextureId, TextureEntry>,
    white: TextureId,

    next_id: u64,
    state: ImmediateState,
    frame: Frame,
}

impl WgpuDevice {
    /// Blocking constructor for a headless device
    pub fn new_headless(width: u32, height: u32) -> Result<Self> {
        pollster::block_on(Self::new(width, height))
    }

    pub async fn new(width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Tessera GPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await
            .map_err(|err| GpuError::RequestDevice(err.to_string()))?;

        tracing::info!(
            "wgpu device ready: adapter={}, target={}x{}",
            adapter.get_info().name,
            width,
            height
        );

        Ok(Self::from_device(device, queue, width, height))
    }

    /// Wrap an existing device and queue
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Tessera Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let stencil = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Tessera Stencil"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let stencil_view = stencil.create_view(&wgpu::TextureViewDescriptor::default());

        let layouts = Self::create_layouts(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&layouts.draw, &layouts.block, &layouts.texture],
            push_constant_ranges: &[],
        });
        let clear_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stencil Clear Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let clear_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Stencil Clear Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(STENCIL_CLEAR_SHADER)),
        });

        let mut this = Self {
            device,
            queue,
            width,
            height,
            target,
            target_view,
            stencil_view,
            layouts,
            pipeline_layout,
            clear_layout,
            sampler,
            clear_module,
            modules: FxHashMap::default(),
            pipelines: FxHashMap::default(),
            clear_pipelines: FxHashMap::default(),
            textures: FxHashMap::default(),
            white: TextureId(0),
            next_id: 1,
            state: ImmediateState::default(),
            frame: Frame::new(),
        };
        this.white = this.upload_texture(1, 1, &[255, 255, 255, 255]);
        this
    }

    fn create_layouts(device: &wgpu::Device) -> Layouts {
        let uniform_entry = |size: u64| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        };

        let draw = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniforms Layout"),
            entries: &[uniform_entry(std::mem::size_of::<DrawUniforms>() as u64)],
        });
        let block = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Block Layout"),
            entries: &[uniform_entry(std::mem::size_of::<UniformBlock>() as u64)],
        });
        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Layouts {
            draw,
            block,
            texture,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Projection mapping the target in pixels, y-up
    pub fn screen_projection(&self) -> Mat4 {
        Mat4::screen(self.width as f32, self.height as f32)
    }

    /// Ops recorded since the last `present`
    pub fn pending_ops(&self) -> usize {
        self.frame.ops.len()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn upload_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> TextureId {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Texture Bind Group"),
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = TextureId(self.next_id());
        self.textures.insert(
            id,
            TextureEntry {
                _texture: texture,
                bind_group,
            },
        );
        id
    }

    fn pipeline_for(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let Some(module) = self.modules.get(&key.shader) else {
            return;
        };

        let topology = match key.topology {
            DrawCommand::Triangles | DrawCommand::TriangleFan => wgpu::PrimitiveTopology::TriangleList,
            DrawCommand::Lines => wgpu::PrimitiveTopology::LineList,
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: key.blend.map(|(eq, func)| to_wgpu_blend(eq, func)),
                    write_mask: to_wgpu_color_writes(key.color_mask),
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(stencil_attachment_state(key.stencil.as_ref())),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        tracing::debug!("created pipeline #{} for {:?}", self.pipelines.len() + 1, key);
        self.pipelines.insert(key, pipeline);
    }

    fn clear_pipeline_for(&mut self, mask: u8) {
        if self.clear_pipelines.contains_key(&mask) {
            return;
        }
        let zero = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Always,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Zero,
        };
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Stencil Clear Pipeline"),
            layout: Some(&self.clear_layout),
            vertex: wgpu::VertexState {
                module: &self.clear_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.clear_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState {
                    front: zero,
                    back: zero,
                    read_mask: 0xFF,
                    write_mask: mask as u32,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        self.clear_pipelines.insert(mask, pipeline);
    }

    /// Render every op recorded since the last present into the target
    pub fn present(&mut self, clear: Color) {
        let frame = std::mem::replace(&mut self.frame, Frame::new());

        for op in &frame.ops {
            match op {
                FrameOp::Draw { key, .. } => self.pipeline_for(*key),
                FrameOp::ClearStencil { mask } => self.clear_pipeline_for(*mask),
            }
        }

        let vertex_buffer = (!frame.vertices.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Frame Vertex Buffer"),
                contents: bytemuck::cast_slice(&frame.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let index_buffer = (!frame.indices.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Frame Index Buffer"),
                contents: bytemuck::cast_slice(&frame.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        let mut uniforms = frame.uniforms.clone();
        if uniforms.is_empty() {
            uniforms.resize(UNIFORM_STRIDE as usize, 0);
        }
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Draw Uniforms"),
            contents: &uniforms,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let block_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniform Blocks"),
            contents: &frame.blocks,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let draw_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniforms Bind Group"),
            layout: &self.layouts.draw,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                }),
            }],
        });
        let block_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Block Bind Group"),
            layout: &self.layouts.block,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &block_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<UniformBlock>() as u64),
                }),
            }],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tessera Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Tessera Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.stencil_view,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (Some(vb), Some(ib)) = (&vertex_buffer, &index_buffer) {
                pass.set_vertex_buffer(0, vb.slice(..));
                pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);
            }

            for op in &frame.ops {
                match op {
                    FrameOp::Draw {
                        key,
                        texture,
                        uniform_offset,
                        block_offset,
                        stencil_reference,
                        first,
                        count,
                        base_vertex,
                    } => {
                        let Some(pipeline) = self.pipelines.get(key) else {
                            continue;
                        };
                        let texture = self
                            .textures
                            .get(texture)
                            .or_else(|| self.textures.get(&self.white));
                        let Some(texture) = texture else {
                            continue;
                        };
                        pass.set_pipeline(pipeline);
                        pass.set_bind_group(0, &draw_bind_group, &[*uniform_offset]);
                        pass.set_bind_group(1, &block_bind_group, &[*block_offset]);
                        pass.set_bind_group(2, &texture.bind_group, &[]);
                        pass.set_stencil_reference(*stencil_reference as u32);
                        pass.draw_indexed(*first..*first + *count, *base_vertex, 0..1);
                    }
                    FrameOp::ClearStencil { mask } => {
                        let Some(pipeline) = self.clear_pipelines.get(mask) else {
                            continue;
                        };
                        pass.set_pipeline(pipeline);
                        pass.set_stencil_reference(0);
                        pass.draw(0..3, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::debug!(
            "presented frame: ops={}, vertices={}, indices={}",
            frame.ops.len(),
            frame.vertices.len(),
            frame.indices.len()
        );
    }

    /// Copy the target back as tightly packed RGBA8 rows, top row first
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        let unpadded = self.width * 4;
        let padded = align256(unpadded as u64) as u32;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Tessera Readback"),
            size: padded as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tessera Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|err| GpuError::Readback(err.to_string()))?
            .map_err(|err| GpuError::Readback(err.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        for row in data.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }
}

impl RenderDevice for WgpuDevice {
    fn create_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<Texture> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            let err = GpuError::InvalidTexture(format!(
                "{}x{} texture needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            ));
            tracing::error!("{}", err);
            return Err(err);
        }
        let id = self.upload_texture(width, height, pixels);
        Ok(Texture::new(id, width, height))
    }

    fn compile_shader(&mut self, source: &ShaderSource) -> Result<Shader> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::error!("Shader '{}' failed to compile: {}", source.label, err);
            return Err(GpuError::ShaderCompile {
                label: source.label.to_string(),
                message: err.to_string(),
            });
        }

        let id = ShaderId(self.next_id());
        self.modules.insert(id, module);
        Ok(Shader {
            id,
            label: source.label.to_string(),
            uniforms: source.uniforms.clone(),
        })
    }

    fn bind_shader(&mut self, shader: &Shader) {
        self.state.shader = Some(shader.clone());
    }

    fn unbind_shader(&mut self) {
        self.state.shader = None;
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(shader) = &self.state.shader else {
            return false;
        };
        if !shader.has_uniform(name) {
            return false;
        }
        let uniforms = &mut self.state.uniforms;
        match (name, value) {
            ("u_perspective", UniformValue::Mat4(m)) => uniforms.perspective = m.to_cols_array_2d(),
            ("u_type", UniformValue::Int(bits)) => uniforms.draw_type = bits as u32,
            ("u_depth", UniformValue::Float(depth)) => uniforms.depth = depth,
            ("u_blur", UniformValue::Float(blur)) => uniforms.blur = blur,
            _ => {
                tracing::warn!("Uniform '{}' cannot take {:?}", name, value.kind());
                return false;
            }
        }
        true
    }

    fn enable_blending(&mut self, enabled: bool) {
        self.state.blending = enabled;
    }

    fn set_cull(&mut self, enabled: bool) {
        // The batch never culls; stencil stamping relies on both faces.
        if enabled {
            tracing::warn!("Face culling is not supported by the sprite pipeline");
        }
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.state.blend_equation = equation;
    }

    fn set_blend_func(&mut self, func: BlendFunc) {
        self.state.blend_func = func;
    }

    fn set_color_mask(&mut self, mask: ColorMask) {
        self.state.color_mask = mask;
    }

    fn set_stencil_test(&mut self, enabled: bool) {
        self.state.stencil_test = enabled;
    }

    fn set_stencil_state(&mut self, state: &StencilState) {
        self.state.stencil = Some(*state);
    }

    fn clear_stencil(&mut self, mask: u8) {
        if mask != 0 {
            self.frame.ops.push(FrameOp::ClearStencil { mask });
        }
    }

    fn bind_texture(&mut self, texture: Option<&Texture>) {
        self.state.texture = texture.map(Texture::buffer);
    }

    fn load_vertices(&mut self, vertices: &[Vertex]) {
        self.frame.vertex_base = self.frame.vertices.len() as u32;
        self.frame.vertices.extend_from_slice(vertices);
    }

    fn load_indices(&mut self, indices: &[u32]) {
        self.frame.index_base = self.frame.indices.len() as u32;
        self.frame.indices.extend_from_slice(indices);
    }

    fn load_blocks(&mut self, blocks: &[UniformBlock]) {
        self.frame.block_base = self.frame.blocks.len() / BLOCK_STRIDE as usize;
        for block in blocks {
            self.frame.push_block(block);
        }
    }

    fn activate_block(&mut self, index: usize) {
        self.state.block = self.frame.block_base + index;
    }

    fn draw(&mut self, command: DrawCommand, count: u32, first: u32) {
        let Some(shader) = &self.state.shader else {
            tracing::warn!("Draw issued with no shader bound");
            return;
        };
        if command == DrawCommand::TriangleFan {
            tracing::warn!("Triangle fans are drawn as triangle lists");
        }
        let stencil = if self.state.stencil_test {
            self.state.stencil
        } else {
            None
        };
        let key = PipelineKey {
            shader: shader.id,
            blend: self
                .state
                .blending
                .then_some((self.state.blend_equation, self.state.blend_func)),
            color_mask: self.state.color_mask,
            stencil: stencil.map(|s| StencilState { reference: 0, ..s }),
            topology: command,
        };
        let uniforms = self.state.uniforms;
        let uniform_offset = self.frame.uniform_offset(&uniforms);
        let block_offset = (self.state.block as u64 * BLOCK_STRIDE) as u32;

        self.frame.ops.push(FrameOp::Draw {
            key,
            texture: self.state.texture.unwrap_or(self.white),
            uniform_offset,
            block_offset,
            stencil_reference: stencil.map_or(0, |s| s.reference),
            first: self.frame.index_base + first,
            count,
            base_vertex: self.frame.vertex_base as i32,
        });
    }
}

fn stencil_attachment_state(state: Option<&StencilState>) -> wgpu::DepthStencilState {
    let stencil = match state {
        Some(s) => wgpu::StencilState {
            front: to_wgpu_face(s, &s.front),
            back: to_wgpu_face(s, &s.back),
            read_mask: s.read_mask as u32,
            write_mask: s.write_mask as u32,
        },
        None => wgpu::StencilState::default(),
    };
    wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

fn to_wgpu_face(state: &StencilState, ops: &crate::stencil::StencilFaceOps) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: to_wgpu_compare(state.compare),
        fail_op: to_wgpu_op(ops.fail),
        depth_fail_op: to_wgpu_op(ops.depth_fail),
        pass_op: to_wgpu_op(ops.pass),
    }
}

fn to_wgpu_compare(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn to_wgpu_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

fn to_wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn to_wgpu_blend(equation: BlendEquation, func: BlendFunc) -> wgpu::BlendState {
    let operation = match equation {
        BlendEquation::Add => wgpu::BlendOperation::Add,
        BlendEquation::Subtract => wgpu::BlendOperation::Subtract,
        BlendEquation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendEquation::Min => wgpu::BlendOperation::Min,
        BlendEquation::Max => wgpu::BlendOperation::Max,
    };
    // wgpu requires unit factors for min/max
    let minmax = matches!(equation, BlendEquation::Min | BlendEquation::Max);
    let component = |src: BlendFactor, dst: BlendFactor| wgpu::BlendComponent {
        src_factor: if minmax { wgpu::BlendFactor::One } else { to_wgpu_factor(src) },
        dst_factor: if minmax { wgpu::BlendFactor::One } else { to_wgpu_factor(dst) },
        operation,
    };
    wgpu::BlendState {
        color: component(func.src_rgb, func.dst_rgb),
        alpha: component(func.src_alpha, func.dst_alpha),
    }
}

fn to_wgpu_color_writes(mask: ColorMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    if mask.contains(ColorMask::RED) {
        writes |= wgpu::ColorWrites::RED;
    }
    if mask.contains(ColorMask::GREEN) {
        writes |= wgpu::ColorWrites::GREEN;
    }
    if mask.contains(ColorMask::BLUE) {
        writes |= wgpu::ColorWrites::BLUE;
    }
    if mask.contains(ColorMask::ALPHA) {
        writes |= wgpu::ColorWrites::ALPHA;
    }
    writes
}
