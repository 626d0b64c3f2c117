//! Tessera GPU layer
//!
//! Deferred sprite batching over an immediate-mode [`RenderDevice`].
//!
//! # Overview
//!
//! [`SpriteBatch`] accumulates transformed, tinted geometry into fixed-size
//! vertex and index buffers. Every state change (texture, blend, gradient,
//! scissor, stencil effect, ...) closes the current [`DrawContext`] and opens
//! a successor that carries only the changed bits. [`SpriteBatch::flush`]
//! uploads the buffers once and replays the contexts, so the device only
//! sees the state that actually changed between draws.
//!
//! Stencil compositing is table driven: each [`StencilEffect`] maps to a
//! fixed [`StencilMode`] in [`STENCIL_TABLE`].
//!
//! Two devices are provided:
//! - [`WgpuDevice`]: headless wgpu backend with pixel readback
//! - [`RecordingDevice`]: in-memory call log for tests and diagnostics

pub mod batch;
pub mod blend;
pub mod buffer;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod recording;
pub mod shaders;
pub mod shape;
pub mod stencil;
pub mod uniform;
pub mod wgpu_device;

pub use batch::{BatchStats, GlyphRun, SpriteBatch};
pub use blend::{BlendEquation, BlendFactor, BlendFunc, ColorMask};
pub use buffer::FixedBuffer;
pub use config::SpriteBatchConfig;
pub use context::{Dirty, DrawContext, DrawType};
pub use device::{
    RenderDevice, Shader, ShaderId, ShaderSource, Texture, TextureId, UniformDescriptor,
    UniformKind, UniformValue,
};
pub use error::{GpuError, Result};
pub use recording::{DeviceCall, RecordingDevice, ResolvedDraw};
pub use shape::BatchShape;
pub use stencil::{
    CompareFunction, StencilEffect, StencilFaceOps, StencilMode, StencilOp, StencilState,
    FULL_STENCIL, LOWER_HALF, STENCIL_TABLE, UPPER_HALF,
};
pub use uniform::UniformBlock;
pub use wgpu_device::WgpuDevice;
