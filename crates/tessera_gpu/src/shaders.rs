//! WGSL programs
//!
//! The sprite program renders every batch draw:
//! - Vertex colors (always)
//! - Texture sampling with an optional box blur
//! - nanovg-style gradients from the active uniform block
//! - Soft-edged scissor clipping from the active uniform block

use std::borrow::Cow;

use crate::device::{ShaderSource, UniformDescriptor, UniformKind};

/// WGSL sprite shader.
///
/// Bind groups:
/// - 0: per-draw uniforms (dynamic offset)
/// - 1: gradient/scissor uniform block (dynamic offset)
/// - 2: texture and sampler
pub const SPRITE_SHADER: &str = r#"
struct DrawUniforms {
    perspective: mat4x4<f32>,
    draw_type: u32,
    depth: f32,
    blur: f32,
    _pad: f32,
}

struct Block {
    grad_matrix: mat3x3<f32>,
    grad_inner: vec4<f32>,
    grad_outer: vec4<f32>,
    // extent.xy, radius, feather
    grad_params: vec4<f32>,
    scissor_matrix: mat3x3<f32>,
    // half extent.xy, edge scale.xy
    scissor_params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> draw: DrawUniforms;
@group(1) @binding(0) var<uniform> block: Block;
@group(2) @binding(0) var tex: texture_2d<f32>;
@group(2) @binding(1) var tex_sampler: sampler;

const TYPE_TEXTURE: u32 = 1u;
const TYPE_GRADIENT: u32 = 2u;
const TYPE_SCISSOR: u32 = 4u;
const TYPE_BLUR: u32 = 8u;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) texcoord: vec2<f32>,
    @location(3) gradcoord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) texcoord: vec2<f32>,
    @location(2) gradcoord: vec2<f32>,
    @location(3) world: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = draw.perspective * vec4<f32>(in.position, draw.depth, 1.0);
    out.color = in.color;
    out.texcoord = in.texcoord;
    out.gradcoord = in.gradcoord;
    out.world = in.position;
    return out;
}

fn rounded_rect_distance(p: vec2<f32>, extent: vec2<f32>, radius: f32) -> f32 {
    let ext = extent - vec2<f32>(radius, radius);
    let d = abs(p) - ext;
    return min(max(d.x, d.y), 0.0) + length(max(d, vec2<f32>(0.0, 0.0))) - radius;
}

fn scissor_mask(p: vec2<f32>) -> f32 {
    if (block.scissor_params.x < 0.0) {
        return 1.0;
    }
    let local = (block.scissor_matrix * vec3<f32>(p, 1.0)).xy;
    let sc = vec2<f32>(0.5, 0.5) - (abs(local) - block.scissor_params.xy) * block.scissor_params.zw;
    return clamp(sc.x, 0.0, 1.0) * clamp(sc.y, 0.0, 1.0);
}

fn sample_texture(uv: vec2<f32>) -> vec4<f32> {
    if ((draw.draw_type & TYPE_BLUR) == 0u || draw.blur <= 0.0) {
        return textureSampleLevel(tex, tex_sampler, uv, 0.0);
    }
    let texel = vec2<f32>(draw.blur, draw.blur) / vec2<f32>(textureDimensions(tex));
    var sum = vec4<f32>(0.0, 0.0, 0.0, 0.0);
    for (var y = -1; y <= 1; y++) {
        for (var x = -1; x <= 1; x++) {
            sum += textureSampleLevel(tex, tex_sampler, uv + vec2<f32>(f32(x), f32(y)) * texel, 0.0);
        }
    }
    return sum / 9.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = in.color;
    if ((draw.draw_type & TYPE_GRADIENT) != 0u) {
        let local = (block.grad_matrix * vec3<f32>(in.gradcoord, 1.0)).xy;
        let d = rounded_rect_distance(local, block.grad_params.xy, block.grad_params.z);
        let t = clamp((d + block.grad_params.w * 0.5) / block.grad_params.w, 0.0, 1.0);
        color = color * mix(block.grad_inner, block.grad_outer, t);
    }
    if ((draw.draw_type & TYPE_TEXTURE) != 0u) {
        color = color * sample_texture(in.texcoord);
    }
    if ((draw.draw_type & TYPE_SCISSOR) != 0u) {
        color.a = color.a * scissor_mask(in.world);
    }
    return color;
}
"#;

/// Fullscreen triangle used to clear masked stencil bits
pub const STENCIL_CLEAR_SHADER: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - vec2<f32>(1.0, 1.0), 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, 0.0);
}
"#;

/// Named uniforms the sprite program exposes through `set_uniform`
pub const SPRITE_UNIFORMS: [UniformDescriptor; 4] = [
    UniformDescriptor::new("u_perspective", UniformKind::Mat4),
    UniformDescriptor::new("u_type", UniformKind::Int),
    UniformDescriptor::new("u_depth", UniformKind::Float),
    UniformDescriptor::new("u_blur", UniformKind::Float),
];

impl ShaderSource {
    /// The default batch program
    pub fn sprite() -> Self {
        Self {
            label: Cow::Borrowed("sprite"),
            wgsl: Cow::Borrowed(SPRITE_SHADER),
            uniforms: SPRITE_UNIFORMS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_declares_batch_uniforms() {
        let source = ShaderSource::sprite();
        for name in ["u_perspective", "u_type", "u_depth", "u_blur"] {
            assert!(source.uniforms.iter().any(|u| u.name == name), "{name}");
        }
        assert!(source.wgsl.contains("fn vs_main"));
        assert!(source.wgsl.contains("fn fs_main"));
    }
}
