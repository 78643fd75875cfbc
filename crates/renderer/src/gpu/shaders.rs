use std::borrow::Cow;

/// Compiles the billboard point shader (`vs_point` / `fs_point`).
pub(crate) fn compile_point_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("point sprite shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(POINT_SHADER_WGSL)),
    })
}

/// Compiles the fullscreen post-processing shader shared by every bloom stage.
pub(crate) fn compile_post_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("bloom post shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(POST_SHADER_WGSL)),
    })
}

/// Each instance expands into two triangles facing the camera. `params.x` is
/// the world-space point size, `params.y` the viewport aspect. Offsetting in
/// clip space by `size / 2` keeps the on-screen size proportional to
/// `1 / depth`, the same attenuation a perspective point sprite gets. Every
/// point is drawn at the preset size; the per-instance `scale` is carried in
/// the vertex layout but does not resize the billboard.
const POINT_SHADER_WGSL: &str = r#"
struct PointUniforms {
    view_projection: mat4x4<f32>,
    model: mat4x4<f32>,
    tint: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: PointUniforms;
@group(1) @binding(0) var sprite_tex: texture_2d<f32>;
@group(1) @binding(1) var sprite_sampler: sampler;

struct PointOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_point(
    @builtin(vertex_index) index: u32,
    @location(0) position: vec3<f32>,
    @location(1) scale: f32,
) -> PointOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[index];
    var clip = uniforms.view_projection * uniforms.model * vec4<f32>(position, 1.0);
    let half_size = uniforms.params.x * 0.5;
    clip.x += corner.x * half_size / uniforms.params.y;
    clip.y += corner.y * half_size;

    var out: PointOut;
    out.clip = clip;
    out.uv = vec2<f32>(corner.x * 0.5 + 0.5, 0.5 - corner.y * 0.5);
    return out;
}

@fragment
fn fs_point(in: PointOut) -> @location(0) vec4<f32> {
    let texel = textureSample(sprite_tex, sprite_sampler, in.uv);
    // Colour map and alpha map are the same texture; its green channel
    // doubles as the alpha mask.
    let alpha = uniforms.tint.a * texel.a * texel.g;
    return vec4<f32>(uniforms.tint.rgb * texel.rgb, alpha);
}
"#;

const POST_SHADER_WGSL: &str = r#"
struct PostParams {
    texel_size: vec2<f32>,
    direction: vec2<f32>,
    threshold: f32,
    strength: f32,
    radius: f32,
    _padding: f32,
};

@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(0) @binding(2) var<uniform> params: PostParams;
@group(0) @binding(3) var bloom_tex: texture_2d<f32>;

struct FullscreenOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOut {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOut;
    out.clip = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_threshold(in: FullscreenOut) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(source_tex, source_sampler, in.uv, 0.0).rgb;
    let luma = dot(color, vec3<f32>(0.299, 0.587, 0.114));
    let weight = smoothstep(params.threshold, params.threshold + 0.01, luma);
    return vec4<f32>(color * weight, 1.0);
}

@fragment
fn fs_blur(in: FullscreenOut) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let stride = params.texel_size * params.direction * (1.0 + params.radius * 4.0);
    var color = textureSampleLevel(source_tex, source_sampler, in.uv, 0.0).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = stride * f32(i);
        color += textureSampleLevel(source_tex, source_sampler, in.uv + offset, 0.0).rgb * weights[i];
        color += textureSampleLevel(source_tex, source_sampler, in.uv - offset, 0.0).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_composite(in: FullscreenOut) -> @location(0) vec4<f32> {
    let base = textureSampleLevel(source_tex, source_sampler, in.uv, 0.0).rgb;
    let glow = textureSampleLevel(bloom_tex, source_sampler, in.uv, 0.0).rgb;
    return vec4<f32>(base + glow * params.strength, 1.0);
}
"#;
