use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// Compiles one of the compute kernels below.
pub(crate) fn compute_module(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_owned())),
    })
}

pub(crate) fn composite_vertex_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("composite vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(COMPOSITE_VERTEX_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

pub(crate) fn composite_fragment_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("composite fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(COMPOSITE_FRAGMENT_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Prepends the shared helpers to a kernel body.
pub(crate) fn with_prelude(body: &str) -> String {
    format!("{PRELUDE}\n{body}")
}

/// Helpers shared by every single-input kernel.
///
/// Binding 0 is always the source texture and binding 1 the first output.
const PRELUDE: &str = r"
@group(0) @binding(0) var src: texture_2d<f32>;

fn fetch(p: vec2<i32>) -> vec4<f32> {
    let size = vec2<i32>(textureDimensions(src));
    return textureLoad(src, clamp(p, vec2<i32>(0), size - vec2<i32>(1)), 0);
}

fn same(a: vec4<f32>, b: vec4<f32>) -> bool {
    return all(a == b);
}

// EPX: p is the centre, a above, b right, c left, d below.
fn epx(p: vec4<f32>, a: vec4<f32>, b: vec4<f32>, c: vec4<f32>, d: vec4<f32>, sub: vec2<u32>) -> vec4<f32> {
    if (sub.x == 0u && sub.y == 0u) {
        if (same(c, a) && !same(c, d) && !same(a, b)) { return a; }
    } else if (sub.x == 1u && sub.y == 0u) {
        if (same(a, b) && !same(a, c) && !same(b, d)) { return b; }
    } else if (sub.x == 0u) {
        if (same(d, c) && !same(d, b) && !same(c, a)) { return c; }
    } else {
        if (same(b, d) && !same(b, a) && !same(d, c)) { return d; }
    }
    return p;
}

fn yuv_distance(a: vec4<f32>, b: vec4<f32>) -> f32 {
    let d = (a.rgb - b.rgb) * 255.0;
    let y = dot(d, vec3<f32>(0.299, 0.587, 0.114));
    let u = dot(d, vec3<f32>(-0.169, -0.331, 0.5));
    let v = dot(d, vec3<f32>(0.5, -0.419, -0.081));
    return 48.0 * abs(y) + 7.0 * abs(u) + 6.0 * abs(v);
}

// 2xBR corner of the pixel at `origin` facing sub-pixel `sub`, with
// neighbours `stride` texels apart.
fn xbr(origin: vec2<i32>, stride: i32, sub: vec2<u32>) -> vec4<f32> {
    let dir = vec2<i32>(sub) * 2 - vec2<i32>(1);
    let dx = vec2<i32>(dir.x * stride, 0);
    let dy = vec2<i32>(0, dir.y * stride);
    let e = fetch(origin);
    let f = fetch(origin + dx);
    let h = fetch(origin + dy);
    if (same(e, f) || same(e, h)) { return e; }

    let b = fetch(origin - dy);
    let c = fetch(origin + dx - dy);
    let d = fetch(origin - dx);
    let g = fetch(origin - dx + dy);
    let i = fetch(origin + dx + dy);
    let across = yuv_distance(e, c) + yuv_distance(e, g) + 4.0 * yuv_distance(h, f);
    let along = yuv_distance(h, d) + yuv_distance(f, b) + 4.0 * yuv_distance(e, i);
    if (across >= along) { return e; }

    var edge = h;
    if (yuv_distance(e, f) <= yuv_distance(e, h)) { edge = f; }
    return mix(e, edge, 0.5);
}
";

pub(crate) const COPY_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    textureStore(dst, vec2<i32>(gid.xy), fetch(vec2<i32>(gid.xy)));
}
";

/// Same-parity field into `merged`, each row written twice.
pub(crate) const LINE_DOUBLE_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    textureStore(dst, vec2<i32>(gid.xy), fetch(vec2<i32>(i32(gid.x), i32(gid.y / 2u))));
}
";

/// Long field on even rows, short field on odd rows, each weighted.
pub(crate) const MERGE_WGSL: &str = r"
struct MergeParams {
    long_scale: f32,
    short_scale: f32,
    padding: vec2<f32>,
}

@group(0) @binding(0) var long_field: texture_2d<f32>;
@group(0) @binding(1) var short_field: texture_2d<f32>;
@group(0) @binding(2) var merged: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(3) var<uniform> params: MergeParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(merged);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let src = vec2<i32>(i32(gid.x), i32(gid.y / 2u));
    var color: vec4<f32>;
    if (gid.y % 2u == 0u) {
        let texel = textureLoad(long_field, src, 0);
        color = vec4<f32>(texel.rgb * params.long_scale, texel.a);
    } else {
        let texel = textureLoad(short_field, src, 0);
        color = vec4<f32>(texel.rgb * params.short_scale, texel.a);
    }
    textureStore(merged, vec2<i32>(gid.xy), color);
}
";

/// EPX over 2x2 blocks; output has the size of the input.
pub(crate) const EPX_ENHANCE_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let block = vec2<i32>(i32(gid.x & ~1u), i32(gid.y & ~1u));
    let color = epx(
        fetch(block),
        fetch(block + vec2<i32>(0, -2)),
        fetch(block + vec2<i32>(2, 0)),
        fetch(block + vec2<i32>(-2, 0)),
        fetch(block + vec2<i32>(0, 2)),
        gid.xy % vec2<u32>(2u),
    );
    textureStore(dst, vec2<i32>(gid.xy), color);
}
";

/// Scale2x into an output twice the input size.
pub(crate) const EPX_UPSCALE_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let p = vec2<i32>(gid.xy / 2u);
    let color = epx(
        fetch(p),
        fetch(p + vec2<i32>(0, -1)),
        fetch(p + vec2<i32>(1, 0)),
        fetch(p + vec2<i32>(-1, 0)),
        fetch(p + vec2<i32>(0, 1)),
        gid.xy % vec2<u32>(2u),
    );
    textureStore(dst, vec2<i32>(gid.xy), color);
}
";

/// 2xBR over 2x2 blocks; output has the size of the input.
pub(crate) const XBR_ENHANCE_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let block = vec2<i32>(i32(gid.x & ~1u), i32(gid.y & ~1u));
    textureStore(dst, vec2<i32>(gid.xy), xbr(block, 2, gid.xy % vec2<u32>(2u)));
}
";

pub(crate) const XBR_UPSCALE_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let p = vec2<i32>(gid.xy / 2u);
    textureStore(dst, vec2<i32>(gid.xy), xbr(p, 1, gid.xy % vec2<u32>(2u)));
}
";

pub(crate) const REPLICATE_UPSCALE_WGSL: &str = r"
@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    textureStore(dst, vec2<i32>(gid.xy), fetch(vec2<i32>(gid.xy / 2u)));
}
";

/// One channel per bloom texture, scaled by the bloom brightness.
pub(crate) const BLOOM_SPLIT_WGSL: &str = r"
struct FilterParams {
    brightness: f32,
    weight: f32,
    mode: i32,
    padding: f32,
}

@group(0) @binding(1) var bloom_r: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var bloom_g: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(3) var bloom_b: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(4) var<uniform> params: FilterParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(bloom_r);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let p = vec2<i32>(gid.xy);
    let c = clamp(fetch(p).rgb * params.brightness, vec3<f32>(0.0), vec3<f32>(1.0));
    textureStore(bloom_r, p, vec4<f32>(c.r, 0.0, 0.0, 1.0));
    textureStore(bloom_g, p, vec4<f32>(0.0, c.g, 0.0, 1.0));
    textureStore(bloom_b, p, vec4<f32>(0.0, 0.0, c.b, 1.0));
}
";

/// One direction of a separable gaussian.
pub(crate) const BLUR_WGSL: &str = r"
struct BlurParams {
    direction: vec2<i32>,
    radius: i32,
    sigma: f32,
}

@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var<uniform> params: BlurParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let p = vec2<i32>(gid.xy);
    let denom = 2.0 * params.sigma * params.sigma;
    var acc = vec4<f32>(0.0);
    var total = 0.0;
    for (var i = -params.radius; i <= params.radius; i = i + 1) {
        let w = exp(-f32(i * i) / denom);
        acc += w * fetch(p + params.direction * i);
        total += w;
    }
    textureStore(dst, p, acc / total);
}
";

/// Embedded scanlines darken odd rows by a luma-dependent factor.
pub(crate) const SCANLINES_WGSL: &str = r"
struct FilterParams {
    brightness: f32,
    weight: f32,
    mode: i32,
    padding: f32,
}

@group(0) @binding(1) var dst: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2) var<uniform> params: FilterParams;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    let p = vec2<i32>(gid.xy);
    let color = fetch(p);
    var shaded = color;
    if (params.mode == 1 && gid.y % 2u == 1u) {
        let luma = dot(color.rgb, vec3<f32>(0.299, 0.587, 0.114));
        let k = clamp(params.brightness + params.weight * luma, 0.0, 1.0);
        shaded = vec4<f32>(color.rgb * k, color.a);
    }
    textureStore(dst, p, shaded);
}
";

pub(crate) const CLEAR_WGSL: &str = r"
@group(0) @binding(0) var dst: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(dst);
    if (gid.x >= size.x || gid.y >= size.y) { return; }
    textureStore(dst, vec2<i32>(gid.xy), vec4<f32>(0.0));
}
";

const COMPOSITE_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec4 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

layout(std140, set = 0, binding = 0) uniform VertexParams {
    mat4 mvp;
} vertex_params;

void main() {
    v_uv = a_uv;
    gl_Position = vertex_params.mvp * a_position;
}
";

/// The uniform block layout must match `FragmentUniforms` in `uniforms.rs`.
const COMPOSITE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 1) uniform FragmentParams {
    float alpha;
    float bloom_weight;
    int dot_mask_width;
    int dot_mask_height;
    int scanline_distance;
    int scanline_mode;
    float scanline_brightness;
    int dot_mask_enabled;
    vec2 disalignment;
    int bloom_enabled;
    float white;
} params;

layout(set = 1, binding = 0) uniform texture2D scanlined;
layout(set = 1, binding = 1) uniform texture2D bloom_r;
layout(set = 1, binding = 2) uniform texture2D bloom_g;
layout(set = 1, binding = 3) uniform texture2D bloom_b;
layout(set = 1, binding = 4) uniform texture2D dot_mask;
layout(set = 1, binding = 5) uniform sampler linear_sampler;
layout(set = 1, binding = 6) uniform sampler nearest_sampler;

void main() {
    vec2 shift = params.disalignment;
    vec3 color = vec3(
        texture(sampler2D(scanlined, linear_sampler), v_uv + shift).r,
        texture(sampler2D(scanlined, linear_sampler), v_uv).g,
        texture(sampler2D(scanlined, linear_sampler), v_uv - shift).b
    );

    if (params.bloom_enabled != 0) {
        vec3 bloom = vec3(
            texture(sampler2D(bloom_r, linear_sampler), v_uv).r,
            texture(sampler2D(bloom_g, linear_sampler), v_uv).g,
            texture(sampler2D(bloom_b, linear_sampler), v_uv).b
        );
        color += params.bloom_weight * bloom;
    }

    ivec2 pixel = ivec2(gl_FragCoord.xy);
    if (params.scanline_mode == 2 && (pixel.y / params.scanline_distance) % 2 == 1) {
        color *= params.scanline_brightness;
    }

    if (params.dot_mask_enabled != 0) {
        ivec2 cell = ivec2(pixel.x % params.dot_mask_width, pixel.y % params.dot_mask_height);
        color *= texelFetch(sampler2D(dot_mask, nearest_sampler), cell, 0).rgb;
    }

    color = mix(clamp(color, 0.0, 1.0), vec3(1.0), clamp(params.white, 0.0, 1.0));
    float a = clamp(params.alpha, 0.0, 1.0);
    out_color = vec4(color * a, a);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga::front::{glsl, wgsl};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    fn validate(module: &wgpu::naga::Module) {
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(module)
            .expect("shader validates");
    }

    #[test]
    fn kernels_parse_and_validate() {
        let prelude_kernels = [
            COPY_WGSL,
            LINE_DOUBLE_WGSL,
            EPX_ENHANCE_WGSL,
            EPX_UPSCALE_WGSL,
            XBR_ENHANCE_WGSL,
            XBR_UPSCALE_WGSL,
            REPLICATE_UPSCALE_WGSL,
            BLOOM_SPLIT_WGSL,
            BLUR_WGSL,
            SCANLINES_WGSL,
        ];
        for body in prelude_kernels {
            let module = wgsl::parse_str(&with_prelude(body)).expect("kernel parses");
            validate(&module);
        }
        for standalone in [MERGE_WGSL, CLEAR_WGSL] {
            let module = wgsl::parse_str(standalone).expect("kernel parses");
            validate(&module);
        }
    }

    #[test]
    fn composite_stages_parse() {
        let mut frontend = glsl::Frontend::default();
        let vertex = frontend
            .parse(&glsl::Options::from(ShaderStage::Vertex), COMPOSITE_VERTEX_GLSL)
            .expect("vertex parses");
        validate(&vertex);
        let fragment = frontend
            .parse(&glsl::Options::from(ShaderStage::Fragment), COMPOSITE_FRAGMENT_GLSL)
            .expect("fragment parses");
        validate(&fragment);
    }
}
