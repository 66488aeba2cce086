//! Generated WGSL for the simulation and render pipelines.
//!
//! All three techniques splice the same integration include into their
//! simulation shader: trilinear force sampling, `v += F(p)·dt; p += v·dt`,
//! and a mirror-reflect boundary on the simulation cube. Keeping the include
//! identical is what makes trajectories comparable across techniques.
//!
//! The force lattice edge length and the cube half-extent are baked into the
//! include as constants; both are immutable for the lifetime of a system.

/// WGSL uniform block matching [`crate::uniforms::StepUniforms`].
const STEP_UNIFORMS_WGSL: &str = "\
struct StepUniforms {
    delta: f32,
    count: u32,
    _pad0: u32,
    _pad1: u32,
};
";

/// WGSL uniform block matching [`crate::uniforms::FrameUniforms`].
const FRAME_UNIFORMS_WGSL: &str = "\
struct FrameUniforms {
    view_proj: mat4x4<f32>,
    alpha: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};
";

/// Apparent half-size of a point sprite in clip space.
const POINT_SIZE: f32 = 0.012;

/// The shared integration include.
///
/// Expects a `forces: array<vec4<f32>>` read-only storage binding to be
/// declared before it is spliced in.
pub fn step_include(force_dim: u32, bounds: f32) -> String {
    format!(
        r#"const FORCE_DIM: u32 = {force_dim}u;
const BOUNDS: f32 = {bounds:?};

fn force_cell(c: vec3<u32>) -> vec3<f32> {{
    return forces[(c.z * FORCE_DIM + c.y) * FORCE_DIM + c.x].xyz;
}}

fn sample_force(p: vec3<f32>) -> vec3<f32> {{
    let fd = f32(FORCE_DIM - 1u);
    let g = clamp(p / BOUNDS * 0.5 + vec3<f32>(0.5), vec3<f32>(0.0), vec3<f32>(1.0)) * fd;
    let base = min(vec3<u32>(floor(g)), vec3<u32>(FORCE_DIM - 2u));
    let t = clamp(g - vec3<f32>(base), vec3<f32>(0.0), vec3<f32>(1.0));

    let c00 = mix(force_cell(base), force_cell(base + vec3<u32>(1u, 0u, 0u)), t.x);
    let c10 = mix(force_cell(base + vec3<u32>(0u, 1u, 0u)), force_cell(base + vec3<u32>(1u, 1u, 0u)), t.x);
    let c01 = mix(force_cell(base + vec3<u32>(0u, 0u, 1u)), force_cell(base + vec3<u32>(1u, 0u, 1u)), t.x);
    let c11 = mix(force_cell(base + vec3<u32>(0u, 1u, 1u)), force_cell(base + vec3<u32>(1u, 1u, 1u)), t.x);

    return mix(mix(c00, c10, t.y), mix(c01, c11, t.y), t.z);
}}

struct ParticleState {{
    position: vec4<f32>,
    velocity: vec4<f32>,
}}

fn integrate(position: vec4<f32>, velocity: vec4<f32>, dt: f32) -> ParticleState {{
    var v = velocity.xyz + sample_force(position.xyz) * dt;
    var p = position.xyz + v * dt;

    // Mirror-reflect on the bounding cube, negating the escaped components.
    let outside = abs(p) > vec3<f32>(BOUNDS);
    p = select(p, sign(p) * 2.0 * BOUNDS - p, outside);
    p = clamp(p, vec3<f32>(-BOUNDS), vec3<f32>(BOUNDS));
    v = select(v, -v, outside);

    var state: ParticleState;
    state.position = vec4<f32>(p, 1.0);
    state.velocity = vec4<f32>(v, 0.0);
    return state;
}}
"#
    )
}

/// Compute technique: one dispatch, in-place read/write of both buffers.
pub fn compute_step_shader(force_dim: u32, bounds: f32, workgroup_size: u32) -> String {
    let include = step_include(force_dim, bounds);
    format!(
        r#"{STEP_UNIFORMS_WGSL}
@group(0) @binding(0)
var<storage, read_write> positions: array<vec4<f32>>;

@group(0) @binding(1)
var<storage, read_write> velocities: array<vec4<f32>>;

@group(0) @binding(2)
var<storage, read> forces: array<vec4<f32>>;

@group(0) @binding(3)
var<uniform> step_params: StepUniforms;

{include}
@compute @workgroup_size({workgroup_size})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= step_params.count {{
        return;
    }}

    let state = integrate(positions[index], velocities[index], step_params.delta);
    positions[index] = state.position;
    velocities[index] = state.velocity;
}}
"#
    )
}

/// Stream technique: a vertex pass reads the source buffer set and writes
/// the destination set, one point per particle. Every point is emitted
/// behind the far plane so nothing rasterizes.
pub fn stream_step_shader(force_dim: u32, bounds: f32) -> String {
    let include = step_include(force_dim, bounds);
    format!(
        r#"{STEP_UNIFORMS_WGSL}
@group(0) @binding(0)
var<storage, read> src_positions: array<vec4<f32>>;

@group(0) @binding(1)
var<storage, read> src_velocities: array<vec4<f32>>;

@group(0) @binding(2)
var<storage, read_write> dst_positions: array<vec4<f32>>;

@group(0) @binding(3)
var<storage, read_write> dst_velocities: array<vec4<f32>>;

@group(0) @binding(4)
var<storage, read> forces: array<vec4<f32>>;

@group(0) @binding(5)
var<uniform> step_params: StepUniforms;

{include}
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {{
    if vertex_index < step_params.count {{
        let state = integrate(src_positions[vertex_index], src_velocities[vertex_index], step_params.delta);
        dst_positions[vertex_index] = state.position;
        dst_velocities[vertex_index] = state.velocity;
    }}
    return vec4<f32>(0.0, 0.0, 2.0, 1.0);
}}

@fragment
fn fs_main() -> @location(0) vec4<f32> {{
    return vec4<f32>(0.0);
}}
"#
    )
}

/// Image technique: a full-screen pass over the state textures with two
/// color attachments (position out, velocity out). `state_width` is the
/// texel row width of the state textures.
pub fn image_update_shader(force_dim: u32, bounds: f32, state_width: u32) -> String {
    let include = step_include(force_dim, bounds);
    format!(
        r#"{STEP_UNIFORMS_WGSL}
const STATE_WIDTH: u32 = {state_width}u;

@group(0) @binding(0)
var src_positions: texture_2d<f32>;

@group(0) @binding(1)
var src_velocities: texture_2d<f32>;

@group(0) @binding(2)
var<storage, read> forces: array<vec4<f32>>;

@group(0) @binding(3)
var<uniform> step_params: StepUniforms;

{include}
struct UpdateOutput {{
    @location(0) position: vec4<f32>,
    @location(1) velocity: vec4<f32>,
}}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {{
    var corners = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0),
    );
    return vec4<f32>(corners[vertex_index], 0.0, 1.0);
}}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> UpdateOutput {{
    let texel = vec2<u32>(frag_coord.xy);
    let index = texel.y * STATE_WIDTH + texel.x;

    let position = textureLoad(src_positions, vec2<i32>(texel), 0);
    let velocity = textureLoad(src_velocities, vec2<i32>(texel), 0);

    var out: UpdateOutput;
    if index >= step_params.count {{
        // Texels past the particle count carry no state; pass them through.
        out.position = position;
        out.velocity = velocity;
        return out;
    }}

    let state = integrate(position, velocity, step_params.delta);
    out.position = state.position;
    out.velocity = state.velocity;
    return out;
}}
"#
    )
}

/// Quad-expansion vertex body shared by both point shaders.
fn point_vertex_body() -> &'static str {
    r#"    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );

    let quad_pos = quad_vertices[vertex_index];
    var clip_pos = frame.view_proj * vec4<f32>(particle_pos.xyz, 1.0);

    clip_pos.x += quad_pos.x * POINT_SIZE * clip_pos.w;
    clip_pos.y += quad_pos.y * POINT_SIZE * clip_pos.w;

    var out: VertexOutput;
    out.clip_position = clip_pos;
    out.uv = quad_pos;
    return out;"#
}

/// Soft-circle fragment shared by both point shaders.
fn point_fragment() -> &'static str {
    r#"@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dist = length(in.uv);
    if dist > 1.0 {
        discard;
    }
    let falloff = 1.0 - smoothstep(0.3, 1.0, dist);
    return vec4<f32>(vec3<f32>(0.55, 0.75, 1.0) * falloff, falloff * frame.alpha);
}"#
}

/// Point sprites fetched from an instance-stepped vertex buffer
/// (compute and stream techniques).
pub fn point_shader_from_buffer() -> String {
    let body = point_vertex_body();
    let fragment = point_fragment();
    format!(
        r#"{FRAME_UNIFORMS_WGSL}
const POINT_SIZE: f32 = {POINT_SIZE:?};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) particle_pos: vec4<f32>,
) -> VertexOutput {{
{body}
}}

{fragment}
"#
    )
}

/// Point sprites fetched from the position state texture by instance index
/// (image technique).
pub fn point_shader_from_texture(state_width: u32) -> String {
    let body = point_vertex_body();
    let fragment = point_fragment();
    format!(
        r#"{FRAME_UNIFORMS_WGSL}
const POINT_SIZE: f32 = {POINT_SIZE:?};
const STATE_WIDTH: u32 = {state_width}u;

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

@group(0) @binding(1)
var src_positions: texture_2d<f32>;

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {{
    let texel = vec2<i32>(i32(instance_index % STATE_WIDTH), i32(instance_index / STATE_WIDTH));
    let particle_pos = textureLoad(src_positions, texel, 0);
{body}
}}

{fragment}
"#
    )
}

/// Accumulation fade pass: multiplies the previous frame's accumulation by
/// `1 - strength` via Zero / OneMinusSrc blending.
pub fn fade_shader() -> String {
    r#"struct FadeUniforms {
    strength: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0)
var<uniform> fade: FadeUniforms;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    var corners = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0),
    );
    return vec4<f32>(corners[vertex_index], 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(vec3<f32>(fade.strength), fade.strength);
}
"#
    .to_string()
}

/// Composite pass: samples the accumulation texture onto the host target.
pub fn composite_shader() -> String {
    r#"@group(0) @binding(0)
var accum_tex: texture_2d<f32>;

@group(0) @binding(1)
var accum_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0),
    );
    let corner = corners[vertex_index];

    var out: VertexOutput;
    out.clip_position = vec4<f32>(corner, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x * 0.5 + 0.5, 0.5 - corner.y * 0.5);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(accum_tex, accum_sampler, in.uv);
}
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_simulation_shaders_share_the_integration_include() {
        let include = step_include(5, 2.0);
        assert!(compute_step_shader(5, 2.0, 256).contains(&include));
        assert!(stream_step_shader(5, 2.0).contains(&include));
        assert!(image_update_shader(5, 2.0, 512).contains(&include));
    }

    #[test]
    fn test_include_bakes_lattice_constants() {
        let include = step_include(7, 1.5);
        assert!(include.contains("const FORCE_DIM: u32 = 7u;"));
        assert!(include.contains("const BOUNDS: f32 = 1.5;"));
    }

    #[test]
    fn test_compute_shader_bakes_workgroup_size() {
        let shader = compute_step_shader(5, 1.0, 64);
        assert!(shader.contains("@workgroup_size(64)"));
    }

    #[test]
    fn test_point_shaders_share_quad_and_fragment() {
        let buffer = point_shader_from_buffer();
        let texture = point_shader_from_texture(128);
        assert!(buffer.contains(point_fragment()));
        assert!(texture.contains(point_fragment()));
        assert!(texture.contains("const STATE_WIDTH: u32 = 128u;"));
    }
}
