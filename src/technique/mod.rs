//! The particle-technique contract and pieces shared by all strategies.
//!
//! A technique owns GPU mirrors of the particle state (buffers or textures,
//! depending on its execution model), a point-sprite drawing pipeline, and
//! an accumulation target for motion trails. Construction plays the role of
//! initialization: a successfully built technique can be stepped and drawn
//! without further fallible setup.

mod compute;
mod image;
mod stream;

pub use compute::ComputeTechnique;
pub use image::ImageTechnique;
pub use stream::StreamTechnique;

use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::error::GpuError;
use crate::forces::ForceField;
use crate::gpu::GpuContext;

/// Selector for the three interchangeable execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechniqueKind {
    /// Data-parallel compute dispatch, in-place buffer updates.
    Compute,
    /// Streaming vertex pass into a double-buffered buffer set.
    Stream,
    /// Full-screen fragment passes over ping-pong state textures.
    Image,
}

impl TechniqueKind {
    /// All kinds, in fallback-preference order.
    pub const ALL: [TechniqueKind; 3] = [
        TechniqueKind::Compute,
        TechniqueKind::Stream,
        TechniqueKind::Image,
    ];

    /// Human-readable name, for warnings and UI lists.
    pub fn name(&self) -> &'static str {
        match self {
            TechniqueKind::Compute => "compute",
            TechniqueKind::Stream => "stream",
            TechniqueKind::Image => "image",
        }
    }
}

/// Initial particle state, shared by every technique of one system.
///
/// Both arrays have the same length; the w component is 1 for positions and
/// 0 for velocities. Techniques keep a handle so `reset` can re-upload the
/// exact construction-time state.
#[derive(Clone)]
pub struct ParticleInit {
    pub positions: Arc<[Vec4]>,
    pub velocities: Arc<[Vec4]>,
}

impl ParticleInit {
    pub fn new(positions: Vec<Vec4>, velocities: Vec<Vec4>) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "positions and velocities must have the same length"
        );
        Self {
            positions: positions.into(),
            velocities: velocities.into(),
        }
    }

    /// Particle count N.
    #[inline]
    pub fn count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub(crate) fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub(crate) fn velocity_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.velocities)
    }
}

/// Contract shared by the three simulation strategies.
///
/// All methods mutate GPU-resident state; none are pure. `step` must be safe
/// to call zero or more times per frame, and `step(0.0)` leaves particle
/// state numerically unchanged.
pub trait ParticleTechnique {
    /// Advance all particles by `delta` seconds under the force field.
    fn step(&mut self, gpu: &GpuContext, delta: f32);

    /// Render the current particle state into `target`: fade or clear the
    /// accumulation buffer, splat points, composite.
    fn draw(&mut self, gpu: &GpuContext, target: &wgpu::TextureView, delta: f32, view_proj: Mat4);

    /// Resize viewport-dependent resources. Particle state is unaffected.
    fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32);

    /// Restore the construction-time particle state and clear the
    /// accumulation buffer. No fixed-size resource is reallocated.
    fn reset(&mut self, gpu: &GpuContext);

    /// Toggle the paused flag; while paused, `draw` clears instead of fades.
    fn pause(&mut self, paused: bool);

    /// Current paused flag.
    fn is_paused(&self) -> bool;
}

/// Background the accumulation buffer is composited over.
pub(crate) const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.12,
    g: 0.14,
    b: 0.18,
    a: 1.0,
};

/// Extent of a state texture holding `count` texels, near-square.
///
/// Returns at least 1×1 so a zero-particle system still has valid textures.
pub(crate) fn state_texture_extent(count: u32, max_dim: u32) -> Result<(u32, u32), GpuError> {
    let width = (f64::from(count).sqrt().ceil() as u32).max(1);
    let height = count.div_ceil(width).max(1);
    if width > max_dim || height > max_dim {
        return Err(GpuError::ParticleCountTooLarge {
            count,
            max_texels: u64::from(max_dim) * u64::from(max_dim),
        });
    }
    Ok((width, height))
}

/// Point-sprite alpha that scales from a handful of particles up to
/// millions: fewer particles draw more opaque.
pub(crate) fn point_alpha(count: u32) -> f32 {
    (1.0 - 0.9 * ((count as f32).sqrt().sqrt() / 30.0)).clamp(0.05, 1.0)
}

/// Size in bytes of a particle state buffer.
///
/// Floored at one element: zero-size buffers cannot be bound, and an empty
/// system must still construct (its passes are skipped, not its resources).
pub(crate) fn state_buffer_size(count: u32) -> u64 {
    u64::from(count.max(1)) * std::mem::size_of::<Vec4>() as u64
}

/// Particle state buffer initialized from `contents`, or a zeroed
/// one-element buffer when the system is empty.
pub(crate) fn create_state_buffer(
    device: &wgpu::Device,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;

    if contents.is_empty() {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: state_buffer_size(0),
            usage,
            mapped_at_creation: false,
        })
    } else {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        })
    }
}

/// Render pipeline for point sprites targeting the accumulation buffer.
///
/// `instance_buffer` adds the position vertex buffer (one vec4 per
/// instance) used by the buffer-backed techniques; the image technique
/// fetches positions from its state texture instead.
pub(crate) fn create_point_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader_src: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    instance_buffer: bool,
) -> wgpu::RenderPipeline {
    use crate::gpu::accum::{point_blend, ACCUM_FORMAT};

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_src.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    let attributes = [wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x4,
    }];
    let buffers = [wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vec4>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &attributes,
    }];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: if instance_buffer { &buffers } else { &[] },
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: ACCUM_FORMAT,
                blend: Some(point_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Bind group layout with a single uniform block, the common case for the
/// point pipelines.
pub(crate) fn uniform_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// CPU mirror of the integration rule every simulation shader applies.
///
/// `v += F(p)·dt; p += v·dt`, then mirror-reflection on the bounding cube
/// with per-component velocity negation. Hosts can use this to predict
/// trajectories; the tests use it to pin the cross-technique semantics.
pub fn integrate_reference(field: &ForceField, position: Vec4, velocity: Vec4, dt: f32) -> (Vec4, Vec4) {
    let bounds = field.bounds();
    let mut v = velocity.truncate() + field.sample(position.truncate()) * dt;
    let mut p = position.truncate() + v * dt;

    for i in 0..3 {
        if p[i].abs() > bounds {
            p[i] = p[i].signum() * 2.0 * bounds - p[i];
            v[i] = -v[i];
        }
        p[i] = p[i].clamp(-bounds, bounds);
    }

    (p.extend(1.0), v.extend(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_state_texture_extent_holds_count() {
        for count in [0u32, 1, 2, 100, 1000, 262_144, 1_000_000] {
            let (w, h) = state_texture_extent(count, 8192).unwrap();
            assert!(u64::from(w) * u64::from(h) >= u64::from(count));
            assert!(w >= 1 && h >= 1);
        }
    }

    #[test]
    fn test_state_texture_extent_is_near_square() {
        let (w, h) = state_texture_extent(262_144, 8192).unwrap();
        assert_eq!((w, h), (512, 512));
    }

    #[test]
    fn test_state_texture_extent_zero_particles() {
        assert_eq!(state_texture_extent(0, 8192).unwrap(), (1, 1));
    }

    #[test]
    fn test_state_texture_extent_overflow() {
        let err = state_texture_extent(u32::MAX, 256).unwrap_err();
        assert!(matches!(err, GpuError::ParticleCountTooLarge { .. }));
    }

    #[test]
    fn test_state_buffer_size_floors_at_one_element() {
        assert_eq!(state_buffer_size(0), 16);
        assert_eq!(state_buffer_size(1), 16);
        assert_eq!(state_buffer_size(1000), 16_000);
    }

    #[test]
    fn test_point_alpha_monotonic() {
        assert!(point_alpha(10) > point_alpha(1000));
        assert!(point_alpha(1000) > point_alpha(1_000_000));
        assert!(point_alpha(u32::MAX) >= 0.05);
    }

    #[test]
    fn test_integrate_zero_delta_is_identity() {
        let field = ForceField::generate(5, 2.0, 42);
        let p = Vec4::new(0.3, -0.7, 0.1, 1.0);
        let v = Vec4::new(1.0, 2.0, -0.5, 0.0);
        let (p2, v2) = integrate_reference(&field, p, v, 0.0);
        assert_eq!(p2, p);
        assert_eq!(v2, v);
    }

    #[test]
    fn test_integrate_straight_line_under_zero_force() {
        let field = ForceField::constant(5, 100.0, Vec3::ZERO);
        let p = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let v = Vec4::new(1.0, 0.0, 0.0, 0.0);

        // dt = 1, one step: position advances by exactly the velocity.
        let (p2, v2) = integrate_reference(&field, p, v, 1.0);
        assert_eq!(p2, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(v2, v);
    }

    #[test]
    fn test_integrate_reflects_at_bounds() {
        let field = ForceField::constant(5, 1.0, Vec3::ZERO);
        let p = Vec4::new(0.9, 0.0, 0.0, 1.0);
        let v = Vec4::new(1.0, 0.0, 0.0, 0.0);

        // p would be 1.9; mirrored back to 0.1 with the velocity negated.
        let (p2, v2) = integrate_reference(&field, p, v, 1.0);
        assert!((p2.x - 0.1).abs() < 1e-6);
        assert_eq!(v2.x, -1.0);
    }

    #[test]
    fn test_integrate_applies_force_before_position() {
        let field = ForceField::constant(5, 100.0, Vec3::new(0.0, -1.0, 0.0));
        let p = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let v = Vec4::ZERO;

        // Semi-implicit Euler: the fresh velocity moves the position in the
        // same step.
        let (p2, v2) = integrate_reference(&field, p, v, 0.5);
        assert!((v2.y - -0.5).abs() < 1e-6);
        assert!((p2.y - -0.25).abs() < 1e-6);
    }

    #[test]
    fn test_particle_init_counts() {
        let init = ParticleInit::new(vec![Vec4::W; 3], vec![Vec4::ZERO; 3]);
        assert_eq!(init.count(), 3);
        assert_eq!(init.position_bytes().len(), 3 * 16);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_particle_init_rejects_mismatched_lengths() {
        ParticleInit::new(vec![Vec4::W; 2], vec![Vec4::ZERO; 3]);
    }
}
