//! Streaming technique: the simulation runs in a vertex pass.
//!
//! Each step draws one non-rasterizing point per particle; the vertex stage
//! reads the source buffer set, integrates, and writes the destination set
//! through vertex-stage storage writes. The two buffer sets swap roles after
//! every step, so rendering always sees a fully written set.

use glam::Mat4;
use wgpu::util::DeviceExt;

use super::{
    create_point_pipeline, create_state_buffer, point_alpha, uniform_bind_group_layout,
    ParticleInit, ParticleTechnique,
};
use crate::error::GpuError;
use crate::forces::ForceField;
use crate::gpu::accum::AccumulationTarget;
use crate::gpu::GpuContext;
use crate::shaders;
use crate::uniforms::{FrameUniforms, StepUniforms};

/// One of the two double-buffered particle state sets.
struct BufferSet {
    positions: wgpu::Buffer,
    velocities: wgpu::Buffer,
}

impl BufferSet {
    fn new(device: &wgpu::Device, init: &ParticleInit, label: &str) -> Self {
        let positions = create_state_buffer(
            device,
            &format!("{label} Position Buffer"),
            init.position_bytes(),
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST,
        );
        let velocities = create_state_buffer(
            device,
            &format!("{label} Velocity Buffer"),
            init.velocity_bytes(),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );
        Self {
            positions,
            velocities,
        }
    }
}

pub struct StreamTechnique {
    count: u32,

    sets: [BufferSet; 2],
    /// Index of the set holding current state; `1 - read` is written next.
    read: usize,

    step_pipeline: wgpu::RenderPipeline,
    /// `step_bind_groups[read]` binds `sets[read]` as source.
    step_bind_groups: [wgpu::BindGroup; 2],
    step_uniforms: wgpu::Buffer,
    dummy_view: wgpu::TextureView,

    draw_pipeline: wgpu::RenderPipeline,
    frame_bind_group: wgpu::BindGroup,
    frame_uniforms: wgpu::Buffer,
    alpha: f32,

    accum: AccumulationTarget,
    init: ParticleInit,
    paused: bool,
}

impl StreamTechnique {
    pub fn new(
        gpu: &GpuContext,
        init: ParticleInit,
        field: &ForceField,
        force_buffer: &wgpu::Buffer,
        width: u32,
        height: u32,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        if !gpu.supports_vertex_writable_storage() {
            return Err(GpuError::UnsupportedExecutionModel(
                "vertex-stage storage writes",
            ));
        }

        let device = &gpu.device;
        let count = init.count();

        let sets = [
            BufferSet::new(device, &init, "Stream A"),
            BufferSet::new(device, &init, "Stream B"),
        ];

        let step_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stream Step Uniform Buffer"),
            contents: bytemuck::bytes_of(&StepUniforms::new(0.0, count)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let step_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Stream Step Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, false),
                storage_entry(4, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let make_bind_group = |src: &BufferSet, dst: &BufferSet, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &step_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: src.positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: src.velocities.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: dst.positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: dst.velocities.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: force_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: step_uniforms.as_entire_binding(),
                    },
                ],
            })
        };

        let step_bind_groups = [
            make_bind_group(&sets[0], &sets[1], "Stream Step Bind Group A to B"),
            make_bind_group(&sets[1], &sets[0], "Stream Step Bind Group B to A"),
        ];

        let step_shader_src = shaders::stream_step_shader(field.dim(), field.bounds());
        let step_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Stream Step Shader"),
            source: wgpu::ShaderSource::Wgsl(step_shader_src.into()),
        });

        let step_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Stream Step Pipeline Layout"),
                bind_group_layouts: &[&step_layout],
                push_constant_ranges: &[],
            });

        // The pass exists only to run the vertex stage; points are emitted
        // behind the far plane against a throwaway target.
        let step_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Stream Step Pipeline"),
            layout: Some(&step_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &step_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &step_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: DUMMY_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let dummy_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Stream Dummy Target"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DUMMY_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let dummy_view = dummy_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let alpha = point_alpha(count);
        let frame_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stream Frame Uniform Buffer"),
            contents: bytemuck::bytes_of(&FrameUniforms::new(Mat4::IDENTITY, alpha)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_layout = uniform_bind_group_layout(
            device,
            "Stream Frame Bind Group Layout",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Stream Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_uniforms.as_entire_binding(),
            }],
        });

        let draw_pipeline = create_point_pipeline(
            device,
            "Stream Point Pipeline",
            &shaders::point_shader_from_buffer(),
            &frame_layout,
            true,
        );

        let accum = AccumulationTarget::new(device, width, height, target_format);

        Ok(Self {
            count,
            sets,
            read: 0,
            step_pipeline,
            step_bind_groups,
            step_uniforms,
            dummy_view,
            draw_pipeline,
            frame_bind_group,
            frame_uniforms,
            alpha,
            accum,
            init,
            paused: false,
        })
    }

    fn current(&self) -> &BufferSet {
        &self.sets[self.read]
    }
}

const DUMMY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

impl ParticleTechnique for StreamTechnique {
    fn step(&mut self, gpu: &GpuContext, delta: f32) {
        if self.count > 0 {
            gpu.queue.write_buffer(
                &self.step_uniforms,
                0,
                bytemuck::bytes_of(&StepUniforms::new(delta, self.count)),
            );

            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Stream Step Encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Stream Step Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.dummy_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Discard,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&self.step_pipeline);
                pass.set_bind_group(0, &self.step_bind_groups[self.read], &[]);
                pass.draw(0..self.count, 0..1);
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
        }

        // Swap even for an empty system so the double-buffer invariant holds.
        self.read ^= 1;
    }

    fn draw(&mut self, gpu: &GpuContext, target: &wgpu::TextureView, delta: f32, view_proj: Mat4) {
        gpu.queue.write_buffer(
            &self.frame_uniforms,
            0,
            bytemuck::bytes_of(&FrameUniforms::new(view_proj, self.alpha)),
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Stream Draw Encoder"),
            });

        self.accum.begin(&gpu.queue, &mut encoder, delta, self.paused);
        if self.count > 0 {
            let mut pass = self.accum.point_pass(&mut encoder);
            pass.set_pipeline(&self.draw_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_vertex_buffer(0, self.current().positions.slice(..));
            pass.draw(0..6, 0..self.count);
        }
        self.accum.composite(&mut encoder, target, super::BACKGROUND);

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.accum.resize(&gpu.device, width, height);
    }

    fn reset(&mut self, gpu: &GpuContext) {
        for set in &self.sets {
            gpu.queue
                .write_buffer(&set.positions, 0, self.init.position_bytes());
            gpu.queue
                .write_buffer(&set.velocities, 0, self.init.velocity_bytes());
        }
        self.read = 0;
        self.accum.request_clear();
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
